//! The universal builtins and the methods of the core types.

mod args;
mod methods;

#[cfg(test)]
mod builtins_test;

use std::any::Any;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed};
use once_cell::sync::Lazy;

use crate::eval::call;
use crate::thread::Thread;
use crate::value::{Dict, NativeCallable, Range, Set, Value, compare, int_to_f64};

pub use methods::attr;

use args::{int_arg, present, required, str_arg, unpack};

type BuiltinFn = fn(&mut Thread, Vec<Value>, Vec<(String, Value)>) -> Result<Value, String>;

/// A universal builtin. Its errors are prefixed with its name.
struct Builtin {
    name: &'static str,
    func: BuiltinFn,
}

impl NativeCallable for Builtin {
    fn name(&self) -> &str {
        self.name
    }

    fn call(
        &self,
        thread: &mut Thread,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, String> {
        (self.func)(thread, args, kwargs).map_err(|msg| format!("{}: {}", self.name, msg))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

static UNIVERSE: Lazy<HashMap<&'static str, Value>> = Lazy::new(|| {
    let table: [(&'static str, BuiltinFn); 28] = [
        ("abs", abs),
        ("all", all),
        ("any", any),
        ("bool", bool_),
        ("dict", dict),
        ("dir", dir),
        ("enumerate", enumerate),
        ("fail", fail),
        ("float", float),
        ("getattr", getattr),
        ("hasattr", hasattr),
        ("int", int),
        ("len", len),
        ("list", list),
        ("max", max),
        ("min", min),
        ("print", print),
        ("range", range),
        ("repr", repr),
        ("reversed", reversed),
        ("set", set),
        ("sorted", sorted),
        ("str", str_),
        ("tuple", tuple),
        ("type", type_),
        ("zip", zip),
        ("hash", hash),
        ("bytes", bytes),
    ];
    table
        .into_iter()
        .map(|(name, func)| (name, Value::native(Builtin { name, func })))
        .collect()
});

/// Names every program can see without declaring them.
pub fn universe() -> &'static HashMap<&'static str, Value> {
    &UNIVERSE
}

pub fn is_universal(name: &str) -> bool {
    UNIVERSE.contains_key(name)
}

/// Calls a Starlark callable from inside a builtin.
pub(crate) fn call_back(thread: &mut Thread, callee: &Value, args: Vec<Value>) -> Result<Value, String> {
    call(thread, callee, args, Vec::new()).map_err(|err| err.msg)
}

fn one(args: Vec<Value>, kwargs: Vec<(String, Value)>, name: &str) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &[name])?;
    Ok(required(&mut slots[0]))
}

fn abs(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    match one(args, kwargs, "x")? {
        Value::Int(i) => Ok(Value::Int(i.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(format!("got {}, want int or float", other.type_name())),
    }
}

fn all(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let items = one(args, kwargs, "x")?.iterate()?;
    Ok(Value::Bool(items.iter().all(Value::truth)))
}

fn any(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let items = one(args, kwargs, "x")?.iterate()?;
    Ok(Value::Bool(items.iter().any(Value::truth)))
}

fn bool_(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let slots = args::positional(args, kwargs, &["x?"])?;
    Ok(Value::Bool(slots[0].as_ref().is_some_and(Value::truth)))
}

fn bytes(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    match one(args, kwargs, "x")? {
        Value::String(s) => Ok(Value::bytes(s.as_bytes())),
        value @ Value::Bytes(_) => Ok(value),
        other => {
            let mut out = Vec::new();
            for item in other.iterate()? {
                match item.as_i64().and_then(|i| u8::try_from(i).ok()) {
                    Some(byte) => out.push(byte),
                    None => return Err(format!("invalid byte value {}", item.repr())),
                }
            }
            Ok(Value::bytes(out))
        }
    }
}

/// Adds `pairs` then `kwargs` to `dict`, the way `dict()` and `dict.update`
/// do.
pub(crate) fn update_dict(
    dict: &Dict,
    pairs: Option<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<(), String> {
    match pairs {
        None => {}
        Some(Value::Dict(other)) => {
            for (key, value) in other.snapshot() {
                dict.insert(key, value)?;
            }
        }
        Some(pairs) => {
            for (i, pair) in pairs.iterate()?.into_iter().enumerate() {
                let items = pair.iterate().map_err(|_| {
                    format!(
                        "dictionary update sequence element #{} is not iterable ({})",
                        i,
                        pair.type_name()
                    )
                })?;
                let [key, value]: [Value; 2] = items.try_into().map_err(|items: Vec<Value>| {
                    format!(
                        "dictionary update sequence element #{} has length {}, want 2",
                        i,
                        items.len()
                    )
                })?;
                dict.insert(key, value)?;
            }
        }
    }
    for (key, value) in kwargs {
        dict.insert(Value::from(key), value)?;
    }
    Ok(())
}

fn dict(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    if args.len() > 1 {
        return Err(format!("got {} arguments, want at most 1", args.len()));
    }
    let out = Dict::default();
    update_dict(&out, args.into_iter().next(), kwargs)?;
    Ok(Value::Dict(Arc::new(out)))
}

fn dir(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let value = one(args, kwargs, "x")?;
    let mut names = methods::names(&value);
    names.sort_unstable();
    Ok(Value::new_list(names.into_iter().map(Value::from).collect()))
}

fn enumerate(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = unpack(args, kwargs, &["iterable", "start?"])?;
    let start = match present(slots[1].take()) {
        Some(start) => int_arg(&start, "start")?,
        None => 0,
    };
    let items = required(&mut slots[0]).iterate()?;
    Ok(Value::new_list(
        items
            .into_iter()
            .zip(start..)
            .map(|(item, i)| Value::new_tuple(vec![Value::from(i), item]))
            .collect(),
    ))
}

fn join_args(args: &[Value], kwargs: Vec<(String, Value)>) -> Result<String, String> {
    let mut sep = " ".to_string();
    for (key, value) in kwargs {
        if key != "sep" {
            return Err(format!("unexpected keyword argument {}", key));
        }
        sep = str_arg(&value, "sep")?.to_string();
    }
    Ok(args
        .iter()
        .map(Value::to_str)
        .collect::<Vec<_>>()
        .join(&sep))
}

fn fail(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    Err(join_args(&args, kwargs)?)
}

fn float(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["x?"])?;
    let Some(value) = slots[0].take() else {
        return Ok(Value::Float(0.0));
    };
    match value {
        Value::Bool(b) => Ok(Value::Float(if b { 1.0 } else { 0.0 })),
        Value::Int(i) => Ok(Value::Float(int_to_f64(&i)?)),
        Value::Float(_) => Ok(value),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("invalid float literal: {}", s)),
        other => Err(format!("got {}, want number or string", other.type_name())),
    }
}

fn getattr(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["x", "name", "default?"])?;
    let value = required(&mut slots[0]);
    let name = required(&mut slots[1]);
    let name = str_arg(&name, "name")?;
    match (attr(&value, name), slots[2].take()) {
        (Some(found), _) => Ok(found),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(format!(
            "{} has no .{} field or method",
            value.type_name(),
            name
        )),
    }
}

fn hasattr(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["x", "name"])?;
    let value = required(&mut slots[0]);
    let name = required(&mut slots[1]);
    Ok(Value::Bool(attr(&value, str_arg(&name, "name")?).is_some()))
}

fn hash(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    // 32-bit FNV-1a, stable across runs.
    let value = one(args, kwargs, "x")?;
    let bytes: &[u8] = match &value {
        Value::String(s) => s.as_bytes(),
        Value::Bytes(b) => b,
        other => return Err(format!("got {}, want string or bytes", other.type_name())),
    };
    let h = bytes.iter().fold(2166136261u32, |h, b| {
        (h ^ u32::from(*b)).wrapping_mul(16777619)
    });
    Ok(Value::int(h as i32))
}

fn parse_int(s: &str, base: Option<u32>) -> Result<BigInt, String> {
    let invalid = || {
        format!(
            "invalid literal with base {}: {}",
            base.unwrap_or(10),
            Value::from(s).repr()
        )
    };
    let trimmed = s.trim();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let lower = unsigned.to_ascii_lowercase();
    let detected = [("0x", 16), ("0o", 8), ("0b", 2)]
        .into_iter()
        .find(|(prefix, _)| lower.starts_with(prefix))
        .map(|(prefix, radix)| (radix, &unsigned[prefix.len()..]));
    let (radix, digits) = match (base, detected) {
        (None | Some(0), Some(found)) => found,
        (None, None) => (10, unsigned),
        (Some(0), None) => {
            if unsigned.len() > 1 && unsigned.starts_with('0') {
                return Err(invalid());
            }
            (10, unsigned)
        }
        (Some(b), Some((radix, digits))) if b == radix => (radix, digits),
        (Some(b), _) => (b, unsigned),
    };
    if !(2..=36).contains(&radix) || digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(invalid());
    }
    let magnitude = BigInt::parse_bytes(digits.as_bytes(), radix).ok_or_else(invalid)?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn int(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = unpack(args, kwargs, &["x?", "base?"])?;
    let base = match slots[1].take() {
        Some(base) => Some(
            u32::try_from(int_arg(&base, "base")?)
                .ok()
                .filter(|b| *b == 0 || (2..=36).contains(b))
                .ok_or_else(|| "base must be an integer >= 2 && <= 36".to_string())?,
        ),
        None => None,
    };
    let Some(value) = slots[0].take() else {
        return Ok(Value::int(0));
    };
    match value {
        Value::String(s) => Ok(Value::Int(parse_int(&s, base)?)),
        _ if base.is_some() => Err("can't convert non-string with explicit base".to_string()),
        Value::Bool(b) => Ok(Value::int(i64::from(b))),
        Value::Int(_) => Ok(value),
        Value::Float(f) => BigInt::from_f64(f.trunc())
            .map(Value::Int)
            .ok_or_else(|| format!("cannot convert float {} to integer", value)),
        other => Err(format!("got {}, want string, int or float", other.type_name())),
    }
}

fn len(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let value = one(args, kwargs, "x")?;
    value
        .len()
        .map(|n| Value::int(n as u64))
        .ok_or_else(|| format!("value of type {} has no len", value.type_name()))
}

fn list(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["iterable?"])?;
    let items = match slots[0].take() {
        Some(iterable) => iterable.iterate()?,
        None => Vec::new(),
    };
    Ok(Value::new_list(items))
}

fn extremum(
    thread: &mut Thread,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    want: Ordering,
) -> Result<Value, String> {
    let mut key = None;
    for (name, value) in kwargs {
        if name != "key" {
            return Err(format!("unexpected keyword argument {}", name));
        }
        key = present(Some(value));
    }
    let items = match <[Value; 1]>::try_from(args) {
        Ok([iterable]) => iterable.iterate()?,
        Err(args) if args.is_empty() => return Err("got 0 arguments, want at least 1".to_string()),
        Err(args) => args,
    };

    let mut best: Option<(Value, Value)> = None;
    for item in items {
        let k = match &key {
            Some(f) => call_back(thread, f, vec![item.clone()])?,
            None => item.clone(),
        };
        best = match best {
            Some((best_key, best_item)) if compare(&k, &best_key)? != want => {
                Some((best_key, best_item))
            }
            _ => Some((k, item)),
        };
    }
    best.map(|(_, item)| item)
        .ok_or_else(|| "argument is an empty sequence".to_string())
}

fn max(thread: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    extremum(thread, args, kwargs, Ordering::Greater)
}

fn min(thread: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    extremum(thread, args, kwargs, Ordering::Less)
}

fn print(thread: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let line = join_args(&args, kwargs)?;
    thread.print(&line);
    Ok(Value::None)
}

fn range(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let slots = args::positional(args, kwargs, &["start_or_stop", "stop?", "step?"])?;
    let ints = slots
        .iter()
        .flatten()
        .map(|v| int_arg(v, "range argument"))
        .collect::<Result<Vec<i64>, String>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err("got 0 arguments, want 1-3".to_string()),
    };
    if step == 0 {
        return Err("step argument must not be zero".to_string());
    }
    Ok(Value::Range(Range { start, stop, step }))
}

fn repr(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    Ok(Value::from(one(args, kwargs, "x")?.repr()))
}

fn reversed(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut items = one(args, kwargs, "sequence")?.iterate()?;
    items.reverse();
    Ok(Value::new_list(items))
}

fn set(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["iterable?"])?;
    let out = Set::default();
    if let Some(iterable) = slots[0].take() {
        for item in iterable.iterate()? {
            out.insert(item)?;
        }
    }
    Ok(Value::Set(Arc::new(out)))
}

fn sorted(thread: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = unpack(args, kwargs, &["iterable", "key?", "reverse?"])?;
    let items = required(&mut slots[0]).iterate()?;
    let reverse = slots[2].as_ref().is_some_and(Value::truth);
    let keys = match present(slots[1].take()) {
        Some(f) => items
            .iter()
            .map(|item| call_back(thread, &f, vec![item.clone()]))
            .collect::<Result<Vec<_>, _>>()?,
        None => items.clone(),
    };

    let mut order: Vec<usize> = (0..items.len()).collect();
    let mut failure = None;
    order.sort_by(|&i, &j| {
        let (a, b) = if reverse { (&keys[j], &keys[i]) } else { (&keys[i], &keys[j]) };
        compare(a, b).unwrap_or_else(|err| {
            failure.get_or_insert(err);
            Ordering::Equal
        })
    });
    if let Some(err) = failure {
        return Err(err);
    }
    Ok(Value::new_list(
        order.into_iter().map(|i| items[i].clone()).collect(),
    ))
}

fn str_(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    match one(args, kwargs, "x")? {
        value @ Value::String(_) => Ok(value),
        other => Ok(Value::from(other.to_str())),
    }
}

fn tuple(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["iterable?"])?;
    match slots[0].take() {
        Some(value @ Value::Tuple(_)) => Ok(value),
        Some(iterable) => Ok(Value::new_tuple(iterable.iterate()?)),
        None => Ok(Value::new_tuple(Vec::new())),
    }
}

fn type_(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    Ok(Value::from(one(args, kwargs, "x")?.type_name()))
}

fn zip(_: &mut Thread, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    if let Some((key, _)) = kwargs.first() {
        return Err(format!("unexpected keyword argument {}", key));
    }
    let columns = args
        .iter()
        .map(Value::iterate)
        .collect::<Result<Vec<_>, _>>()?;
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    Ok(Value::new_list(
        (0..rows)
            .map(|i| Value::new_tuple(columns.iter().map(|c| c[i].clone()).collect()))
            .collect(),
    ))
}
