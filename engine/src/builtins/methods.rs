//! Methods of the built-in types, looked up with `value.name`.

use std::any::Any;
use std::sync::Arc;

use crate::thread::Thread;
use crate::value::{Dict, HashedValue, List, NativeCallable, Set, Value, equals};

use super::args::{self, int_arg, present, required, str_arg, unpack};
use super::update_dict;

type MethodFn = fn(&mut Thread, &Value, Vec<Value>, Vec<(String, Value)>) -> Result<Value, String>;

/// A method together with the value it was looked up on.
struct BoundMethod {
    receiver: Value,
    name: &'static str,
    func: MethodFn,
}

impl NativeCallable for BoundMethod {
    fn name(&self) -> &str {
        self.name
    }

    fn call(
        &self,
        thread: &mut Thread,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, String> {
        (self.func)(thread, &self.receiver, args, kwargs)
            .map_err(|msg| format!("{}: {}", self.name, msg))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn repr(&self) -> String {
        format!(
            "<built-in method {} of {} value>",
            self.name,
            self.receiver.type_name()
        )
    }
}

const LIST_METHODS: &[(&str, MethodFn)] = &[
    ("append", list_append),
    ("clear", list_clear),
    ("extend", list_extend),
    ("index", list_index),
    ("insert", list_insert),
    ("pop", list_pop),
    ("remove", list_remove),
];

const DICT_METHODS: &[(&str, MethodFn)] = &[
    ("clear", dict_clear),
    ("get", dict_get),
    ("items", dict_items),
    ("keys", dict_keys),
    ("pop", dict_pop),
    ("setdefault", dict_setdefault),
    ("update", dict_update),
    ("values", dict_values),
];

const SET_METHODS: &[(&str, MethodFn)] = &[
    ("add", set_add),
    ("clear", set_clear),
    ("discard", set_discard),
    ("remove", set_remove),
    ("union", set_union),
];

const STRING_METHODS: &[(&str, MethodFn)] = &[
    ("count", string_count),
    ("endswith", string_endswith),
    ("find", string_find),
    ("format", string_format),
    ("join", string_join),
    ("lower", string_lower),
    ("lstrip", string_lstrip),
    ("replace", string_replace),
    ("rstrip", string_rstrip),
    ("split", string_split),
    ("startswith", string_startswith),
    ("strip", string_strip),
    ("upper", string_upper),
];

fn table(value: &Value) -> &'static [(&'static str, MethodFn)] {
    match value {
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Set(_) => SET_METHODS,
        Value::String(_) => STRING_METHODS,
        _ => &[],
    }
}

/// Looks up method `name` of `value`, bound to it.
pub fn attr(value: &Value, name: &str) -> Option<Value> {
    table(value)
        .iter()
        .find(|(method, _)| *method == name)
        .map(|&(method, func)| {
            Value::native(BoundMethod {
                receiver: value.clone(),
                name: method,
                func,
            })
        })
}

pub(crate) fn names(value: &Value) -> Vec<&'static str> {
    table(value).iter().map(|(name, _)| *name).collect()
}

fn receiver_error(value: &Value) -> String {
    format!("unexpected receiver {}", value.type_name())
}

fn list_of(value: &Value) -> Result<&Arc<List>, String> {
    match value {
        Value::List(list) => Ok(list),
        other => Err(receiver_error(other)),
    }
}

fn dict_of(value: &Value) -> Result<&Arc<Dict>, String> {
    match value {
        Value::Dict(dict) => Ok(dict),
        other => Err(receiver_error(other)),
    }
}

fn set_of(value: &Value) -> Result<&Arc<Set>, String> {
    match value {
        Value::Set(set) => Ok(set),
        other => Err(receiver_error(other)),
    }
}

fn str_of(value: &Value) -> Result<&str, String> {
    value.as_str().ok_or_else(|| receiver_error(value))
}

fn no_args(args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<(), String> {
    args::positional(args, kwargs, &[]).map(|_| ())
}

// list

fn list_append(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["x"])?;
    let item = required(&mut slots[0]);
    list_of(recv)?.mutate("append to", |items| items.push(item))?;
    Ok(Value::None)
}

fn list_clear(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    no_args(args, kwargs)?;
    list_of(recv)?.mutate("clear", Vec::clear)?;
    Ok(Value::None)
}

fn list_extend(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["iterable"])?;
    let extra = required(&mut slots[0]).iterate()?;
    list_of(recv)?.mutate("extend", |items| items.extend(extra))?;
    Ok(Value::None)
}

fn list_index(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["x"])?;
    let needle = required(&mut slots[0]);
    for (i, item) in list_of(recv)?.snapshot().iter().enumerate() {
        if equals(item, &needle)? {
            return Ok(Value::int(i as u64));
        }
    }
    Err("value not in list".to_string())
}

fn list_insert(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["index", "x"])?;
    let index = int_arg(&required(&mut slots[0]), "index")?;
    let item = required(&mut slots[1]);
    list_of(recv)?.mutate("insert into", |items| {
        let n = items.len() as i64;
        let i = if index < 0 { index + n } else { index };
        items.insert(i.clamp(0, n) as usize, item);
    })?;
    Ok(Value::None)
}

fn list_pop(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let slots = args::positional(args, kwargs, &["index?"])?;
    let index = match &slots[0] {
        Some(i) => int_arg(i, "index")?,
        None => -1,
    };
    list_of(recv)?
        .mutate("pop from", |items| {
            let n = items.len() as i64;
            let i = if index < 0 { index + n } else { index };
            if i < 0 || i >= n {
                return Err(format!("index {} out of range [{}:{}]", index, -n, n));
            }
            Ok(items.remove(i as usize))
        })?
}

fn list_remove(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["x"])?;
    let needle = required(&mut slots[0]);
    let list = list_of(recv)?;
    let mut position = None;
    for (i, item) in list.snapshot().iter().enumerate() {
        if equals(item, &needle)? {
            position = Some(i);
            break;
        }
    }
    let i = position.ok_or_else(|| "element not found".to_string())?;
    list.mutate("remove from", |items| {
        if i < items.len() {
            items.remove(i);
        }
    })?;
    Ok(Value::None)
}

// dict

fn dict_clear(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    no_args(args, kwargs)?;
    dict_of(recv)?.mutate("clear", |entries| entries.clear())?;
    Ok(Value::None)
}

fn dict_get(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["key", "default?"])?;
    let key = required(&mut slots[0]);
    Ok(dict_of(recv)?
        .get(&key)?
        .or_else(|| slots[1].take())
        .unwrap_or(Value::None))
}

fn dict_items(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    no_args(args, kwargs)?;
    Ok(Value::new_list(
        dict_of(recv)?
            .snapshot()
            .into_iter()
            .map(|(k, v)| Value::new_tuple(vec![k, v]))
            .collect(),
    ))
}

fn dict_keys(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    no_args(args, kwargs)?;
    Ok(Value::new_list(dict_of(recv)?.keys()))
}

fn dict_pop(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["key", "default?"])?;
    let key = required(&mut slots[0]);
    match (dict_of(recv)?.remove(&key)?, slots[1].take()) {
        (Some(value), _) => Ok(value),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(format!("missing key {}", key.repr())),
    }
}

fn dict_setdefault(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["key", "default?"])?;
    let key = required(&mut slots[0]);
    let dict = dict_of(recv)?;
    if let Some(existing) = dict.get(&key)? {
        return Ok(existing);
    }
    let default = slots[1].take().unwrap_or(Value::None);
    dict.insert(key, default.clone())?;
    Ok(default)
}

fn dict_update(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    if args.len() > 1 {
        return Err(format!("got {} arguments, want at most 1", args.len()));
    }
    update_dict(dict_of(recv)?, args.into_iter().next(), kwargs)?;
    Ok(Value::None)
}

fn dict_values(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    no_args(args, kwargs)?;
    Ok(Value::new_list(dict_of(recv)?.values()))
}

// set

fn set_add(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["x"])?;
    set_of(recv)?.insert(required(&mut slots[0]))?;
    Ok(Value::None)
}

fn set_clear(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    no_args(args, kwargs)?;
    set_of(recv)?.mutate("clear", |items| items.clear())?;
    Ok(Value::None)
}

fn set_take(recv: &Value, item: Value) -> Result<bool, String> {
    let item = HashedValue::new(item)?;
    set_of(recv)?.mutate("remove from", |items| items.shift_remove(&item))
}

fn set_discard(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["x"])?;
    set_take(recv, required(&mut slots[0]))?;
    Ok(Value::None)
}

fn set_remove(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["x"])?;
    let item = required(&mut slots[0]);
    if !set_take(recv, item.clone())? {
        return Err(format!("missing key {}", item.repr()));
    }
    Ok(Value::None)
}

fn set_union(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    if let Some((key, _)) = kwargs.first() {
        return Err(format!("unexpected keyword argument {}", key));
    }
    let out = Set::default();
    for item in set_of(recv)?.snapshot() {
        out.insert(item)?;
    }
    for iterable in args {
        for item in iterable.iterate()? {
            out.insert(item)?;
        }
    }
    Ok(Value::Set(Arc::new(out)))
}

// string

fn string_count(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["sub"])?;
    let sub = required(&mut slots[0]);
    let sub = str_arg(&sub, "sub")?;
    let s = str_of(recv)?;
    let n = if sub.is_empty() {
        s.chars().count() + 1
    } else {
        s.matches(sub).count()
    };
    Ok(Value::int(n as u64))
}

/// The strings a `startswith`/`endswith` argument stands for.
fn affixes(value: &Value) -> Result<Vec<String>, String> {
    match value {
        Value::String(s) => Ok(vec![s.to_string()]),
        Value::Tuple(items) => items
            .iter()
            .map(|item| str_arg(item, "affix").map(str::to_string))
            .collect(),
        other => Err(format!("got {}, want string or tuple", other.type_name())),
    }
}

fn string_endswith(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["suffix"])?;
    let s = str_of(recv)?;
    let suffixes = affixes(&required(&mut slots[0]))?;
    Ok(Value::Bool(suffixes.iter().any(|x| s.ends_with(x.as_str()))))
}

fn string_find(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["sub"])?;
    let sub = required(&mut slots[0]);
    let recv = str_of(recv)?;
    let found = recv.find(str_arg(&sub, "sub")?);
    Ok(match found {
        Some(i) => Value::int(recv[..i].chars().count() as u64),
        None => Value::int(-1),
    })
}

fn string_format(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut out = String::new();
    let mut auto = 0;
    let mut chars = str_of(recv)?.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err("single '}' in format".to_string()),
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => return Err("unmatched '{' in format".to_string()),
                    }
                }
                let (name, conversion) = match field.split_once('!') {
                    Some((name, conversion)) => (name, Some(conversion)),
                    None => (field.as_str(), None),
                };
                let value = if name.is_empty() {
                    auto += 1;
                    args.get(auto - 1)
                        .ok_or_else(|| "not enough arguments for format string".to_string())?
                } else if let Ok(i) = name.parse::<usize>() {
                    args.get(i)
                        .ok_or_else(|| format!("tuple index out of range: {}", i))?
                } else {
                    kwargs
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| value)
                        .ok_or_else(|| format!("keyword {} not found", name))?
                };
                match conversion {
                    Some("r") => out.push_str(&value.repr()),
                    None | Some("s") => out.push_str(&value.to_str()),
                    Some(other) => return Err(format!("unknown conversion {:?}", other)),
                }
            }
            c => out.push(c),
        }
    }
    Ok(Value::from(out))
}

fn string_join(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["iterable"])?;
    let iterable = required(&mut slots[0]);
    let parts = iterable
        .iterate()?
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                format!(
                    "in {}, want string, got {}",
                    iterable.type_name(),
                    item.type_name()
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::from(parts.join(str_of(recv)?)))
}

fn string_lower(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    no_args(args, kwargs)?;
    Ok(Value::from(str_of(recv)?.to_lowercase()))
}

fn string_upper(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    no_args(args, kwargs)?;
    Ok(Value::from(str_of(recv)?.to_uppercase()))
}

enum Side {
    Left,
    Right,
    Both,
}

fn strip(recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>, side: Side) -> Result<Value, String> {
    let slots = args::positional(args, kwargs, &["chars?"])?;
    let s = str_of(recv)?;
    let chars: Option<Vec<char>> = match present(slots.into_iter().next().flatten()) {
        Some(chars) => Some(str_arg(&chars, "chars")?.chars().collect()),
        None => None,
    };
    let strip_char = |c: char| match &chars {
        Some(set) => set.contains(&c),
        None => c.is_whitespace(),
    };
    let out = match side {
        Side::Left => s.trim_start_matches(strip_char),
        Side::Right => s.trim_end_matches(strip_char),
        Side::Both => s.trim_matches(strip_char),
    };
    Ok(Value::from(out))
}

fn string_lstrip(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    strip(recv, args, kwargs, Side::Left)
}

fn string_rstrip(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    strip(recv, args, kwargs, Side::Right)
}

fn string_strip(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    strip(recv, args, kwargs, Side::Both)
}

fn string_replace(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["old", "new", "count?"])?;
    let old = required(&mut slots[0]);
    let new = required(&mut slots[1]);
    let (old, new) = (str_arg(&old, "old")?, str_arg(&new, "new")?);
    let s = str_of(recv)?;
    let out = match &slots[2] {
        Some(count) => match int_arg(count, "count")? {
            n if n < 0 => s.replace(old, new),
            n => s.replacen(old, new, n as usize),
        },
        None => s.replace(old, new),
    };
    Ok(Value::from(out))
}

fn string_split(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = unpack(args, kwargs, &["sep?", "maxsplit?"])?;
    let s = str_of(recv)?;
    let limit = match present(slots[1].take()) {
        Some(n) => int_arg(&n, "maxsplit")?,
        None => -1,
    };
    let parts: Vec<&str> = match present(slots[0].take()) {
        Some(sep) => {
            let sep = str_arg(&sep, "sep")?;
            if sep.is_empty() {
                return Err("empty separator".to_string());
            }
            if limit < 0 {
                s.split(sep).collect()
            } else {
                s.splitn(limit as usize + 1, sep).collect()
            }
        }
        None => split_whitespace(s, limit),
    };
    Ok(Value::new_list(parts.into_iter().map(Value::from).collect()))
}

/// Splits on runs of whitespace, leaving the remainder after `limit` splits
/// intact apart from its leading whitespace.
fn split_whitespace(s: &str, limit: i64) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if limit >= 0 && parts.len() as i64 == limit {
            parts.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(rest);
                break;
            }
        }
    }
    parts
}

fn string_startswith(_: &mut Thread, recv: &Value, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, String> {
    let mut slots = args::positional(args, kwargs, &["prefix"])?;
    let s = str_of(recv)?;
    let prefixes = affixes(&required(&mut slots[0]))?;
    Ok(Value::Bool(prefixes.iter().any(|x| s.starts_with(x.as_str()))))
}
