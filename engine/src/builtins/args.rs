//! Argument unpacking for builtin functions and methods.

use num_traits::ToPrimitive;

use crate::value::Value;

/// Matches `args` and `kwargs` against `params`, in order.
///
/// A parameter name ending in `?` is optional. The result holds one slot
/// per parameter.
pub(crate) fn unpack(
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    params: &[&str],
) -> Result<Vec<Option<Value>>, String> {
    if args.len() > params.len() {
        return Err(format!(
            "got {} arguments, want at most {}",
            args.len(),
            params.len()
        ));
    }
    let names: Vec<&str> = params.iter().map(|p| p.trim_end_matches('?')).collect();
    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    for (slot, arg) in slots.iter_mut().zip(args) {
        *slot = Some(arg);
    }
    for (key, value) in kwargs {
        let Some(i) = names.iter().position(|name| *name == key) else {
            return Err(format!("unexpected keyword argument {}", key));
        };
        if slots[i].is_some() {
            return Err(format!("got multiple values for keyword argument {}", key));
        }
        slots[i] = Some(value);
    }
    for ((param, name), slot) in params.iter().zip(&names).zip(&slots) {
        if slot.is_none() && !param.ends_with('?') {
            return Err(format!("missing argument for {}", name));
        }
    }
    Ok(slots)
}

/// Like [`unpack`] for a builtin that accepts only positional arguments.
pub(crate) fn positional(
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    params: &[&str],
) -> Result<Vec<Option<Value>>, String> {
    if let Some((key, _)) = kwargs.first() {
        return Err(format!("unexpected keyword argument {}", key));
    }
    unpack(args, Vec::new(), params)
}

/// The value of a required slot.
pub(crate) fn required(slot: &mut Option<Value>) -> Value {
    slot.take().unwrap_or(Value::None)
}

pub(crate) fn int_arg(value: &Value, what: &str) -> Result<i64, String> {
    match value {
        Value::Int(i) => i
            .to_i64()
            .ok_or_else(|| format!("{} out of range", what)),
        other => Err(format!("for {}, got {}, want int", what, other.type_name())),
    }
}

pub(crate) fn str_arg<'v>(value: &'v Value, what: &str) -> Result<&'v str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("for {}, got {}, want string", what, value.type_name()))
}

/// An optional argument where `None` means absent.
pub(crate) fn present(slot: Option<Value>) -> Option<Value> {
    slot.filter(|v| !v.is_none())
}
