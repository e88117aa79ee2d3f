//! Operators: arithmetic, comparison, membership, indexing and slicing.

use std::cmp::Ordering;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::syntax::ast::{BinaryOp, UnaryOp};
use crate::value::{Dict, Range, Set, Value, compare, equals, int_to_f64};

use super::format::percent_format;

const MAX_SHIFT: usize = 512;

pub(crate) fn unary(op: UnaryOp, value: &Value) -> Result<Value, String> {
    let result = match (op, value) {
        (UnaryOp::Not, v) => Value::Bool(!v.truth()),
        (UnaryOp::Neg, Value::Int(i)) => Value::Int(-i),
        (UnaryOp::Neg, Value::Float(f)) => Value::Float(-f),
        (UnaryOp::Plus, Value::Int(_) | Value::Float(_)) => value.clone(),
        (UnaryOp::Invert, Value::Int(i)) => Value::Int(-i - 1),
        _ => {
            let symbol = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Plus => "+",
                UnaryOp::Invert => "~",
                UnaryOp::Not => "not ",
            };
            return Err(format!("unknown unary op: {}{}", symbol, value.type_name()));
        }
    };
    Ok(result)
}

fn unknown(op: BinaryOp, a: &Value, b: &Value) -> String {
    format!(
        "unknown binary op: {} {} {}",
        a.type_name(),
        op.symbol(),
        b.type_name()
    )
}

/// Both operands as floats, if at least one is a float and both are numbers.
fn float_pair(a: &Value, b: &Value) -> Result<Option<(f64, f64)>, String> {
    let pair = match (a, b) {
        (Value::Float(x), Value::Float(y)) => (*x, *y),
        (Value::Int(x), Value::Float(y)) => (int_to_f64(x)?, *y),
        (Value::Float(x), Value::Int(y)) => (*x, int_to_f64(y)?),
        _ => return Ok(None),
    };
    Ok(Some(pair))
}

/// Floor division and modulo with the sign of the divisor.
fn int_div_mod(a: &BigInt, b: &BigInt) -> (BigInt, BigInt) {
    let mut q = a / b;
    let mut r = a % b;
    if !r.is_zero() && (r.is_negative() != b.is_negative()) {
        q -= 1;
        r += b;
    }
    (q, r)
}

fn float_mod(x: f64, y: f64) -> f64 {
    let r = x % y;
    if r != 0.0 && (r < 0.0) != (y < 0.0) {
        r + y
    } else {
        r
    }
}

fn repeat<T: Clone>(items: &[T], n: &BigInt) -> Result<Vec<T>, String> {
    let n = n.to_usize().unwrap_or(0);
    if n > 0 && items.len().checked_mul(n).is_none_or(|total| total > 1 << 30) {
        return Err("excessive repeat count".to_string());
    }
    Ok(std::iter::repeat_n(items, n).flat_map(|s| s.iter().cloned()).collect())
}

pub(crate) fn binary(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, String> {
    use BinaryOp::*;

    let result = match op {
        Eq => Value::Bool(equals(a, b)?),
        Ne => Value::Bool(!equals(a, b)?),
        Lt | Le | Gt | Ge => Value::Bool(compare_op(op, a, b)?),
        In => Value::Bool(contains(b, a)?),
        NotIn => Value::Bool(!contains(b, a)?),
        And | Or => return Err(unknown(op, a, b)),
        Add => match (a, b) {
            (Value::Int(x), Value::Int(y)) => Value::Int(x + y),
            (Value::String(x), Value::String(y)) => Value::string(format!("{}{}", x, y)),
            (Value::Bytes(x), Value::Bytes(y)) => Value::bytes([&x[..], &y[..]].concat()),
            (Value::List(x), Value::List(y)) => {
                let mut items = x.snapshot();
                items.extend(y.snapshot());
                Value::new_list(items)
            }
            (Value::Tuple(x), Value::Tuple(y)) => Value::new_tuple([&x[..], &y[..]].concat()),
            _ => match float_pair(a, b)? {
                Some((x, y)) => Value::Float(x + y),
                None => return Err(unknown(op, a, b)),
            },
        },
        Sub => match (a, b) {
            (Value::Int(x), Value::Int(y)) => Value::Int(x - y),
            (Value::Set(x), Value::Set(y)) => {
                let out = Set::default();
                for item in x.snapshot() {
                    if !y.contains(&item)? {
                        out.insert(item)?;
                    }
                }
                Value::Set(Arc::new(out))
            }
            _ => match float_pair(a, b)? {
                Some((x, y)) => Value::Float(x - y),
                None => return Err(unknown(op, a, b)),
            },
        },
        Mul => match (a, b) {
            (Value::Int(x), Value::Int(y)) => Value::Int(x * y),
            (Value::String(s), Value::Int(n)) | (Value::Int(n), Value::String(s)) => {
                Value::string(repeat(s.as_bytes(), n).map(|bytes| {
                    String::from_utf8(bytes).unwrap_or_default()
                })?)
            }
            (Value::Bytes(s), Value::Int(n)) | (Value::Int(n), Value::Bytes(s)) => {
                Value::bytes(repeat(s, n)?)
            }
            (Value::List(l), Value::Int(n)) | (Value::Int(n), Value::List(l)) => {
                Value::new_list(repeat(&l.snapshot(), n)?)
            }
            (Value::Tuple(t), Value::Int(n)) | (Value::Int(n), Value::Tuple(t)) => {
                Value::new_tuple(repeat(t, n)?)
            }
            _ => match float_pair(a, b)? {
                Some((x, y)) => Value::Float(x * y),
                None => return Err(unknown(op, a, b)),
            },
        },
        Div => {
            let (x, y) = match (a, b) {
                (Value::Int(x), Value::Int(y)) => (int_to_f64(x)?, int_to_f64(y)?),
                _ => float_pair(a, b)?.ok_or_else(|| unknown(op, a, b))?,
            };
            if y == 0.0 {
                return Err("floating-point division by zero".to_string());
            }
            Value::Float(x / y)
        }
        FloorDiv => match (a, b) {
            (Value::Int(x), Value::Int(y)) => {
                if y.is_zero() {
                    return Err("integer division by zero".to_string());
                }
                Value::Int(int_div_mod(x, y).0)
            }
            _ => {
                let (x, y) = float_pair(a, b)?.ok_or_else(|| unknown(op, a, b))?;
                if y == 0.0 {
                    return Err("floating-point division by zero".to_string());
                }
                Value::Float((x / y).floor())
            }
        },
        Mod => match (a, b) {
            (Value::Int(x), Value::Int(y)) => {
                if y.is_zero() {
                    return Err("integer modulo by zero".to_string());
                }
                Value::Int(int_div_mod(x, y).1)
            }
            (Value::String(format), args) => Value::string(percent_format(format, args)?),
            _ => {
                let (x, y) = float_pair(a, b)?.ok_or_else(|| unknown(op, a, b))?;
                if y == 0.0 {
                    return Err("floating-point modulo by zero".to_string());
                }
                Value::Float(float_mod(x, y))
            }
        },
        BitOr => match (a, b) {
            (Value::Int(x), Value::Int(y)) => Value::Int(x | y),
            (Value::Dict(x), Value::Dict(y)) => {
                let out = Dict::default();
                for (k, v) in x.snapshot().into_iter().chain(y.snapshot()) {
                    out.insert(k, v)?;
                }
                Value::Dict(Arc::new(out))
            }
            (Value::Set(x), Value::Set(y)) => {
                let out = Set::default();
                for item in x.snapshot().into_iter().chain(y.snapshot()) {
                    out.insert(item)?;
                }
                Value::Set(Arc::new(out))
            }
            _ => return Err(unknown(op, a, b)),
        },
        BitAnd => match (a, b) {
            (Value::Int(x), Value::Int(y)) => Value::Int(x & y),
            (Value::Set(x), Value::Set(y)) => {
                let out = Set::default();
                for item in x.snapshot() {
                    if y.contains(&item)? {
                        out.insert(item)?;
                    }
                }
                Value::Set(Arc::new(out))
            }
            _ => return Err(unknown(op, a, b)),
        },
        BitXor => match (a, b) {
            (Value::Int(x), Value::Int(y)) => Value::Int(x ^ y),
            _ => return Err(unknown(op, a, b)),
        },
        Shl | Shr => match (a, b) {
            (Value::Int(x), Value::Int(y)) => {
                if y.is_negative() {
                    return Err("negative shift count".to_string());
                }
                let count = y.to_usize().filter(|n| *n < MAX_SHIFT);
                match (op, count) {
                    (Shl, Some(n)) => Value::Int(x << n),
                    (Shl, None) => return Err("shift count too large".to_string()),
                    (_, Some(n)) => Value::Int(x >> n),
                    (_, None) => Value::Int(if x.is_negative() {
                        BigInt::from(-1)
                    } else {
                        BigInt::zero()
                    }),
                }
            }
            _ => return Err(unknown(op, a, b)),
        },
    };
    Ok(result)
}

fn compare_op(op: BinaryOp, a: &Value, b: &Value) -> Result<bool, String> {
    // NaN compares false against everything.
    if let Some((x, y)) = float_pair(a, b)? {
        let Some(ordering) = x.partial_cmp(&y) else {
            return Ok(false);
        };
        return Ok(ordering_matches(op, ordering));
    }
    let ordering = compare(a, b).map_err(|_| unknown(op, a, b))?;
    Ok(ordering_matches(op, ordering))
}

fn ordering_matches(op: BinaryOp, ordering: Ordering) -> bool {
    match op {
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Ge => ordering != Ordering::Less,
        _ => false,
    }
}

/// `a += b`. Lists are extended in place, everything else rebinds.
pub(crate) fn augmented(op: BinaryOp, old: Value, rhs: Value) -> Result<Value, String> {
    if let (BinaryOp::Add, Value::List(list)) = (op, &old) {
        let items = rhs
            .iterate()
            .map_err(|_| unknown(op, &old, &rhs))?;
        list.mutate("apply += to", |current| current.extend(items))?;
        return Ok(old);
    }
    binary(op, &old, &rhs)
}

/// `item in container`.
pub(crate) fn contains(container: &Value, item: &Value) -> Result<bool, String> {
    match container {
        Value::String(s) => match item {
            Value::String(needle) => Ok(s.contains(&**needle)),
            other => Err(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            )),
        },
        Value::Bytes(b) => match item {
            Value::Bytes(needle) => Ok(needle.is_empty()
                || b.windows(needle.len()).any(|w| w == &needle[..])),
            Value::Int(i) => match i.to_u8() {
                Some(byte) => Ok(b.contains(&byte)),
                None => Err(format!("int in bytes: {} out of range", i)),
            },
            other => Err(format!(
                "'in bytes' requires bytes or int as left operand, not {}",
                other.type_name()
            )),
        },
        Value::List(_) | Value::Tuple(_) => {
            for element in container.iterate()? {
                if equals(&element, item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Dict(dict) => dict.contains(item),
        Value::Set(set) => set.contains(item),
        Value::Range(range) => Ok(match item.as_i64() {
            Some(i) => range.contains(i),
            None => false,
        }),
        _ => Err(format!(
            "unknown binary op: {} in {}",
            item.type_name(),
            container.type_name()
        )),
    }
}

fn sequence_index(index: &Value, len: usize, kind: &str) -> Result<usize, String> {
    let Value::Int(i) = index else {
        return Err(format!(
            "{} index: got {}, want int",
            kind,
            index.type_name()
        ));
    };
    let n = len as i64;
    let i = i.to_i64().unwrap_or(i64::MAX);
    let adjusted = if i < 0 { i + n } else { i };
    if adjusted < 0 || adjusted >= n {
        return Err(format!("index {} out of range [{}:{}]", i, -n, n));
    }
    Ok(adjusted as usize)
}

/// `object[index]`.
pub(crate) fn index(object: &Value, index: &Value) -> Result<Value, String> {
    match object {
        Value::List(list) => {
            let items = list.snapshot();
            let i = sequence_index(index, items.len(), "list")?;
            Ok(items[i].clone())
        }
        Value::Tuple(items) => {
            let i = sequence_index(index, items.len(), "tuple")?;
            Ok(items[i].clone())
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = sequence_index(index, chars.len(), "string")?;
            Ok(Value::string(chars[i].to_string()))
        }
        Value::Bytes(b) => {
            let i = sequence_index(index, b.len(), "bytes")?;
            Ok(Value::int(b[i]))
        }
        Value::Range(range) => {
            let i = sequence_index(index, range.len(), "range")?;
            range
                .get(i)
                .map(Value::int)
                .ok_or_else(|| format!("range index {} out of range", i))
        }
        Value::Dict(dict) => dict
            .get(index)?
            .ok_or_else(|| format!("key {} not in dict", index.repr())),
        _ => Err(format!(
            "unhandled index operation {}[{}]",
            object.type_name(),
            index.type_name()
        )),
    }
}

/// `object[index] = value`.
pub(crate) fn set_index(object: &Value, index: Value, value: Value) -> Result<(), String> {
    match object {
        Value::List(list) => {
            let i = sequence_index(&index, list.len(), "list")?;
            list.mutate("assign to element of", |items| {
                if let Some(slot) = items.get_mut(i) {
                    *slot = value;
                }
            })
        }
        Value::Dict(dict) => dict.insert(index, value),
        other => Err(format!(
            "{} value does not support item assignment",
            other.type_name()
        )),
    }
}

fn slice_bound(value: &Value, what: &str) -> Result<Option<i64>, String> {
    match value {
        Value::None => Ok(None),
        Value::Int(i) => Ok(Some(i.to_i64().unwrap_or(if i.is_negative() {
            i64::MIN / 2
        } else {
            i64::MAX / 2
        }))),
        other => Err(format!(
            "invalid slice {}: got {}, want int",
            what,
            other.type_name()
        )),
    }
}

/// Clamped `(start, stop, step)` of `[start:stop:step]` over `len` items.
fn slice_bounds(
    len: usize,
    start: &Value,
    stop: &Value,
    step: &Value,
) -> Result<(i64, i64, i64), String> {
    let step = slice_bound(step, "step")?.unwrap_or(1);
    if step == 0 {
        return Err("zero is not a valid slice step".to_string());
    }
    let n = i64::try_from(len).unwrap_or(i64::MAX);
    let clamp = |bound: Option<i64>, default: i64| -> i64 {
        match bound {
            None => default,
            Some(i) => {
                let i = if i < 0 { i.saturating_add(n) } else { i };
                if step > 0 {
                    i.clamp(0, n)
                } else {
                    i.clamp(-1, n - 1)
                }
            }
        }
    };
    Ok(if step > 0 {
        (
            clamp(slice_bound(start, "start")?, 0),
            clamp(slice_bound(stop, "end")?, n),
            step,
        )
    } else {
        (
            clamp(slice_bound(start, "start")?, n - 1),
            clamp(slice_bound(stop, "end")?, -1),
            step,
        )
    })
}

/// The element indices selected by `[start:stop:step]` over `len` items.
pub(crate) fn slice_indices(
    len: usize,
    start: &Value,
    stop: &Value,
    step: &Value,
) -> Result<Vec<usize>, String> {
    let (start, stop, step) = slice_bounds(len, start, stop, step)?;
    let mut indices = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        indices.push(i as usize);
        i = match i.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(indices)
}

/// `object[start:stop:step]`.
pub(crate) fn slice(object: &Value, start: &Value, stop: &Value, step: &Value) -> Result<Value, String> {
    let len = object.len().unwrap_or(0);
    match object {
        Value::List(list) => {
            let items = list.snapshot();
            let indices = slice_indices(len, start, stop, step)?;
            Ok(Value::new_list(indices.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Tuple(items) => {
            let indices = slice_indices(len, start, stop, step)?;
            Ok(Value::new_tuple(indices.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let indices = slice_indices(len, start, stop, step)?;
            Ok(Value::string(indices.into_iter().map(|i| chars[i]).collect::<String>()))
        }
        Value::Bytes(b) => {
            let indices = slice_indices(len, start, stop, step)?;
            Ok(Value::bytes(indices.into_iter().map(|i| b[i]).collect::<Vec<u8>>()))
        }
        Value::Range(range) => {
            let (first, last, step) = slice_bounds(len, start, stop, step)?;
            let count = Range {
                start: first,
                stop: last,
                step,
            }
            .len();
            if count == 0 {
                return Ok(Value::Range(Range {
                    start: 0,
                    stop: 0,
                    step: 1,
                }));
            }
            let new_start = range
                .get(first as usize)
                .ok_or_else(|| format!("range index {} out of range", first))?;
            let new_step = range.step as i128 * step as i128;
            let new_step = match i64::try_from(new_step) {
                Ok(new_step) => new_step,
                // A single element only needs the sign of the step.
                Err(_) if count == 1 => new_step.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
                Err(_) => return Err("range slice step out of range".to_string()),
            };
            // Only the length matters for the bound, so it saturates.
            let stop = new_start as i128 + new_step as i128 * count as i128;
            Ok(Value::Range(Range {
                start: new_start,
                stop: stop.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
                step: new_step,
            }))
        }
        other => Err(format!("invalid slice operand {}", other.type_name())),
    }
}
