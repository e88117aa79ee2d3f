//! Equality, ordering and hashing.

use std::cmp::Ordering;
use std::hash::{DefaultHasher, Hash, Hasher};

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};

use super::Value;

const MAX_DEPTH: usize = 100;

/// A value paired with its hash, usable as a dict key or set element.
#[derive(Clone)]
pub struct HashedValue {
    value: Value,
    hash: u64,
}

impl HashedValue {
    /// Fails with `unhashable type: <type>` for mutable containers.
    pub fn new(value: Value) -> Result<Self, String> {
        let mut hasher = DefaultHasher::new();
        hash_into(&value, &mut hasher)?;
        Ok(Self {
            hash: hasher.finish(),
            value,
        })
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

impl Hash for HashedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialEq for HashedValue {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && equals(&self.value, &other.value).unwrap_or(false)
    }
}

impl Eq for HashedValue {}

impl std::fmt::Debug for HashedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value.fmt(f)
    }
}

/// Integral floats hash like the equal int so that `1` and `1.0` collide.
fn hash_into(value: &Value, state: &mut DefaultHasher) -> Result<(), String> {
    match value {
        Value::None => state.write_u8(0),
        Value::Bool(b) => {
            state.write_u8(1);
            b.hash(state);
        }
        Value::Int(i) => {
            state.write_u8(2);
            i.hash(state);
        }
        Value::Float(f) => match float_to_int(*f) {
            Some(i) => {
                state.write_u8(2);
                i.hash(state);
            }
            None => {
                state.write_u8(3);
                f.to_bits().hash(state);
            }
        },
        Value::String(s) => {
            state.write_u8(4);
            s.hash(state);
        }
        Value::Bytes(b) => {
            state.write_u8(5);
            b.hash(state);
        }
        Value::Tuple(items) => {
            state.write_u8(6);
            for item in items.iter() {
                hash_into(item, state)?;
            }
        }
        Value::Function(_) | Value::Native(_) => {
            state.write_u8(7);
            value.identity().hash(state);
        }
        Value::List(_) | Value::Dict(_) | Value::Set(_) | Value::Range(_) => {
            return Err(format!("unhashable type: {}", value.type_name()));
        }
    }
    Ok(())
}

fn float_to_int(f: f64) -> Option<BigInt> {
    if f.is_finite() && f.fract() == 0.0 {
        BigInt::from_f64(f)
    } else {
        None
    }
}

fn int_float_cmp(i: &BigInt, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f.is_infinite() {
        return Some(if f > 0.0 {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }
    let floor = BigInt::from_f64(f.floor())?;
    match i.cmp(&floor) {
        Ordering::Equal if f.fract() != 0.0 => Some(Ordering::Less),
        ordering => Some(ordering),
    }
}

/// Starlark `==`. Fails only when the comparison nests too deeply.
pub fn equals(a: &Value, b: &Value) -> Result<bool, String> {
    equals_depth(a, b, 0)
}

fn equals_depth(a: &Value, b: &Value, depth: usize) -> Result<bool, String> {
    if depth > MAX_DEPTH {
        return Err("comparison exceeded maximum recursion depth".to_string());
    }
    let eq = match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => {
            int_float_cmp(i, *f) == Some(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            std::sync::Arc::ptr_eq(x, y) || seq_equals(&x.snapshot(), &y.snapshot(), depth)?
        }
        (Value::Tuple(x), Value::Tuple(y)) => seq_equals(x, y, depth)?,
        (Value::Dict(x), Value::Dict(y)) => {
            if std::sync::Arc::ptr_eq(x, y) {
                return Ok(true);
            }
            if x.len() != y.len() {
                return Ok(false);
            }
            for (key, value) in x.snapshot() {
                match y.get(&key)? {
                    Some(other) if equals_depth(&value, &other, depth + 1)? => {}
                    _ => return Ok(false),
                }
            }
            true
        }
        (Value::Set(x), Value::Set(y)) => {
            if x.len() != y.len() {
                return Ok(false);
            }
            for item in x.snapshot() {
                if !y.contains(&item)? {
                    return Ok(false);
                }
            }
            true
        }
        (Value::Range(x), Value::Range(y)) => {
            let len = x.len();
            len == y.len() && (len == 0 || (x.start == y.start && (len == 1 || x.step == y.step)))
        }
        (Value::Function(_), Value::Function(_)) | (Value::Native(_), Value::Native(_)) => {
            a.identity() == b.identity()
        }
        _ => false,
    };
    Ok(eq)
}

fn seq_equals(x: &[Value], y: &[Value], depth: usize) -> Result<bool, String> {
    if x.len() != y.len() {
        return Ok(false);
    }
    for (a, b) in x.iter().zip(y) {
        if !equals_depth(a, b, depth + 1)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Ordering used by `<`, `sorted`, `min` and `max`. NaN sorts after every
/// other number.
pub fn compare(a: &Value, b: &Value) -> Result<Ordering, String> {
    compare_depth(a, b, 0)
}

fn compare_depth(a: &Value, b: &Value, depth: usize) -> Result<Ordering, String> {
    if depth > MAX_DEPTH {
        return Err("comparison exceeded maximum recursion depth".to_string());
    }
    let ordering = match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => float_cmp(*x, *y),
        (Value::Int(i), Value::Float(f)) => int_float_cmp(i, *f).unwrap_or(Ordering::Less),
        (Value::Float(f), Value::Int(i)) => int_float_cmp(i, *f)
            .map(Ordering::reverse)
            .unwrap_or(Ordering::Greater),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        (Value::List(x), Value::List(y)) => seq_compare(&x.snapshot(), &y.snapshot(), depth)?,
        (Value::Tuple(x), Value::Tuple(y)) => seq_compare(x, y, depth)?,
        _ => {
            return Err(format!(
                "{} < {} not implemented",
                a.type_name(),
                b.type_name()
            ));
        }
    };
    Ok(ordering)
}

fn float_cmp(x: f64, y: f64) -> Ordering {
    match x.partial_cmp(&y) {
        Some(ordering) => ordering,
        None => x.is_nan().cmp(&y.is_nan()),
    }
}

fn seq_compare(x: &[Value], y: &[Value], depth: usize) -> Result<Ordering, String> {
    for (a, b) in x.iter().zip(y) {
        if !equals_depth(a, b, depth + 1)? {
            return compare_depth(a, b, depth + 1);
        }
    }
    Ok(x.len().cmp(&y.len()))
}

/// Converts an int to `f64`, failing when it is out of range.
pub(crate) fn int_to_f64(i: &BigInt) -> Result<f64, String> {
    match i.to_f64() {
        Some(f) if f.is_finite() => Ok(f),
        _ => Err("int too large to convert to float".to_string()),
    }
}
