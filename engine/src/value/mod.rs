//! Runtime values of the interpreter.
//!
//! `Value` is cheap to clone: scalars are stored inline, strings and tuples
//! behind an `Arc`, and the mutable containers behind an `Arc` with an
//! internal lock. Containers hand out snapshots rather than guards so that no
//! lock is held while evaluation recurses.

mod compare;
mod containers;
mod function;
mod repr;

#[cfg(test)]
mod value_test;

use std::any::Any;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::thread::Thread;

pub(crate) use compare::int_to_f64;
pub use compare::{HashedValue, compare, equals};
pub use containers::{Dict, List, Set};
pub use function::Function;
pub(crate) use function::{ModuleEnv, Scope};
pub use repr::format_float;

/// A function implemented in Rust and callable from Starlark.
pub trait NativeCallable: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn call(
        &self,
        thread: &mut Thread,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, String>;

    /// Lets embedders recover their concrete callable from a [`Value`].
    fn as_any(&self) -> &dyn Any;

    fn repr(&self) -> String {
        format!("<built-in function {}>", self.name())
    }
}

/// An immutable arithmetic progression produced by `range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    /// Longest range that may be turned into a list.
    pub const MATERIALIZE_LIMIT: usize = 1 << 24;

    pub fn len(&self) -> usize {
        let (start, stop, step) = (self.start as i128, self.stop as i128, self.step as i128);
        let n = if step > 0 && start < stop {
            (stop - start + step - 1) / step
        } else if step < 0 && start > stop {
            (start - stop - step - 1) / -step
        } else {
            0
        };
        n as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        let value = self.start as i128 + self.step as i128 * index as i128;
        i64::try_from(value).ok()
    }

    pub fn contains(&self, value: i64) -> bool {
        let offset = value as i128 - self.start as i128;
        let step = self.step as i128;
        offset % step == 0 && offset / step >= 0 && ((offset / step) as u128) < self.len() as u128
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len()).map_while(|i| self.get(i))
    }

    /// Elements as a list, refusing ranges longer than
    /// [`Range::MATERIALIZE_LIMIT`].
    pub fn materialize(&self) -> Result<Vec<i64>, String> {
        let len = self.len();
        if len > Self::MATERIALIZE_LIMIT {
            return Err(format!("range of {} elements is too large to materialize", len));
        }
        Ok(self.iter().collect())
    }
}

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
    List(Arc<List>),
    Tuple(Arc<[Value]>),
    Dict(Arc<Dict>),
    Set(Arc<Set>),
    Function(Arc<Function>),
    Native(Arc<dyn NativeCallable>),
    Range(Range),
}

impl Value {
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn bytes(b: impl Into<Arc<[u8]>>) -> Self {
        Value::Bytes(b.into())
    }

    pub fn int(i: impl Into<BigInt>) -> Self {
        Value::Int(i.into())
    }

    pub fn new_list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(List::new(items)))
    }

    pub fn new_tuple(items: Vec<Value>) -> Self {
        Value::Tuple(items.into())
    }

    pub fn new_dict() -> Self {
        Value::Dict(Arc::new(Dict::default()))
    }

    pub fn new_set() -> Self {
        Value::Set(Arc::new(Set::default()))
    }

    pub fn native(callable: impl NativeCallable) -> Self {
        Value::Native(Arc::new(callable))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::Function(_) => "function",
            Value::Native(_) => "builtin_function_or_method",
            Value::Range(_) => "range",
        }
    }

    pub fn truth(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => !i.is_zero(),
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(list) => list.len() > 0,
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(dict) => dict.len() > 0,
            Value::Set(set) => set.len() > 0,
            Value::Function(_) | Value::Native(_) => true,
            Value::Range(range) => !range.is_empty(),
        }
    }

    /// Number of elements, for the types that have one. Strings count bytes
    /// of their UTF-8 encoding.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::Bytes(b) => Some(b.len()),
            Value::List(list) => Some(list.len()),
            Value::Tuple(items) => Some(items.len()),
            Value::Dict(dict) => Some(dict.len()),
            Value::Set(set) => Some(set.len()),
            Value::Range(range) => Some(range.len()),
            _ => None,
        }
    }

    /// Snapshot of the elements produced by iterating over this value.
    pub fn iterate(&self) -> Result<Vec<Value>, String> {
        match self {
            Value::List(list) => Ok(list.snapshot()),
            Value::Tuple(items) => Ok(items.to_vec()),
            Value::Dict(dict) => Ok(dict.keys()),
            Value::Set(set) => Ok(set.snapshot()),
            Value::Range(range) => Ok(range.materialize()?.into_iter().map(Value::int).collect()),
            other => Err(format!("got {}, want iterable", other.type_name())),
        }
    }

    /// Like [`Value::iterate`], but a `range` yields its elements lazily.
    pub fn elements(&self) -> Result<Box<dyn Iterator<Item = Value>>, String> {
        match self {
            Value::Range(range) => {
                let range = *range;
                Ok(Box::new((0..range.len()).map_while(move |i| range.get(i).map(Value::int))))
            }
            other => Ok(Box::new(other.iterate()?.into_iter())),
        }
    }

    /// Makes this value and everything reachable from it immutable.
    pub fn freeze(&self) {
        match self {
            Value::List(list) => list.freeze(),
            Value::Tuple(items) => items.iter().for_each(Value::freeze),
            Value::Dict(dict) => dict.freeze(),
            Value::Set(set) => set.freeze(),
            Value::Function(function) => function.freeze(),
            _ => {}
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => i.to_i64(),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    /// Address used to detect cycles and identity. `None` for values
    /// without identity.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::List(list) => Some(Arc::as_ptr(list) as usize),
            Value::Dict(dict) => Some(Arc::as_ptr(dict) as usize),
            Value::Set(set) => Some(Arc::as_ptr(set) as usize),
            Value::Tuple(items) => Some(items.as_ptr() as usize),
            Value::Function(function) => Some(Arc::as_ptr(function) as usize),
            Value::Native(native) => Some(Arc::as_ptr(native) as *const () as usize),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.repr())
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_str())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        equals(self, other).unwrap_or(false)
    }
}
