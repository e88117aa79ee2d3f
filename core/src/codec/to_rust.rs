use starbridge_engine::Value as StarlarkValue;

use super::ConversionError;
use crate::bridge::BridgedFunction;
use crate::values::{Dict, Set, Value};

/// Converts an engine value into a host value.
///
/// Fails on values with no host counterpart (Starlark functions and
/// builtins) and on containers that contain themselves.
pub fn to_rust(value: &StarlarkValue) -> Result<Value, ConversionError> {
    Converter::default().convert(value)
}

#[derive(Default)]
struct Converter {
    /// Identities of the containers currently being converted.
    active: Vec<usize>,
}

impl Converter {
    fn convert(&mut self, value: &StarlarkValue) -> Result<Value, ConversionError> {
        Ok(match value {
            StarlarkValue::None => Value::None,
            StarlarkValue::Bool(b) => Value::Bool(*b),
            StarlarkValue::Int(i) => Value::Int(i.clone()),
            StarlarkValue::Float(f) => Value::Float(*f),
            StarlarkValue::String(s) => Value::Str(s.to_string()),
            StarlarkValue::Bytes(b) => Value::Bytes(b.to_vec()),
            StarlarkValue::Tuple(items) => Value::Tuple(self.convert_items(items, "tuple")?),
            StarlarkValue::Range(range) => {
                let items = range.materialize().map_err(|_| {
                    ConversionError::new(format!(
                        "Cannot convert Starlark range of {} elements to Rust",
                        range.len()
                    ))
                })?;
                Value::List(items.into_iter().map(Value::from).collect())
            }
            StarlarkValue::List(list) => {
                self.enter(value)?;
                let items = self.convert_items(&list.snapshot(), "list");
                self.active.pop();
                Value::List(items?)
            }
            StarlarkValue::Dict(dict) => {
                self.enter(value)?;
                let result = self.convert_dict(&dict.snapshot());
                self.active.pop();
                Value::Dict(result?)
            }
            StarlarkValue::Set(set) => {
                self.enter(value)?;
                let result = self.convert_set(&set.snapshot());
                self.active.pop();
                Value::Set(result?)
            }
            StarlarkValue::Native(native) => {
                match native.as_any().downcast_ref::<BridgedFunction>() {
                    Some(bridged) => Value::Callable(bridged.function().clone()),
                    None => return Err(unknown(value)),
                }
            }
            StarlarkValue::Function(_) => return Err(unknown(value)),
        })
    }

    fn enter(&mut self, value: &StarlarkValue) -> Result<(), ConversionError> {
        if let Some(id) = value.identity() {
            if self.active.contains(&id) {
                return Err(ConversionError::new(format!(
                    "Cannot convert cyclic Starlark {} to Rust",
                    value.type_name()
                )));
            }
            self.active.push(id);
        }
        Ok(())
    }

    fn convert_items(
        &mut self,
        items: &[StarlarkValue],
        kind: &str,
    ) -> Result<Vec<Value>, ConversionError> {
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let item = self.convert(item).map_err(|err| {
                err.prefixed(format!(
                    "While converting value at index {} in Starlark {}: ",
                    i, kind
                ))
            })?;
            out.push(item);
        }
        Ok(out)
    }

    fn convert_dict(
        &mut self,
        entries: &[(StarlarkValue, StarlarkValue)],
    ) -> Result<Dict, ConversionError> {
        let mut dict = Dict::new();
        for (key, value) in entries {
            let host_key = self
                .convert(key)
                .map_err(|err| err.prefixed("While converting key in Starlark dict: "))?;
            let host_value = self.convert(value).map_err(|err| {
                err.prefixed(format!(
                    "While converting value of key {} in Starlark dict: ",
                    key.repr()
                ))
            })?;
            if bridges_functions(&host_key) {
                dict.insert(host_key, host_value);
            } else {
                dict.push_unique(host_key, host_value);
            }
        }
        Ok(dict)
    }

    fn convert_set(&mut self, items: &[StarlarkValue]) -> Result<Set, ConversionError> {
        let mut set = Set::new();
        for item in items {
            let item = self
                .convert(item)
                .map_err(|err| err.prefixed("While converting value in Starlark set: "))?;
            if bridges_functions(&item) {
                set.insert(item);
            } else {
                set.push_unique(item);
            }
        }
        Ok(set)
    }
}

/// Engine keys are unique, and so are their conversions, except that two
/// distinct engine functions may bridge the same host function.
fn bridges_functions(key: &Value) -> bool {
    match key {
        Value::Callable(_) => true,
        Value::Tuple(items) => items.iter().any(bridges_functions),
        _ => false,
    }
}

fn unknown(value: &StarlarkValue) -> ConversionError {
    ConversionError::new(format!(
        "Don't know how to convert Starlark {} to Rust",
        value.type_name()
    ))
}
