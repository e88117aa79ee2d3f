use std::sync::Arc;

use starbridge_engine::Value as StarlarkValue;
use starbridge_engine::value::{Dict as StarlarkDict, Set as StarlarkSet};

use super::ConversionError;
use crate::bridge::BridgedFunction;
use crate::values::{HostSequence, Value};

/// Converts a host value into an engine value.
///
/// Sets convert whatever the dialect says; `allow_set` only governs whether
/// Starlark source may name `set`.
pub fn to_starlark(value: &Value) -> Result<StarlarkValue, ConversionError> {
    Ok(match value {
        Value::None => StarlarkValue::None,
        Value::Bool(b) => StarlarkValue::Bool(*b),
        Value::Int(i) => StarlarkValue::Int(i.clone()),
        Value::Float(f) => StarlarkValue::Float(*f),
        Value::Str(s) => StarlarkValue::string(s.as_str()),
        Value::Bytes(b) => StarlarkValue::bytes(b.as_slice()),
        Value::List(items) => StarlarkValue::new_list(convert_items(items, "list")?),
        Value::Tuple(items) => StarlarkValue::new_tuple(convert_items(items, "tuple")?),
        Value::Dict(dict) => {
            let target = Arc::new(StarlarkDict::default());
            for (key, value) in dict.iter() {
                let key = to_starlark(key)
                    .map_err(|err| err.prefixed("While converting key in Rust dict: "))?;
                let value = to_starlark(value).map_err(|err| {
                    err.prefixed(format!(
                        "While converting value of key {} in Rust dict: ",
                        key.repr()
                    ))
                })?;
                let (key_repr, value_repr) = (key.repr(), value.repr());
                target.insert(key, value).map_err(|reason| {
                    ConversionError::new(format!(
                        "While setting {} to {} in Starlark dict: {}",
                        key_repr, value_repr, reason
                    ))
                })?;
            }
            StarlarkValue::Dict(target)
        }
        Value::Set(set) => {
            let target = Arc::new(StarlarkSet::default());
            for item in set.iter() {
                let item = to_starlark(item)
                    .map_err(|err| err.prefixed("While converting value in Rust set: "))?;
                let item_repr = item.repr();
                target.insert(item).map_err(|reason| {
                    ConversionError::new(format!(
                        "While inserting {} into Starlark set: {}",
                        item_repr, reason
                    ))
                })?;
            }
            StarlarkValue::Set(target)
        }
        Value::Callable(function) => StarlarkValue::native(BridgedFunction::new(function.clone())),
        Value::Sequence(sequence) => StarlarkValue::new_list(convert_sequence(sequence)?),
        Value::Opaque(opaque) => {
            return Err(ConversionError::new(format!(
                "Don't know how to convert Rust {} to Starlark",
                opaque.type_name()
            )));
        }
    })
}

fn convert_items(items: &[Value], kind: &str) -> Result<Vec<StarlarkValue>, ConversionError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            to_starlark(item).map_err(|err| {
                err.prefixed(format!(
                    "While converting value at index {} in Rust {}: ",
                    i, kind
                ))
            })
        })
        .collect()
}

/// Pulls every element out of a host sequence. A failing `get` aborts the
/// conversion and becomes the cause of the error.
fn convert_sequence(
    sequence: &Arc<dyn HostSequence>,
) -> Result<Vec<StarlarkValue>, ConversionError> {
    let mut items = Vec::with_capacity(sequence.len());
    for i in 0..sequence.len() {
        let prefix = format!(
            "While converting value at index {} in Rust {}: ",
            i,
            sequence.type_name()
        );
        let item = match sequence.get(i) {
            Ok(item) => item,
            Err(err) => {
                let message = format!("{}{}", prefix, err);
                return Err(ConversionError::with_cause(message, Arc::from(err)));
            }
        };
        items.push(to_starlark(&item).map_err(|err| err.prefixed(&prefix))?);
    }
    Ok(items)
}
