use core::fmt::Write;

use crate::syntax::string_literal::{QuoteStyle, escape_bytes, escape_string};

use super::Value;

impl Value {
    /// The Starlark source-like representation, as produced by `repr()`.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        write_repr(&mut out, self, &mut Vec::new());
        out
    }

    /// The `str()` form: strings unquoted, everything else as [`Value::repr`].
    pub fn to_str(&self) -> String {
        match self {
            Value::String(s) => s.to_string(),
            other => other.repr(),
        }
    }
}

/// Formats a float the way `repr` does: always with a fraction or exponent.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+inf" } else { "-inf" }.to_string();
    }
    let s = format!("{:?}", value);
    match s.find('e') {
        Some(e) if !s[e + 1..].starts_with('-') => format!("{}e+{}", &s[..e], &s[e + 1..]),
        _ => s,
    }
}

// `seen` holds the containers currently being printed, to cut cycles.
fn write_repr(out: &mut String, value: &Value, seen: &mut Vec<usize>) {
    match value {
        Value::None => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Int(i) => {
            let _ = write!(out, "{}", i);
        }
        Value::Float(f) => out.push_str(&format_float(*f)),
        Value::String(s) => {
            let _ = escape_string(out, s, QuoteStyle::AlwaysDouble);
        }
        Value::Bytes(b) => {
            let _ = escape_bytes(out, b);
        }
        Value::List(list) => {
            let id = value.identity().unwrap_or_default();
            if seen.contains(&id) {
                out.push_str("[...]");
                return;
            }
            seen.push(id);
            out.push('[');
            write_items(out, &list.snapshot(), seen);
            out.push(']');
            seen.pop();
        }
        Value::Tuple(items) => {
            out.push('(');
            write_items(out, items, seen);
            if items.len() == 1 {
                out.push(',');
            }
            out.push(')');
        }
        Value::Dict(dict) => {
            let id = value.identity().unwrap_or_default();
            if seen.contains(&id) {
                out.push_str("{...}");
                return;
            }
            seen.push(id);
            out.push('{');
            for (i, (k, v)) in dict.snapshot().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_repr(out, k, seen);
                out.push_str(": ");
                write_repr(out, v, seen);
            }
            out.push('}');
            seen.pop();
        }
        Value::Set(set) => {
            out.push_str("set([");
            write_items(out, &set.snapshot(), seen);
            out.push_str("])");
        }
        Value::Function(function) => {
            let _ = write!(out, "<function {}>", function.name());
        }
        Value::Native(native) => out.push_str(&native.repr()),
        Value::Range(range) => {
            let _ = if range.step != 1 {
                write!(out, "range({}, {}, {})", range.start, range.stop, range.step)
            } else if range.start != 0 {
                write!(out, "range({}, {})", range.start, range.stop)
            } else {
                write!(out, "range({})", range.stop)
            };
        }
    }
}

fn write_items(out: &mut String, items: &[Value], seen: &mut Vec<usize>) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_repr(out, item, seen);
    }
}
