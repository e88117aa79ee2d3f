//! The `%` string formatting operator.

use num_bigint::BigInt;
use num_traits::FromPrimitive;

use crate::value::{Value, format_float, int_to_f64};

/// Formats `format % args`. A tuple supplies positional operands, a dict
/// supplies `%(name)` operands, anything else is a single operand.
pub(crate) fn percent_format(format: &str, args: &Value) -> Result<String, String> {
    let positional: Vec<Value> = match args {
        Value::Tuple(items) => items.to_vec(),
        Value::Dict(_) => Vec::new(),
        other => vec![other.clone()],
    };
    let mut next = positional.into_iter();
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let operand = match chars.peek() {
            Some('%') => {
                chars.next();
                out.push('%');
                continue;
            }
            Some('(') => {
                chars.next();
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some(')') => break,
                        Some(c) => key.push(c),
                        None => return Err("incomplete format key".to_string()),
                    }
                }
                let Value::Dict(dict) = args else {
                    return Err("format requires a mapping".to_string());
                };
                dict.get(&Value::from(key.as_str()))?
                    .ok_or_else(|| format!("key \"{}\" not found", key))?
            }
            _ => next
                .next()
                .ok_or_else(|| "not enough arguments for format string".to_string())?,
        };
        let verb = chars
            .next()
            .ok_or_else(|| "incomplete format".to_string())?;
        format_operand(&mut out, verb, &operand)?;
    }

    if next.next().is_some() {
        return Err("too many arguments for format string".to_string());
    }
    Ok(out)
}

fn format_operand(out: &mut String, verb: char, operand: &Value) -> Result<(), String> {
    match verb {
        's' => out.push_str(&operand.to_str()),
        'r' => out.push_str(&operand.repr()),
        'd' | 'i' => match operand {
            Value::Int(i) => out.push_str(&i.to_string()),
            Value::Float(f) => match BigInt::from_f64(f.trunc()) {
                Some(i) => out.push_str(&i.to_string()),
                None => return Err(number_required(verb, operand)),
            },
            other => return Err(number_required(verb, other)),
        },
        'x' | 'X' | 'o' => {
            let Value::Int(i) = operand else {
                return Err(number_required(verb, operand));
            };
            out.push_str(&radix(i, verb));
        }
        'e' | 'f' | 'g' => {
            let f = match operand {
                Value::Float(f) => *f,
                Value::Int(i) => int_to_f64(i)?,
                other => return Err(number_required(verb, other)),
            };
            match verb {
                'e' => out.push_str(&format!("{:e}", f)),
                'f' => out.push_str(&format!("{:.6}", f)),
                _ => out.push_str(&format_float(f)),
            }
        }
        other => return Err(format!("unsupported format character '{}'", other)),
    }
    Ok(())
}

fn number_required(verb: char, operand: &Value) -> String {
    format!(
        "%{} format requires number, not {}",
        verb,
        operand.type_name()
    )
}

fn radix(i: &BigInt, verb: char) -> String {
    let (sign, magnitude) = match i.sign() {
        num_bigint::Sign::Minus => ("-", -i),
        _ => ("", i.clone()),
    };
    let digits = match verb {
        'o' => magnitude.to_str_radix(8),
        'X' => magnitude.to_str_radix(16).to_uppercase(),
        _ => magnitude.to_str_radix(16),
    };
    format!("{}{}", sign, digits)
}
