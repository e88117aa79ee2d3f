use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EvalError;
use crate::syntax::ast::Param;
use crate::thread::{Frame, Thread};
use crate::value::{Dict, Function, Value};

use super::interp::{Env, Flow, exec_block, new_scope};

/// Calls `callee` with already evaluated arguments.
pub(crate) fn call(
    thread: &mut Thread,
    callee: &Value,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<Value, EvalError> {
    match callee {
        Value::Function(function) => call_function(thread, function, args, kwargs),
        Value::Native(native) => {
            thread
                .push_frame(Frame {
                    name: native.name().to_string(),
                    filename: None,
                    pos: Default::default(),
                    function: None,
                })
                .map_err(|msg| thread.error(msg))?;
            let result = native.call(thread, args, kwargs).map_err(|msg| thread.error(msg));
            thread.pop_frame();
            result
        }
        other => Err(thread.error(format!(
            "invalid call of non-function ({})",
            other.type_name()
        ))),
    }
}

fn call_function(
    thread: &mut Thread,
    function: &Arc<Function>,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<Value, EvalError> {
    let id = Arc::as_ptr(function) as usize;
    if !thread.dialect.allow_recursion && thread.is_active(id) {
        return Err(thread.error(format!(
            "function {} called recursively",
            function.name()
        )));
    }

    let Some(module) = function.module.upgrade() else {
        return Err(thread.error(format!(
            "function {} outlived the module that defined it",
            function.name()
        )));
    };
    let vars = bind_args(function, args, kwargs).map_err(|msg| thread.error(msg))?;
    thread
        .push_frame(Frame {
            name: function.name().to_string(),
            filename: Some(function.filename_arc()),
            pos: function.pos(),
            function: Some(id),
        })
        .map_err(|msg| thread.error(msg))?;

    let scope = new_scope(&function.def, vars);
    let mut env = Env::function(&module, scope, &function.enclosing);
    let result = exec_block(thread, &mut env, &function.def.body);
    thread.pop_frame();

    match result? {
        Flow::Return(value) => Ok(value),
        Flow::Normal | Flow::Break | Flow::Continue => Ok(Value::None),
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Matches call arguments to the parameters of `function`.
fn bind_args(
    function: &Function,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<HashMap<String, Value>, String> {
    let name = function.name();
    let mut defaults = function.defaults.iter();

    // Named parameters in order, with their default. Those before `*args`
    // may also be filled positionally.
    let mut named: Vec<(&str, Option<&Value>)> = Vec::new();
    let mut positional_count = None;
    let mut star = None;
    let mut star_star = None;
    for param in &function.def.params {
        match param {
            Param::Required(p) => named.push((p, None)),
            Param::Optional(p, _) => named.push((p, defaults.next())),
            Param::Args(p) => {
                star = Some(p.as_str());
                positional_count = Some(named.len());
            }
            Param::Kwargs(p) => star_star = Some(p.as_str()),
        }
    }
    let positional_count = positional_count.unwrap_or(named.len());

    let mut vars: HashMap<String, Value> = HashMap::new();
    let mut extra_args = Vec::new();
    let given = args.len();
    for (i, arg) in args.into_iter().enumerate() {
        if i < positional_count {
            vars.insert(named[i].0.to_string(), arg);
        } else if star.is_some() {
            extra_args.push(arg);
        } else {
            return Err(format!(
                "function {} accepts at most {} positional argument{} ({} given)",
                name,
                positional_count,
                plural(positional_count),
                given
            ));
        }
    }

    let extra_kwargs = Dict::default();
    for (key, value) in kwargs {
        if named.iter().any(|(p, _)| *p == key) {
            if vars.contains_key(&key) {
                return Err(format!(
                    "function {} got multiple values for parameter {}",
                    name, key
                ));
            }
            vars.insert(key, value);
        } else if star_star.is_some() {
            if extra_kwargs.contains(&Value::from(key.as_str()))? {
                return Err(format!(
                    "function {} got multiple values for keyword argument {}",
                    name, key
                ));
            }
            extra_kwargs.insert(Value::from(key), value)?;
        } else {
            return Err(format!(
                "function {} got an unexpected keyword argument {}",
                name, key
            ));
        }
    }

    let mut missing = Vec::new();
    for (param, default) in &named {
        if vars.contains_key(*param) {
            continue;
        }
        match default {
            Some(value) => {
                vars.insert(param.to_string(), (*value).clone());
            }
            None => missing.push(*param),
        }
    }
    if !missing.is_empty() {
        return Err(format!(
            "function {} missing {} argument{} ({})",
            name,
            missing.len(),
            plural(missing.len()),
            missing.join(", ")
        ));
    }

    if let Some(p) = star {
        vars.insert(p.to_string(), Value::new_tuple(extra_args));
    }
    if let Some(p) = star_star {
        vars.insert(p.to_string(), Value::Dict(Arc::new(extra_kwargs)));
    }
    Ok(vars)
}
