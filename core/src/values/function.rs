//! Host functions callable from Starlark.

use core::fmt;
use std::sync::Arc;

use super::Value;

/// Error type host functions may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type HostFn = dyn Fn(Arguments) -> Result<Value, BoxError> + Send + Sync;

/// A Rust closure that Starlark code can call.
///
/// Cloning is cheap and shares the closure. Two `HostFunction`s compare equal
/// only if they share it.
#[derive(Clone)]
pub struct HostFunction {
    inner: Arc<HostFunctionInner>,
}

struct HostFunctionInner {
    name: String,
    signature: Option<Signature>,
    func: Box<HostFn>,
}

impl HostFunction {
    /// Wraps `func`, binding every call against `signature` first.
    ///
    /// ```ignore
    /// let greet = HostFunction::new(
    ///     "greet",
    ///     Signature::new().required("name").optional("greeting", "hello"),
    ///     |args| {
    ///         let name = args.get("name").and_then(Value::as_str).unwrap_or_default();
    ///         let greeting = args.get("greeting").and_then(Value::as_str).unwrap_or_default();
    ///         Ok(format!("{}, {}", greeting, name).into())
    ///     },
    /// );
    /// ```
    pub fn new<F>(name: impl Into<String>, signature: Signature, func: F) -> Self
    where
        F: Fn(Arguments) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self::build(name.into(), Some(signature), Box::new(func))
    }

    /// Wraps `func` without a signature: every positional argument lands in
    /// [`Arguments::positional`] and every keyword in [`Arguments::keywords`].
    pub fn variadic<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Arguments) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self::build(name.into(), None, Box::new(func))
    }

    fn build(name: String, signature: Option<Signature>, func: Box<HostFn>) -> Self {
        Self {
            inner: Arc::new(HostFunctionInner {
                name,
                signature,
                func,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.inner.signature.as_ref()
    }

    /// Binds the arguments and runs the closure.
    pub fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, BoxError> {
        let arguments = match &self.inner.signature {
            Some(signature) => signature.bind(&self.inner.name, args, kwargs)?,
            None => Arguments {
                bound: Vec::new(),
                args,
                kwargs,
            },
        };
        (self.inner.func)(arguments)
    }

    pub fn ptr_eq(&self, other: &HostFunction) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.inner.name)
    }
}

#[derive(Debug, Clone)]
struct Param {
    name: String,
    default: Option<Value>,
}

/// The parameters a [`HostFunction`] accepts, in Python's model.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    positional: Vec<Param>,
    keyword_only: Vec<Param>,
    var_args: bool,
    var_kwargs: bool,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.positional.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.positional.push(Param {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    pub fn keyword_only(mut self, name: impl Into<String>) -> Self {
        self.keyword_only.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    pub fn keyword_only_default(
        mut self,
        name: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        self.keyword_only.push(Param {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    /// Collects surplus positional arguments instead of rejecting them.
    pub fn var_args(mut self) -> Self {
        self.var_args = true;
        self
    }

    /// Collects unknown keyword arguments instead of rejecting them.
    pub fn var_kwargs(mut self) -> Self {
        self.var_kwargs = true;
        self
    }

    fn bind(
        &self,
        name: &str,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Arguments, BoxError> {
        let max = self.positional.len();
        if args.len() > max && !self.var_args {
            return Err(self.too_many_positional(name, args.len()).into());
        }

        let mut positional_slots: Vec<Option<Value>> = vec![None; max];
        let mut keyword_slots: Vec<Option<Value>> = vec![None; self.keyword_only.len()];
        let mut surplus = Vec::new();
        for (i, arg) in args.into_iter().enumerate() {
            match positional_slots.get_mut(i) {
                Some(slot) => *slot = Some(arg),
                None => surplus.push(arg),
            }
        }

        let mut extra_kwargs = Vec::new();
        for (key, value) in kwargs {
            if let Some(i) = self.positional.iter().position(|p| p.name == key) {
                if positional_slots[i].is_some() {
                    return Err(
                        format!("{}() got multiple values for argument '{}'", name, key).into(),
                    );
                }
                positional_slots[i] = Some(value);
            } else if let Some(i) = self.keyword_only.iter().position(|p| p.name == key) {
                keyword_slots[i] = Some(value);
            } else if self.var_kwargs {
                extra_kwargs.push((key, value));
            } else {
                return Err(format!(
                    "{}() got an unexpected keyword argument '{}'",
                    name, key
                )
                .into());
            }
        }

        let bound_positional = fill(name, "positional", &self.positional, positional_slots)?;
        let bound_keyword = fill(name, "keyword-only", &self.keyword_only, keyword_slots)?;
        Ok(Arguments {
            bound: bound_positional.into_iter().chain(bound_keyword).collect(),
            args: surplus,
            kwargs: extra_kwargs,
        })
    }

    fn too_many_positional(&self, name: &str, given: usize) -> String {
        let max = self.positional.len();
        let min = self.positional.iter().filter(|p| p.default.is_none()).count();
        let takes = if min == max {
            format!("{} positional argument{}", max, plural(max))
        } else {
            format!("from {} to {} positional arguments", min, max)
        };
        let verb = if given == 1 { "was" } else { "were" };
        format!("{}() takes {} but {} {} given", name, takes, given, verb)
    }
}

/// Applies defaults and reports every parameter left without a value.
fn fill(
    name: &str,
    kind: &str,
    params: &[Param],
    slots: Vec<Option<Value>>,
) -> Result<Vec<(String, Value)>, BoxError> {
    let mut missing = Vec::new();
    let mut bound = Vec::with_capacity(params.len());
    for (param, slot) in params.iter().zip(slots) {
        match slot.or_else(|| param.default.clone()) {
            Some(value) => bound.push((param.name.clone(), value)),
            None => missing.push(format!("'{}'", param.name)),
        }
    }
    if missing.is_empty() {
        return Ok(bound);
    }
    Err(format!(
        "{}() missing {} required {} argument{}: {}",
        name,
        missing.len(),
        kind,
        plural(missing.len()),
        join_names(&missing)
    )
    .into())
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`.
fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{} and {}", first, second),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
    }
}

/// Arguments of one call, after binding against a [`Signature`].
#[derive(Debug, Clone)]
pub struct Arguments {
    bound: Vec<(String, Value)>,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
}

impl Arguments {
    /// The value bound to a declared parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bound.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Positional arguments not bound to a declared parameter.
    pub fn positional(&self) -> &[Value] {
        &self.args
    }

    /// Keyword arguments not bound to a declared parameter.
    pub fn keywords(&self) -> &[(String, Value)] {
        &self.kwargs
    }
}
