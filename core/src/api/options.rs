//! Per-call options for session operations.

use core::fmt;
use std::time::Duration;

use starbridge_engine::PrintFn;

use crate::values::Value;

/// Filename used in diagnostics when a call does not name one.
pub const DEFAULT_FILENAME: &str = "<expr>";

/// Options for [`Session::exec_with`](crate::Session::exec_with).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use starbridge_core::ExecOptions;
///
/// let options = ExecOptions {
///     filename: Some("config.star".to_string()),
///     timeout: Some(Duration::from_secs(2)),
///     ..ExecOptions::default()
/// };
/// ```
#[derive(Clone)]
pub struct ExecOptions {
    /// Name reported in diagnostics.
    ///
    /// Default: `<expr>`
    pub filename: Option<String>,

    /// Wall-clock limit after which the program is cancelled. A zero
    /// duration means no limit.
    ///
    /// Default: None (no limit)
    pub timeout: Option<Duration>,

    /// Print sink for this call only. Falls back to the session's sink.
    pub print: Option<PrintFn>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            filename: None,
            timeout: None,
            print: None,
        }
    }
}

impl fmt::Debug for ExecOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecOptions")
            .field("filename", &self.filename)
            .field("timeout", &self.timeout)
            .field("print", &self.print.is_some())
            .finish()
    }
}

/// Options for [`Session::eval_with`](crate::Session::eval_with).
#[derive(Clone)]
pub struct EvalOptions {
    pub filename: Option<String>,
    /// As [`ExecOptions::timeout`].
    pub timeout: Option<Duration>,
    pub print: Option<PrintFn>,

    /// Convert the result to a host [`Value`]. When false, the Starlark
    /// repr of the result is returned instead.
    ///
    /// Default: true
    pub convert: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            filename: None,
            timeout: None,
            print: None,
            convert: true,
        }
    }
}

impl fmt::Debug for EvalOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalOptions")
            .field("filename", &self.filename)
            .field("timeout", &self.timeout)
            .field("print", &self.print.is_some())
            .field("convert", &self.convert)
            .finish()
    }
}

/// The result of [`Session::eval_with`](crate::Session::eval_with).
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    Value(Value),
    Repr(String),
}

impl Evaluated {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Evaluated::Value(value) => Some(value),
            Evaluated::Repr(_) => None,
        }
    }

    pub fn as_repr(&self) -> Option<&str> {
        match self {
            Evaluated::Repr(repr) => Some(repr),
            Evaluated::Value(_) => None,
        }
    }
}
