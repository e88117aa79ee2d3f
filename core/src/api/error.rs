//! Public error types.
//!
//! Engine failures are translated into [`Error`] at the session boundary.
//! Every variant keeps the diagnostic fields of its engine counterpart, and
//! exposes the common [`Error::message`] and [`Error::error_type`] pair.

use core::fmt;

use starbridge_engine as engine;
use thiserror::Error;

use crate::codec::ConversionError;

/// Any failure of a session operation.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The source did not parse.
    #[error("{0}")]
    Syntax(SyntaxError),

    /// The source referenced names that are not defined, or used
    /// constructs the dialect does not allow.
    #[error("{0}")]
    Resolve(ResolveError),

    /// The program failed while running.
    #[error("{0}")]
    Eval(EvalError),

    /// The program was cancelled because it ran past its timeout.
    #[error("{0}")]
    EvalTimeout(EvalError),

    #[error(transparent)]
    ConversionToStarlark(ConversionError),

    #[error(transparent)]
    ConversionToRust(ConversionError),

    /// A global looked up by name does not exist. Holds the name.
    #[error("'{0}' not found")]
    NotFound(String),

    /// An argument had the wrong shape, e.g. globals that are not a dict.
    #[error("{0}")]
    Type(String),
}

impl Error {
    pub fn message(&self) -> &str {
        match self {
            Error::Syntax(err) => &err.message,
            Error::Resolve(err) => &err.message,
            Error::Eval(err) | Error::EvalTimeout(err) => &err.message,
            Error::ConversionToStarlark(err) | Error::ConversionToRust(err) => &err.message,
            Error::NotFound(name) => name,
            Error::Type(msg) => msg,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Syntax(_) => SYNTAX_ERROR,
            Error::Resolve(_) => RESOLVE_ERROR,
            Error::Eval(_) => EVAL_ERROR,
            Error::EvalTimeout(_) => EVAL_TIMEOUT_ERROR,
            Error::ConversionToStarlark(_) => "ConversionToStarlarkFailed",
            Error::ConversionToRust(_) => "ConversionToRustFailed",
            Error::NotFound(_) => "NotFound",
            Error::Type(_) => "TypeError",
        }
    }

    /// The evaluation payload of both [`Error::Eval`] and
    /// [`Error::EvalTimeout`]: a timeout is an evaluation error.
    pub fn as_eval_error(&self) -> Option<&EvalError> {
        match self {
            Error::Eval(err) | Error::EvalTimeout(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::EvalTimeout(_))
    }

    /// Translates an engine failure. `timed_out` marks evaluation errors
    /// raised because the controller cancelled the request.
    pub(crate) fn from_engine(err: engine::Error, timed_out: bool) -> Self {
        match err {
            engine::Error::Syntax(err) => Error::Syntax(SyntaxError::from(err)),
            engine::Error::Resolve(err) => Error::Resolve(ResolveError::from(err)),
            engine::Error::Eval(err) if timed_out => {
                Error::EvalTimeout(EvalError::from_engine(err, EVAL_TIMEOUT_ERROR))
            }
            engine::Error::Eval(err) => Error::Eval(EvalError::from_engine(err, EVAL_ERROR)),
        }
    }
}

impl From<engine::Error> for Error {
    fn from(err: engine::Error) -> Self {
        Error::from_engine(err, false)
    }
}

const SYNTAX_ERROR: &str = "SyntaxError";
const RESOLVE_ERROR: &str = "ResolveError";
const EVAL_ERROR: &str = "EvalError";
const EVAL_TIMEOUT_ERROR: &str = "EvalTimeoutError";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// `filename:line:column: msg`.
    pub message: String,
    pub error_type: &'static str,
    pub msg: String,
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

impl From<engine::SyntaxError> for SyntaxError {
    fn from(err: engine::SyntaxError) -> Self {
        Self {
            message: err.to_string(),
            error_type: SYNTAX_ERROR,
            msg: err.msg,
            filename: err.filename,
            line: err.pos.line,
            column: err.pos.col,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveErrorItem {
    pub msg: String,
    pub line: u32,
    pub column: u32,
}

/// All resolution failures of one program, ordered by source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    pub message: String,
    pub error_type: &'static str,
    pub filename: String,
    pub errors: Vec<ResolveErrorItem>,
}

impl From<engine::ResolveErrorList> for ResolveError {
    fn from(list: engine::ResolveErrorList) -> Self {
        Self {
            message: list.to_string(),
            error_type: RESOLVE_ERROR,
            errors: list
                .errors
                .into_iter()
                .map(|err| ResolveErrorItem {
                    msg: err.msg,
                    line: err.pos.line,
                    column: err.pos.col,
                })
                .collect(),
            filename: list.filename,
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A runtime failure.
///
/// The location fields describe where the error was raised: `function_name`
/// is the innermost frame, and the position is the innermost one that has a
/// source location (host functions and builtins have none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    pub message: String,
    pub error_type: &'static str,
    pub backtrace: String,
    pub filename: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub function_name: Option<String>,
}

impl EvalError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: EVAL_ERROR,
            backtrace: String::new(),
            filename: None,
            line: None,
            column: None,
            function_name: None,
        }
    }

    fn from_engine(err: engine::EvalError, error_type: &'static str) -> Self {
        let backtrace = err.backtrace();
        let function_name = err.innermost().map(|frame| frame.name.clone());
        let location = err
            .call_stack
            .iter()
            .rev()
            .find_map(|frame| frame.location.clone());
        let (filename, pos) = location.unzip();
        Self {
            message: err.msg,
            error_type,
            backtrace,
            filename,
            line: pos.map(|pos| pos.line),
            column: pos.map(|pos| pos.col),
            function_name,
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
