//! A small interpreter for a Starlark dialect.
//!
//! The crate exposes the narrow surface an embedder needs:
//!
//! - [`exec_file`] runs a program and returns the globals it bound.
//! - [`eval`] evaluates a single expression.
//! - [`Thread`] carries the print hook, the dialect snapshot and the
//!   cancellation flag for one request.
//! - [`dialect`] holds the process-wide dialect options.
//!
//! ```ignore
//! use starbridge_engine::{Globals, Thread, dialect, eval};
//!
//! let mut thread = Thread::new(dialect::current());
//! let value = eval(&mut thread, "<expr>", "1 + 2", &Globals::new())?;
//! assert_eq!(value.repr(), "3");
//! ```

pub mod builtins;
pub mod dialect;
pub mod error;
pub mod eval;
mod resolve;
pub mod syntax;
pub mod thread;
pub mod value;

pub use dialect::Dialect;
pub use error::{CallFrame, Error, EvalError, ResolveError, ResolveErrorList};
pub use eval::{Globals, Module, eval, exec_file, exec_module};
pub use syntax::{Pos, SyntaxError};
pub use thread::{CancelHandle, PrintFn, Thread, cancellation_message};
pub use value::{HashedValue, NativeCallable, Value};
