//! The public embedding API: sessions, per-call options and errors.

mod controller;
mod error;
mod options;
mod session;

pub use error::{Error, EvalError, ResolveError, ResolveErrorItem, SyntaxError};
pub use options::{DEFAULT_FILENAME, EvalOptions, Evaluated, ExecOptions};
pub use session::{Session, SessionBuilder};
