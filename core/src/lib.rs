//! Embedding layer for Starlark.
//!
//! A [`Session`] is an isolated interpreter instance with its own globals.
//! Host values cross into Starlark through the [`codec`], Rust closures
//! become Starlark callables through [`HostFunction`], and every engine
//! failure surfaces as a typed [`Error`]. Requests can run under a timeout,
//! and the process-wide [`dialect`] decides which constructs programs may
//! use.
//!
//! ```
//! use starbridge_core::{HostFunction, Session, Signature, Value};
//!
//! let double = HostFunction::new("double", Signature::new().required("x"), |args| {
//!     let x = args.get("x").and_then(Value::as_i64).ok_or("x must be an int")?;
//!     Ok(Value::from(x * 2))
//! });
//!
//! let session = Session::builder().globals([("double", double)]).build()?;
//! assert_eq!(session.eval("double(21)")?, Value::from(42));
//! # Ok::<(), starbridge_core::Error>(())
//! ```

pub mod api;
mod bridge;
pub mod codec;
pub mod dialect;
pub mod values;

pub use api::{
    DEFAULT_FILENAME, Error, EvalError, EvalOptions, Evaluated, ExecOptions, ResolveError,
    ResolveErrorItem, Session, SessionBuilder, SyntaxError,
};
pub use codec::{ConversionError, to_rust, to_starlark};
pub use dialect::{Dialect, DialectUpdate, configure, dialect};
pub use values::{Arguments, BoxError, Dict, HostFunction, HostSequence, Opaque, Set, Signature, Value};

pub use starbridge_engine as engine;

/// Test utilities for enabling logging in tests
#[cfg(test)]
pub mod test_utils {
    /// Initialize tracing subscriber for tests with DEBUG level.
    /// Call this at the start of tests where you want to see logging output.
    pub fn init_test_logging() {
        use tracing_subscriber::{EnvFilter, fmt};

        // Try to initialize, ignore error if already initialized
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    }
}
