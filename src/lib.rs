//! Starbridge - embed Starlark in Rust applications
//!
//! # Overview
//!
//! Starbridge runs Starlark configuration scripts inside a host program.
//! A [`Session`] holds one isolated set of globals; host values go in,
//! results come back as [`Value`]s, and Rust closures can be called from
//! Starlark as ordinary functions. Typical uses:
//!
//! - Build and deployment configuration
//! - User-supplied rules evaluated by a service
//! - Computed settings with loops, functions and comprehensions
//!
//! # Quick Start
//!
//! ```
//! use starbridge::{Session, Value};
//!
//! let session = Session::new();
//! session.set([("replicas", 3)])?;
//! session.exec("ports = [8000 + i for i in range(replicas)]")?;
//!
//! assert_eq!(
//!     session.get("ports")?,
//!     Value::List(vec![8000.into(), 8001.into(), 8002.into()]),
//! );
//! # Ok::<(), starbridge::Error>(())
//! ```
//!
//! # Host functions
//!
//! ```
//! use starbridge::{HostFunction, Session, Signature, Value};
//!
//! let env = HostFunction::new("env", Signature::new().required("name"), |args| {
//!     let name = args.get("name").and_then(Value::as_str).ok_or("name must be a str")?;
//!     Ok(Value::from(format!("${}", name)))
//! });
//!
//! let session = Session::builder().globals([("env", env)]).build()?;
//! assert_eq!(session.eval("env('HOME')")?, Value::from("$HOME"));
//! # Ok::<(), starbridge::Error>(())
//! ```
//!
//! # Timeouts
//!
//! Pass a timeout in [`ExecOptions`] or [`EvalOptions`]; a program that runs
//! past it is cancelled and fails with [`Error::EvalTimeout`].
//!
//! # Dialect
//!
//! [`configure`] turns on language features that are off in the core
//! dialect (`set`, recursion and `while`, top-level rebinding) for the whole
//! process.

pub use starbridge_core::{
    Arguments, BoxError, ConversionError, DEFAULT_FILENAME, Dialect, DialectUpdate, Dict, Error,
    EvalError, EvalOptions, Evaluated, ExecOptions, HostFunction, HostSequence, Opaque,
    ResolveError, ResolveErrorItem, Session, SessionBuilder, Set, Signature, SyntaxError, Value,
    configure, to_rust, to_starlark,
};
pub use starbridge_core::{dialect, engine};

mod error_renderer;
pub use error_renderer::{
    render_error, render_error_to, render_error_to_string, render_error_to_string_no_color,
};
