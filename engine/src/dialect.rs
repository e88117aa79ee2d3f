//! Process-wide dialect options.
//!
//! The options decide which constructs the resolver and evaluator accept.
//! They live in one synchronized record shared by every thread; a request
//! takes a [`Dialect`] snapshot when it starts and keeps it until it ends.

use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Language constructs that are off by default in the core Starlark dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dialect {
    /// The `set` builtin is visible to programs.
    pub allow_set: bool,

    /// Top-level names may be rebound, and `if`/`for`/`while` may appear
    /// outside of a function.
    pub allow_global_reassign: bool,

    /// Functions may call themselves (directly or not), and `while` loops
    /// are accepted.
    pub allow_recursion: bool,
}

static DIALECT: Lazy<RwLock<Dialect>> = Lazy::new(|| RwLock::new(Dialect::default()));

/// Returns a snapshot of the current options.
pub fn current() -> Dialect {
    *DIALECT.read()
}

/// Applies `f` to the shared options under the write lock and returns the
/// resulting snapshot.
pub fn update(f: impl FnOnce(&mut Dialect)) -> Dialect {
    let mut dialect = DIALECT.write();
    f(&mut dialect);
    *dialect
}
