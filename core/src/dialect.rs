//! Process-wide dialect configuration.
//!
//! Options are stored once for the whole process and shared by every
//! session. Each option keeps the last value explicitly given to it:
//! [`configure`] only touches the fields set in its [`DialectUpdate`].
//! A request snapshots the options when it starts, so a change applies to
//! executions that start after it.

use starbridge_engine::dialect as engine_dialect;
use tracing::info;

pub use starbridge_engine::Dialect;

/// A partial update of the [`Dialect`]. `None` leaves an option unchanged.
///
/// ```
/// use starbridge_core::{DialectUpdate, configure};
///
/// let dialect = configure(DialectUpdate::new().allow_set(true));
/// assert!(dialect.allow_set);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DialectUpdate {
    pub allow_set: Option<bool>,
    pub allow_global_reassign: Option<bool>,
    pub allow_recursion: Option<bool>,
}

impl DialectUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_set(mut self, allow: bool) -> Self {
        self.allow_set = Some(allow);
        self
    }

    pub fn allow_global_reassign(mut self, allow: bool) -> Self {
        self.allow_global_reassign = Some(allow);
        self
    }

    pub fn allow_recursion(mut self, allow: bool) -> Self {
        self.allow_recursion = Some(allow);
        self
    }
}

/// Merges `update` into the shared options and returns the result.
pub fn configure(update: DialectUpdate) -> Dialect {
    let dialect = engine_dialect::update(|dialect| {
        if let Some(allow) = update.allow_set {
            dialect.allow_set = allow;
        }
        if let Some(allow) = update.allow_global_reassign {
            dialect.allow_global_reassign = allow;
        }
        if let Some(allow) = update.allow_recursion {
            dialect.allow_recursion = allow;
        }
    });
    info!(?update, ?dialect, "Starlark dialect configured");
    dialect
}

/// A snapshot of the current options.
pub fn dialect() -> Dialect {
    engine_dialect::current()
}
