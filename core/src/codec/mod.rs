//! Conversion between host [`Value`](crate::Value)s and engine values.
//!
//! Containers convert element by element, depth first. When an element
//! fails, every enclosing container prepends where the element sat, so the
//! innermost failure reads last:
//!
//! ```text
//! While converting value at index 1 in Rust list: While converting value of key "c" in Rust dict: Don't know how to convert Rust Handle to Starlark
//! ```

mod to_rust;
mod to_starlark;


use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

pub use to_rust::to_rust;
pub use to_starlark::to_starlark;

/// A value could not cross the boundary.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConversionError {
    pub message: String,
    /// The host error that interrupted the conversion, if any.
    #[source]
    pub cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(message: impl Into<String>, cause: Arc<dyn StdError + Send + Sync>) -> Self {
        Self {
            message: message.into(),
            cause: Some(cause),
        }
    }

    pub(crate) fn prefixed(mut self, prefix: impl AsRef<str>) -> Self {
        self.message.insert_str(0, prefix.as_ref());
        self
    }
}
