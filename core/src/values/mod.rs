//! Host-side values and functions.

mod function;
mod value;

#[cfg(test)]
mod value_test;

pub use function::{Arguments, BoxError, HostFunction, Signature};
pub use value::{Dict, HostSequence, Opaque, Set, Value};
