//! Exposes [`HostFunction`]s to Starlark.
//!
//! A bridged function is called synchronously on whatever thread runs the
//! evaluation, so host closures must be `Send + Sync` and may re-enter host
//! code freely. The engine value owns an `Arc` of the closure: it stays
//! alive for as long as any global or container refers to it.

use std::any::Any;

use starbridge_engine::{NativeCallable, Thread, Value as StarlarkValue};
use tracing::trace;

use crate::codec::{to_rust, to_starlark};
use crate::values::HostFunction;

pub(crate) struct BridgedFunction {
    function: HostFunction,
}

impl BridgedFunction {
    pub(crate) fn new(function: HostFunction) -> Self {
        Self { function }
    }

    pub(crate) fn function(&self) -> &HostFunction {
        &self.function
    }

    fn invoke(
        &self,
        args: Vec<StarlarkValue>,
        kwargs: Vec<(String, StarlarkValue)>,
    ) -> Result<StarlarkValue, String> {
        let args = args
            .iter()
            .map(to_rust)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| err.to_string())?;
        let kwargs = kwargs
            .iter()
            .map(|(name, value)| Ok((name.clone(), to_rust(value)?)))
            .collect::<Result<Vec<_>, crate::codec::ConversionError>>()
            .map_err(|err| err.to_string())?;

        let result = self
            .function
            .call(args, kwargs)
            .map_err(|err| err.to_string())?;
        to_starlark(&result).map_err(|err| err.to_string())
    }
}

impl NativeCallable for BridgedFunction {
    fn name(&self) -> &str {
        self.function.name()
    }

    fn call(
        &self,
        _thread: &mut Thread,
        args: Vec<StarlarkValue>,
        kwargs: Vec<(String, StarlarkValue)>,
    ) -> Result<StarlarkValue, String> {
        trace!(function = self.function.name(), "Calling host function");
        self.invoke(args, kwargs)
            .map_err(|msg| format!("Error in {}:0:0: {}", self.function.name(), msg))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn repr(&self) -> String {
        format!("<function {}>", self.function.name())
    }
}
