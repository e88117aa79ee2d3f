//! An isolated interpreter instance and its globals.

use std::sync::Arc;

use parking_lot::Mutex;
use starbridge_engine::{self as engine, Globals, Module, PrintFn, Value as StarlarkValue};
use tracing::debug;

use super::controller;
use super::error::Error;
use super::options::{DEFAULT_FILENAME, EvalOptions, Evaluated, ExecOptions};
use crate::codec::{to_rust, to_starlark};
use crate::values::Value;

/// One Starlark environment.
///
/// A session owns a global mapping that every `exec` and `eval` sees as
/// predeclared names. Values stored in it are frozen. Operations on one
/// session are serialized: an `exec` holds the session for its whole run.
/// Host functions called from Starlark therefore must not call back into
/// the session that is running them.
///
/// ```
/// use starbridge_core::{Session, Value};
///
/// let session = Session::new();
/// session.set([("x", 20)])?;
/// session.exec("y = x + 1")?;
/// assert_eq!(session.eval("x + y")?, Value::from(41));
/// # Ok::<(), starbridge_core::Error>(())
/// ```
pub struct Session {
    state: Mutex<SessionState>,
}

struct SessionState {
    globals: Globals,
    /// Programs whose functions are still reachable. A function can only
    /// run while its module is kept.
    modules: Vec<Module>,
    print: PrintFn,
}

fn stdout_print() -> PrintFn {
    Arc::new(|line: &str| println!("{}", line))
}

impl Session {
    pub fn new() -> Self {
        debug!("Session created");
        Self {
            state: Mutex::new(SessionState {
                globals: Globals::new(),
                modules: Vec::new(),
                print: stdout_print(),
            }),
        }
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Runs a program. Its top-level bindings are added to the globals
    /// only if the whole program succeeds.
    pub fn exec(&self, src: &str) -> Result<(), Error> {
        self.exec_with(src, ExecOptions::default())
    }

    pub fn exec_with(&self, src: &str, options: ExecOptions) -> Result<(), Error> {
        let mut state = self.state.lock();
        let filename = options.filename.as_deref().unwrap_or(DEFAULT_FILENAME);
        let print = options.print.unwrap_or_else(|| state.print.clone());
        let predeclared = &state.globals;
        debug!(filename, timeout = ?options.timeout, "Executing program");

        let module = controller::run(options.timeout, print, |thread| {
            engine::exec_module(thread, filename, src, predeclared)
        })?;

        let bound = module.globals();
        debug!(filename, bindings = bound.len(), "Program finished");
        for (name, value) in bound {
            value.freeze();
            state.globals.insert(name, value);
        }
        state.modules.push(module);
        state.modules.retain(Module::is_referenced);
        Ok(())
    }

    /// Evaluates an expression and converts its value.
    pub fn eval(&self, expr: &str) -> Result<Value, Error> {
        let value = self.eval_starlark(expr, &EvalOptions::default())?;
        to_rust(&value).map_err(Error::ConversionToRust)
    }

    /// Evaluates an expression. With `convert: false` the result is the
    /// Starlark repr of the value, which works for values with no host
    /// counterpart.
    pub fn eval_with(&self, expr: &str, options: EvalOptions) -> Result<Evaluated, Error> {
        let value = self.eval_starlark(expr, &options)?;
        if options.convert {
            let value = to_rust(&value).map_err(Error::ConversionToRust)?;
            Ok(Evaluated::Value(value))
        } else {
            Ok(Evaluated::Repr(value.repr()))
        }
    }

    fn eval_starlark(&self, expr: &str, options: &EvalOptions) -> Result<StarlarkValue, Error> {
        let state = self.state.lock();
        let filename = options.filename.as_deref().unwrap_or(DEFAULT_FILENAME);
        let print = options.print.clone().unwrap_or_else(|| state.print.clone());
        let predeclared = &state.globals;
        debug!(filename, timeout = ?options.timeout, "Evaluating expression");

        controller::run(options.timeout, print, |thread| {
            engine::eval(thread, filename, expr, predeclared)
        })
    }

    /// Inserts or replaces globals. Nothing is inserted unless every value
    /// converts.
    pub fn set<I, K, V>(&self, globals: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let converted = globals
            .into_iter()
            .map(|(name, value)| {
                let value = to_starlark(&value.into()).map_err(Error::ConversionToStarlark)?;
                value.freeze();
                Ok((name.into(), value))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        self.state.lock().globals.extend(converted);
        Ok(())
    }

    /// Inserts or replaces globals from a host dict with string keys.
    pub fn set_value(&self, globals: Value) -> Result<(), Error> {
        let Value::Dict(dict) = globals else {
            return Err(Error::Type(format!(
                "Can't initialize globals from {}",
                globals.type_name()
            )));
        };
        let mut entries = Vec::with_capacity(dict.len());
        for (key, value) in dict.iter() {
            let Some(name) = key.as_str() else {
                return Err(Error::Type(format!(
                    "Can't initialize globals from dict with {} key",
                    key.type_name()
                )));
            };
            entries.push((name.to_string(), value.clone()));
        }
        self.set(entries)
    }

    /// Looks up a global and converts it to a host value.
    pub fn get(&self, name: &str) -> Result<Value, Error> {
        let state = self.state.lock();
        let value = state
            .globals
            .get(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        to_rust(value).map_err(Error::ConversionToRust)
    }

    pub fn get_or(&self, name: &str, default: impl Into<Value>) -> Result<Value, Error> {
        match self.get(name) {
            Err(Error::NotFound(_)) => Ok(default.into()),
            other => other,
        }
    }

    /// Removes a global and returns its value. A global whose value does
    /// not convert is left in place.
    pub fn pop(&self, name: &str) -> Result<Value, Error> {
        let mut state = self.state.lock();
        let value = state
            .globals
            .get(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        let value = to_rust(value).map_err(Error::ConversionToRust)?;
        state.globals.remove(name);
        Ok(value)
    }

    pub fn pop_or(&self, name: &str, default: impl Into<Value>) -> Result<Value, Error> {
        match self.pop(name) {
            Err(Error::NotFound(_)) => Ok(default.into()),
            other => other,
        }
    }

    /// Names of the globals, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.state.lock().globals.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.lock().globals.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.state.lock().globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the print sink for subsequent calls.
    pub fn set_print(&self, print: impl Fn(&str) + Send + Sync + 'static) {
        self.state.lock().print = Arc::new(print);
    }

    /// Releases the session and everything the engine holds for it:
    /// globals, the modules of programs it ran, and the host functions they
    /// reference. Equivalent to dropping it.
    pub fn close(self) {}
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        debug!(
            globals = state.globals.len(),
            modules = state.modules.len(),
            "Session closed"
        );
    }
}

/// Builds a [`Session`] with initial globals and a print sink.
#[derive(Default)]
pub struct SessionBuilder {
    globals: Vec<(String, Value)>,
    globals_value: Option<Value>,
    print: Option<PrintFn>,
}

impl SessionBuilder {
    pub fn globals<I, K, V>(mut self, globals: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.globals
            .extend(globals.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Initial globals as a host dict, checked when the session is built.
    pub fn globals_value(mut self, globals: Value) -> Self {
        self.globals_value = Some(globals);
        self
    }

    pub fn print(mut self, print: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.print = Some(Arc::new(print));
        self
    }

    pub fn build(self) -> Result<Session, Error> {
        let session = Session::new();
        if let Some(print) = self.print {
            session.state.lock().print = print;
        }
        if let Some(globals) = self.globals_value {
            session.set_value(globals)?;
        }
        session.set(self.globals)?;
        Ok(session)
    }
}
