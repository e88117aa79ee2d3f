//! Tree-walking evaluation.

mod call;
mod format;
mod interp;
mod ops;

#[cfg(test)]
mod eval_test;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::resolve::{resolve_expr, resolve_module};
use crate::syntax::ast::collect_bindings;
use crate::syntax::{Pos, parse_expr, parse_file};
use crate::thread::{Frame, Thread};
use crate::value::{ModuleEnv, Value};

pub(crate) use call::call;

/// A name → value environment.
pub type Globals = HashMap<String, Value>;

const TOPLEVEL: &str = "<toplevel>";

/// A program that ran to completion.
///
/// Functions the program defined refer to their module weakly: they stay
/// callable for as long as the `Module` is kept. Dropping it releases the
/// module's globals and its copy of the predeclared names.
pub struct Module {
    env: Arc<ModuleEnv>,
}

impl Module {
    /// The values the program bound at top level.
    pub fn globals(&self) -> Globals {
        self.env.globals.read().clone()
    }

    /// Whether a function defined by this module is still alive somewhere.
    pub fn is_referenced(&self) -> bool {
        Arc::weak_count(&self.env) > 0
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("filename", &self.env.filename)
            .finish_non_exhaustive()
    }
}

/// Parses, resolves and runs a program.
///
/// `predeclared` names are visible to the program but never modified by
/// it. On success, returns the module the program bound.
pub fn exec_module(
    thread: &mut Thread,
    filename: &str,
    src: &str,
    predeclared: &Globals,
) -> Result<Module, Error> {
    let module = parse_file(filename, src)?;
    resolve_module(filename, &module, thread.dialect, &|name| {
        predeclared.contains_key(name)
    })?;

    let mut bindings = BTreeSet::new();
    collect_bindings(&module.stmts, &mut bindings);
    let env = Arc::new(ModuleEnv::new(filename, bindings, predeclared.clone()));

    tracing::trace!(filename, statements = module.stmts.len(), "Executing module");
    enter_toplevel(thread, &env);
    let result = interp::exec_toplevel(thread, &env, &module.stmts);
    thread.pop_frame();
    result?;

    Ok(Module { env })
}

/// Like [`exec_module`], returning only the top-level bindings. Functions
/// among them can no longer be called once this returns.
pub fn exec_file(
    thread: &mut Thread,
    filename: &str,
    src: &str,
    predeclared: &Globals,
) -> Result<Globals, Error> {
    exec_module(thread, filename, src, predeclared).map(|module| module.globals())
}

/// Parses, resolves and evaluates a single expression.
pub fn eval(
    thread: &mut Thread,
    filename: &str,
    src: &str,
    predeclared: &Globals,
) -> Result<Value, Error> {
    let expr = parse_expr(filename, src)?;
    resolve_expr(filename, &expr, thread.dialect, &|name| {
        predeclared.contains_key(name)
    })?;

    let env = Arc::new(ModuleEnv::new(
        filename,
        BTreeSet::new(),
        predeclared.clone(),
    ));
    enter_toplevel(thread, &env);
    let result = interp::eval_toplevel(thread, &env, &expr);
    thread.pop_frame();
    Ok(result?)
}

fn enter_toplevel(thread: &mut Thread, env: &ModuleEnv) {
    thread.frames.push(Frame {
        name: TOPLEVEL.to_string(),
        filename: Some(env.filename.clone()),
        pos: Pos::new(1, 1),
        function: None,
    });
}
