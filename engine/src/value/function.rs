use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::syntax::Pos;
use crate::syntax::ast::FunctionDef;

use super::Value;

/// The module a function was defined in: its globals, and the predeclared
/// names that were visible when it ran.
///
/// Functions refer to their module weakly, so whoever runs a module owns
/// it. Dropping the module clears every call scope that one of its nested
/// functions captured, which breaks the scope → function → scope cycles a
/// nested `def` creates.
pub(crate) struct ModuleEnv {
    pub filename: Arc<str>,
    pub globals: RwLock<HashMap<String, Value>>,
    /// Every name the module's top level binds, assigned yet or not.
    pub bindings: BTreeSet<String>,
    pub predeclared: HashMap<String, Value>,
    captured: Mutex<Vec<Weak<Mutex<HashMap<String, Value>>>>>,
}

impl ModuleEnv {
    pub fn new(
        filename: &str,
        bindings: BTreeSet<String>,
        predeclared: HashMap<String, Value>,
    ) -> Self {
        Self {
            filename: filename.into(),
            globals: RwLock::new(HashMap::new()),
            bindings,
            predeclared,
            captured: Mutex::new(Vec::new()),
        }
    }

    /// Records a call scope that a function defined in this module closes
    /// over.
    pub fn capture(&self, scope: &Scope) {
        let mut captured = self.captured.lock();
        if captured.len() == captured.capacity() {
            captured.retain(|vars| vars.strong_count() > 0);
        }
        captured.push(Arc::downgrade(&scope.vars));
    }
}

impl Drop for ModuleEnv {
    fn drop(&mut self) {
        for vars in self.captured.get_mut().drain(..) {
            if let Some(vars) = vars.upgrade() {
                // Taken out first so values drop without the lock held.
                let values = std::mem::take(&mut *vars.lock());
                drop(values);
            }
        }
    }
}

/// The local variables of one active call, shared with the functions it
/// defines.
#[derive(Clone)]
pub(crate) struct Scope {
    pub def: Arc<FunctionDef>,
    pub vars: Arc<Mutex<HashMap<String, Value>>>,
}

/// A function defined by a `def` statement.
pub struct Function {
    pub(crate) def: Arc<FunctionDef>,
    /// Values of the optional parameters, in declaration order.
    pub(crate) defaults: Vec<Value>,
    pub(crate) module: Weak<ModuleEnv>,
    filename: Arc<str>,
    /// Scopes of the enclosing functions, innermost first.
    pub(crate) enclosing: Vec<Scope>,
    frozen: AtomicBool,
}

impl Function {
    pub(crate) fn new(
        def: Arc<FunctionDef>,
        defaults: Vec<Value>,
        module: &Arc<ModuleEnv>,
        enclosing: Vec<Scope>,
    ) -> Self {
        Self {
            def,
            defaults,
            module: Arc::downgrade(module),
            filename: module.filename.clone(),
            enclosing,
            frozen: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub(crate) fn filename_arc(&self) -> Arc<str> {
        self.filename.clone()
    }

    pub fn pos(&self) -> Pos {
        self.def.pos
    }

    pub(crate) fn freeze(&self) {
        if self.frozen.swap(true, Ordering::AcqRel) {
            return;
        }
        self.defaults.iter().for_each(Value::freeze);
        for scope in &self.enclosing {
            let vars: Vec<Value> = scope.vars.lock().values().cloned().collect();
            vars.iter().for_each(Value::freeze);
        }
    }
}
