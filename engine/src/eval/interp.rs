use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::builtins;
use crate::error::EvalError;
use crate::syntax::Pos;
use crate::syntax::ast::*;
use crate::thread::Thread;
use crate::value::{Dict, Function, ModuleEnv, Scope, Value};

use super::call::call;
use super::ops;

pub(super) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Name lookup context for the code being run.
pub(super) struct Env<'a> {
    module: &'a Arc<ModuleEnv>,
    /// Locals of the running function; `None` at top level.
    local: Option<Scope>,
    enclosing: &'a [Scope],
    /// Comprehension variables, innermost last.
    comprehensions: Vec<HashMap<String, Value>>,
}

impl<'a> Env<'a> {
    pub(super) fn function(module: &'a Arc<ModuleEnv>, local: Scope, enclosing: &'a [Scope]) -> Self {
        Self {
            module,
            local: Some(local),
            enclosing,
            comprehensions: Vec::new(),
        }
    }

    fn toplevel(module: &'a Arc<ModuleEnv>) -> Self {
        Self {
            module,
            local: None,
            enclosing: &[],
            comprehensions: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, String> {
        for scope in self.comprehensions.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Ok(value.clone());
            }
        }
        for scope in self.local.iter().chain(self.enclosing) {
            if scope.def.locals.contains(name) {
                return scope.vars.lock().get(name).cloned().ok_or_else(|| {
                    format!("local variable {} referenced before assignment", name)
                });
            }
        }
        if let Some(value) = self.module.globals.read().get(name) {
            return Ok(value.clone());
        }
        if self.module.bindings.contains(name) {
            return Err(format!(
                "global variable {} referenced before assignment",
                name
            ));
        }
        if let Some(value) = self.module.predeclared.get(name) {
            return Ok(value.clone());
        }
        builtins::universe()
            .get(name)
            .cloned()
            .ok_or_else(|| format!("undefined: {}", name))
    }

    fn bind(&mut self, name: &str, value: Value) {
        match &self.local {
            Some(scope) => {
                scope.vars.lock().insert(name.to_string(), value);
            }
            None => {
                self.module.globals.write().insert(name.to_string(), value);
            }
        }
    }

    /// The scopes a function defined here closes over, innermost first.
    fn closure(&self) -> Vec<Scope> {
        self.local
            .iter()
            .chain(self.enclosing)
            .cloned()
            .collect()
    }
}

fn fail(thread: &mut Thread, pos: Pos, msg: impl Into<String>) -> EvalError {
    thread.set_pos(pos);
    thread.error(msg)
}

fn check_cancelled(thread: &mut Thread, pos: Pos) -> Result<(), EvalError> {
    thread.check_cancelled().map_err(|msg| fail(thread, pos, msg))
}

pub(super) fn exec_toplevel(
    thread: &mut Thread,
    module: &Arc<ModuleEnv>,
    stmts: &[Stmt],
) -> Result<(), EvalError> {
    let mut env = Env::toplevel(module);
    exec_block(thread, &mut env, stmts).map(|_| ())
}

pub(super) fn eval_toplevel(
    thread: &mut Thread,
    module: &Arc<ModuleEnv>,
    expr: &Expr,
) -> Result<Value, EvalError> {
    let mut env = Env::toplevel(module);
    eval_expr(thread, &mut env, expr)
}

pub(super) fn exec_block(
    thread: &mut Thread,
    env: &mut Env<'_>,
    stmts: &[Stmt],
) -> Result<Flow, EvalError> {
    for stmt in stmts {
        match exec_stmt(thread, env, stmt)? {
            Flow::Normal => {}
            flow => return Ok(flow),
        }
    }
    Ok(Flow::Normal)
}

fn exec_stmt(thread: &mut Thread, env: &mut Env<'_>, stmt: &Stmt) -> Result<Flow, EvalError> {
    check_cancelled(thread, stmt.pos)?;
    thread.set_pos(stmt.pos);

    match &stmt.kind {
        StmtKind::Expr(expr) => {
            eval_expr(thread, env, expr)?;
        }
        StmtKind::Assign { target, value } => {
            let value = eval_expr(thread, env, value)?;
            assign(thread, env, target, value, false)?;
        }
        StmtKind::AugAssign { target, op, value } => {
            aug_assign(thread, env, stmt.pos, target, *op, value)?;
        }
        StmtKind::Def(def) => {
            let mut defaults = Vec::new();
            for param in &def.params {
                if let Param::Optional(_, default) = param {
                    defaults.push(eval_expr(thread, env, default)?);
                }
            }
            if let Some(local) = &env.local {
                env.module.capture(local);
            }
            let function = Function::new(def.clone(), defaults, env.module, env.closure());
            env.bind(&def.name, Value::Function(Arc::new(function)));
        }
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            let branch = if eval_expr(thread, env, cond)?.truth() {
                then
            } else {
                otherwise
            };
            return exec_block(thread, env, branch);
        }
        StmtKind::For { target, iter, body } => {
            let iterable = eval_expr(thread, env, iter)?;
            let items = iterable
                .elements()
                .map_err(|msg| fail(thread, iter.pos, format!("for loop: {}", msg)))?;
            for item in items {
                check_cancelled(thread, stmt.pos)?;
                assign(thread, env, target, item, false)?;
                match exec_block(thread, env, body)? {
                    Flow::Break => break,
                    Flow::Normal | Flow::Continue => {}
                    flow @ Flow::Return(_) => return Ok(flow),
                }
            }
        }
        StmtKind::While { cond, body } => loop {
            check_cancelled(thread, stmt.pos)?;
            if !eval_expr(thread, env, cond)?.truth() {
                break;
            }
            match exec_block(thread, env, body)? {
                Flow::Break => break,
                Flow::Normal | Flow::Continue => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        },
        StmtKind::Return(value) => {
            let value = match value {
                Some(expr) => eval_expr(thread, env, expr)?,
                None => Value::None,
            };
            return Ok(Flow::Return(value));
        }
        StmtKind::Break => return Ok(Flow::Break),
        StmtKind::Continue => return Ok(Flow::Continue),
        StmtKind::Pass => {}
    }
    Ok(Flow::Normal)
}

fn aug_assign(
    thread: &mut Thread,
    env: &mut Env<'_>,
    pos: Pos,
    target: &Expr,
    op: BinaryOp,
    value: &Expr,
) -> Result<(), EvalError> {
    match &target.kind {
        ExprKind::Ident(name) => {
            let old = env.lookup(name).map_err(|msg| fail(thread, target.pos, msg))?;
            let rhs = eval_expr(thread, env, value)?;
            let new = ops::augmented(op, old, rhs).map_err(|msg| fail(thread, pos, msg))?;
            env.bind(name, new);
        }
        ExprKind::Index { target: object, index } => {
            let object = eval_expr(thread, env, object)?;
            let index = eval_expr(thread, env, index)?;
            let old = ops::index(&object, &index).map_err(|msg| fail(thread, target.pos, msg))?;
            let rhs = eval_expr(thread, env, value)?;
            let new = ops::augmented(op, old, rhs).map_err(|msg| fail(thread, pos, msg))?;
            ops::set_index(&object, index, new).map_err(|msg| fail(thread, target.pos, msg))?;
        }
        ExprKind::Dot { target: object, name } => {
            let object = eval_expr(thread, env, object)?;
            return Err(fail(
                thread,
                target.pos,
                format!("cannot set .{} field of {} value", name, object.type_name()),
            ));
        }
        _ => return Err(fail(thread, target.pos, "invalid augmented assignment target")),
    }
    Ok(())
}

/// Binds `value` to an assignment target. With `comprehension`, plain
/// names go to the innermost comprehension scope.
fn assign(
    thread: &mut Thread,
    env: &mut Env<'_>,
    target: &Expr,
    value: Value,
    comprehension: bool,
) -> Result<(), EvalError> {
    match &target.kind {
        ExprKind::Ident(name) => {
            match env.comprehensions.last_mut() {
                Some(scope) if comprehension => {
                    scope.insert(name.clone(), value);
                }
                _ => env.bind(name, value),
            }
            Ok(())
        }
        ExprKind::List(targets) | ExprKind::Tuple(targets) => {
            let items = value.iterate().map_err(|_| {
                fail(
                    thread,
                    target.pos,
                    format!("got {} in sequence assignment", value.type_name()),
                )
            })?;
            if items.len() != targets.len() {
                let which = if items.len() > targets.len() {
                    "many"
                } else {
                    "few"
                };
                return Err(fail(
                    thread,
                    target.pos,
                    format!(
                        "too {} values to unpack (got {}, want {})",
                        which,
                        items.len(),
                        targets.len()
                    ),
                ));
            }
            for (target, item) in targets.iter().zip(items) {
                assign(thread, env, target, item, comprehension)?;
            }
            Ok(())
        }
        ExprKind::Index { target: object, index } => {
            let object = eval_expr(thread, env, object)?;
            let index = eval_expr(thread, env, index)?;
            ops::set_index(&object, index, value).map_err(|msg| fail(thread, target.pos, msg))
        }
        ExprKind::Dot { target: object, name } => {
            let object = eval_expr(thread, env, object)?;
            Err(fail(
                thread,
                target.pos,
                format!("cannot set .{} field of {} value", name, object.type_name()),
            ))
        }
        _ => Err(fail(thread, target.pos, "invalid assignment target")),
    }
}

pub(super) fn eval_expr(
    thread: &mut Thread,
    env: &mut Env<'_>,
    expr: &Expr,
) -> Result<Value, EvalError> {
    let pos = expr.pos;
    let value = match &expr.kind {
        ExprKind::Ident(name) => env.lookup(name).map_err(|msg| fail(thread, pos, msg))?,
        ExprKind::Literal(literal) => match literal {
            Literal::None => Value::None,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(i.clone()),
            Literal::Float(f) => Value::Float(*f),
            Literal::String(s) => Value::string(s.as_str()),
            Literal::Bytes(b) => Value::bytes(b.as_slice()),
        },
        ExprKind::List(items) => Value::new_list(eval_all(thread, env, items)?),
        ExprKind::Tuple(items) => Value::new_tuple(eval_all(thread, env, items)?),
        ExprKind::Dict(entries) => {
            let dict = Dict::default();
            for (key, value) in entries {
                let k = eval_expr(thread, env, key)?;
                let v = eval_expr(thread, env, value)?;
                if dict.contains(&k).map_err(|msg| fail(thread, key.pos, msg))? {
                    return Err(fail(thread, key.pos, format!("duplicate key: {}", k.repr())));
                }
                dict.insert(k, v).map_err(|msg| fail(thread, key.pos, msg))?;
            }
            Value::Dict(Arc::new(dict))
        }
        ExprKind::Unary { op, operand } => {
            let value = eval_expr(thread, env, operand)?;
            ops::unary(*op, &value).map_err(|msg| fail(thread, pos, msg))?
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let left = eval_expr(thread, env, lhs)?;
            match op {
                BinaryOp::And if !left.truth() => left,
                BinaryOp::Or if left.truth() => left,
                BinaryOp::And | BinaryOp::Or => eval_expr(thread, env, rhs)?,
                _ => {
                    let right = eval_expr(thread, env, rhs)?;
                    ops::binary(*op, &left, &right).map_err(|msg| fail(thread, pos, msg))?
                }
            }
        }
        ExprKind::Cond {
            cond,
            then,
            otherwise,
        } => {
            if eval_expr(thread, env, cond)?.truth() {
                eval_expr(thread, env, then)?
            } else {
                eval_expr(thread, env, otherwise)?
            }
        }
        ExprKind::Call { func, args } => {
            let callee = eval_expr(thread, env, func)?;
            let (positional, named) = eval_args(thread, env, pos, args)?;
            thread.set_pos(pos);
            check_cancelled(thread, pos)?;
            call(thread, &callee, positional, named)?
        }
        ExprKind::Index { target, index } => {
            let object = eval_expr(thread, env, target)?;
            let index = eval_expr(thread, env, index)?;
            ops::index(&object, &index).map_err(|msg| fail(thread, pos, msg))?
        }
        ExprKind::Slice {
            target,
            start,
            stop,
            step,
        } => {
            let object = eval_expr(thread, env, target)?;
            let mut bound = |part: &Option<Box<Expr>>| -> Result<Value, EvalError> {
                match part {
                    Some(expr) => eval_expr(thread, env, expr),
                    None => Ok(Value::None),
                }
            };
            let start = bound(start)?;
            let stop = bound(stop)?;
            let step = bound(step)?;
            ops::slice(&object, &start, &stop, &step).map_err(|msg| fail(thread, pos, msg))?
        }
        ExprKind::Dot { target, name } => {
            let object = eval_expr(thread, env, target)?;
            match builtins::attr(&object, name) {
                Some(method) => method,
                None => {
                    return Err(fail(
                        thread,
                        pos,
                        format!("{} has no .{} field or method", object.type_name(), name),
                    ));
                }
            }
        }
        ExprKind::ListComp { body, clauses } => {
            let mut items = Vec::new();
            env.comprehensions.push(HashMap::new());
            let result = comprehension(thread, env, clauses, &mut |thread, env| {
                items.push(eval_expr(thread, env, body)?);
                Ok(())
            });
            env.comprehensions.pop();
            result?;
            Value::new_list(items)
        }
        ExprKind::DictComp {
            key,
            value,
            clauses,
        } => {
            let dict = Dict::default();
            env.comprehensions.push(HashMap::new());
            let result = comprehension(thread, env, clauses, &mut |thread, env| {
                let k = eval_expr(thread, env, key)?;
                let v = eval_expr(thread, env, value)?;
                dict.insert(k, v).map_err(|msg| fail(thread, key.pos, msg))
            });
            env.comprehensions.pop();
            result?;
            Value::Dict(Arc::new(dict))
        }
    };
    Ok(value)
}

fn eval_all(thread: &mut Thread, env: &mut Env<'_>, exprs: &[Expr]) -> Result<Vec<Value>, EvalError> {
    exprs.iter().map(|e| eval_expr(thread, env, e)).collect()
}

type Emit<'e> = dyn for<'x> FnMut(&mut Thread, &mut Env<'x>) -> Result<(), EvalError> + 'e;

fn comprehension(
    thread: &mut Thread,
    env: &mut Env<'_>,
    clauses: &[Clause],
    emit: &mut Emit<'_>,
) -> Result<(), EvalError> {
    let Some((clause, rest)) = clauses.split_first() else {
        return emit(thread, env);
    };
    match clause {
        Clause::For { target, iter } => {
            let iterable = eval_expr(thread, env, iter)?;
            let items = iterable
                .elements()
                .map_err(|msg| fail(thread, iter.pos, format!("for loop: {}", msg)))?;
            for item in items {
                check_cancelled(thread, iter.pos)?;
                assign(thread, env, target, item, true)?;
                comprehension(thread, env, rest, emit)?;
            }
        }
        Clause::If(cond) => {
            if eval_expr(thread, env, cond)?.truth() {
                comprehension(thread, env, rest, emit)?;
            }
        }
    }
    Ok(())
}

fn eval_args(
    thread: &mut Thread,
    env: &mut Env<'_>,
    pos: Pos,
    args: &[Arg],
) -> Result<(Vec<Value>, Vec<(String, Value)>), EvalError> {
    let mut positional = Vec::new();
    let mut named = Vec::new();
    for arg in args {
        match arg {
            Arg::Positional(expr) => positional.push(eval_expr(thread, env, expr)?),
            Arg::Keyword(name, expr) => named.push((name.clone(), eval_expr(thread, env, expr)?)),
            Arg::Star(expr) => {
                let value = eval_expr(thread, env, expr)?;
                let items = value.iterate().map_err(|_| {
                    fail(
                        thread,
                        pos,
                        format!("argument after * must be iterable, not {}", value.type_name()),
                    )
                })?;
                positional.extend(items);
            }
            Arg::StarStar(expr) => {
                let value = eval_expr(thread, env, expr)?;
                let Value::Dict(dict) = &value else {
                    return Err(fail(
                        thread,
                        pos,
                        format!("argument after ** must be a mapping, not {}", value.type_name()),
                    ));
                };
                for (key, item) in dict.snapshot() {
                    match key {
                        Value::String(name) => named.push((name.to_string(), item)),
                        other => {
                            return Err(fail(
                                thread,
                                pos,
                                format!("keywords must be strings, not {}", other.type_name()),
                            ));
                        }
                    }
                }
            }
        }
    }
    Ok((positional, named))
}

/// Creates the local scope for one call of `def`.
pub(super) fn new_scope(def: &Arc<FunctionDef>, vars: HashMap<String, Value>) -> Scope {
    Scope {
        def: def.clone(),
        vars: Arc::new(Mutex::new(vars)),
    }
}
