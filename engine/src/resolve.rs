//! Static checks run before evaluation: every name must be bound somewhere,
//! and the dialect options decide which statements are allowed where.

use std::collections::{BTreeSet, HashMap};

use crate::builtins;
use crate::dialect::Dialect;
use crate::error::{ResolveError, ResolveErrorList};
use crate::syntax::Pos;
use crate::syntax::ast::*;

const DOESNT: &str = "this Starlark dialect does not";

/// Checks a whole program. `is_predeclared` reports the names supplied by
/// the embedder.
pub(crate) fn resolve_module(
    filename: &str,
    module: &Module,
    dialect: Dialect,
    is_predeclared: &dyn Fn(&str) -> bool,
) -> Result<(), ResolveErrorList> {
    let mut globals = BTreeSet::new();
    collect_bindings(&module.stmts, &mut globals);

    let mut resolver = Resolver::new(dialect, is_predeclared, globals);
    if !dialect.allow_global_reassign {
        resolver.check_global_reassign(filename, &module.stmts);
    }
    resolver.stmts(&module.stmts);
    resolver.finish(filename)
}

/// Checks a standalone expression.
pub(crate) fn resolve_expr(
    filename: &str,
    expr: &Expr,
    dialect: Dialect,
    is_predeclared: &dyn Fn(&str) -> bool,
) -> Result<(), ResolveErrorList> {
    let mut resolver = Resolver::new(dialect, is_predeclared, BTreeSet::new());
    resolver.expr(expr);
    resolver.finish(filename)
}

struct Resolver<'a> {
    dialect: Dialect,
    is_predeclared: &'a dyn Fn(&str) -> bool,
    globals: BTreeSet<String>,
    /// Function and comprehension scopes, innermost last.
    scopes: Vec<BTreeSet<String>>,
    function_depth: usize,
    loop_depth: usize,
    errors: Vec<ResolveError>,
}

impl<'a> Resolver<'a> {
    fn new(
        dialect: Dialect,
        is_predeclared: &'a dyn Fn(&str) -> bool,
        globals: BTreeSet<String>,
    ) -> Self {
        Self {
            dialect,
            is_predeclared,
            globals,
            scopes: Vec::new(),
            function_depth: 0,
            loop_depth: 0,
            errors: Vec::new(),
        }
    }

    fn finish(mut self, filename: &str) -> Result<(), ResolveErrorList> {
        if self.errors.is_empty() {
            return Ok(());
        }
        self.errors.sort_by_key(|e| e.pos);
        tracing::debug!(filename, count = self.errors.len(), "Resolve failed");
        Err(ResolveErrorList {
            filename: filename.to_string(),
            errors: self.errors,
        })
    }

    fn error(&mut self, pos: Pos, msg: impl Into<String>) {
        self.errors.push(ResolveError {
            pos,
            msg: msg.into(),
        });
    }

    fn check_global_reassign(&mut self, filename: &str, stmts: &[Stmt]) {
        let mut declared: HashMap<String, Pos> = HashMap::new();
        for stmt in stmts {
            let mut bound: Vec<(String, Pos)> = Vec::new();
            match &stmt.kind {
                StmtKind::Assign { target, .. } => target_idents(target, &mut bound),
                StmtKind::AugAssign { target, .. } => target_idents(target, &mut bound),
                StmtKind::Def(def) => bound.push((def.name.clone(), def.pos)),
                _ => {}
            }
            for (name, pos) in bound {
                match declared.get(&name) {
                    Some(first) => {
                        let msg = format!(
                            "cannot reassign global {} declared at {}:{}",
                            name, filename, first
                        );
                        self.error(pos, msg);
                    }
                    None => {
                        declared.insert(name, pos);
                    }
                }
            }
        }
    }

    fn use_name(&mut self, name: &str, pos: Pos) {
        let bound = self.scopes.iter().any(|scope| scope.contains(name))
            || self.globals.contains(name)
            || (self.is_predeclared)(name);
        if bound {
            return;
        }
        if builtins::is_universal(name) {
            if name == "set" && !self.dialect.allow_set {
                self.error(pos, format!("{} support sets", DOESNT));
            }
            return;
        }
        self.error(pos, format!("undefined: {}", name));
    }

    fn toplevel_check(&mut self, pos: Pos, what: &str) {
        if self.function_depth == 0 && !self.dialect.allow_global_reassign {
            self.error(pos, format!("{} not within a function", what));
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.expr(expr),
            StmtKind::Assign { target, value } => {
                self.expr(value);
                self.target(target);
            }
            StmtKind::AugAssign { target, value, .. } => {
                self.expr(target);
                self.expr(value);
            }
            StmtKind::Def(def) => self.function(def),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.toplevel_check(stmt.pos, "if statement");
                self.expr(cond);
                self.stmts(then);
                self.stmts(otherwise);
            }
            StmtKind::For { target, iter, body } => {
                self.toplevel_check(stmt.pos, "for loop");
                self.expr(iter);
                self.target(target);
                self.loop_depth += 1;
                self.stmts(body);
                self.loop_depth -= 1;
            }
            StmtKind::While { cond, body } => {
                if !self.dialect.allow_recursion {
                    self.error(stmt.pos, format!("{} support while loops", DOESNT));
                }
                self.toplevel_check(stmt.pos, "while loop");
                self.expr(cond);
                self.loop_depth += 1;
                self.stmts(body);
                self.loop_depth -= 1;
            }
            StmtKind::Return(value) => {
                if self.function_depth == 0 {
                    self.error(stmt.pos, "return statement not within a function");
                }
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            StmtKind::Break => {
                if self.loop_depth == 0 {
                    self.error(stmt.pos, "break not in a loop");
                }
            }
            StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.error(stmt.pos, "continue not in a loop");
                }
            }
            StmtKind::Pass => {}
        }
    }

    fn function(&mut self, def: &FunctionDef) {
        for param in &def.params {
            if let Param::Optional(_, default) = param {
                self.expr(default);
            }
        }
        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.scopes.push(def.locals.clone());
        self.function_depth += 1;
        self.stmts(&def.body);
        self.function_depth -= 1;
        self.scopes.pop();
        self.loop_depth = saved_loops;
    }

    /// Resolves the sub-expressions of an assignment target. Plain names are
    /// bindings, not uses.
    fn target(&mut self, target: &Expr) {
        match &target.kind {
            ExprKind::Ident(_) => {}
            ExprKind::List(items) | ExprKind::Tuple(items) => {
                for item in items {
                    self.target(item);
                }
            }
            _ => self.expr(target),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(name) => self.use_name(name, expr.pos),
            ExprKind::Literal(_) => {}
            ExprKind::List(items) | ExprKind::Tuple(items) => {
                for item in items {
                    self.expr(item);
                }
            }
            ExprKind::Dict(entries) => {
                for (key, value) in entries {
                    self.expr(key);
                    self.expr(value);
                }
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Cond {
                cond,
                then,
                otherwise,
            } => {
                self.expr(then);
                self.expr(cond);
                self.expr(otherwise);
            }
            ExprKind::Call { func, args } => {
                self.expr(func);
                for arg in args {
                    match arg {
                        Arg::Positional(e) | Arg::Keyword(_, e) | Arg::Star(e) | Arg::StarStar(e) => {
                            self.expr(e)
                        }
                    }
                }
            }
            ExprKind::Index { target, index } => {
                self.expr(target);
                self.expr(index);
            }
            ExprKind::Slice {
                target,
                start,
                stop,
                step,
            } => {
                self.expr(target);
                for part in [start, stop, step].into_iter().flatten() {
                    self.expr(part);
                }
            }
            ExprKind::Dot { target, .. } => self.expr(target),
            ExprKind::ListComp { body, clauses } => {
                self.comprehension(clauses, |r| r.expr(body));
            }
            ExprKind::DictComp {
                key,
                value,
                clauses,
            } => {
                self.comprehension(clauses, |r| {
                    r.expr(key);
                    r.expr(value);
                });
            }
        }
    }

    /// The first iterable is resolved in the enclosing scope; the loop
    /// variables are visible to everything after it.
    fn comprehension(&mut self, clauses: &[Clause], body: impl FnOnce(&mut Self)) {
        let mut vars = BTreeSet::new();
        for clause in clauses {
            if let Clause::For { target, .. } = clause {
                collect_target_names(target, &mut vars);
            }
        }
        if let Some(Clause::For { iter, .. }) = clauses.first() {
            self.expr(iter);
        }
        self.scopes.push(vars);
        for (i, clause) in clauses.iter().enumerate() {
            match clause {
                Clause::For { target, iter } => {
                    if i > 0 {
                        self.expr(iter);
                    }
                    self.target(target);
                }
                Clause::If(cond) => self.expr(cond),
            }
        }
        body(self);
        self.scopes.pop();
    }
}

fn target_idents(target: &Expr, out: &mut Vec<(String, Pos)>) {
    match &target.kind {
        ExprKind::Ident(name) => out.push((name.clone(), target.pos)),
        ExprKind::List(items) | ExprKind::Tuple(items) => {
            for item in items {
                target_idents(item, out);
            }
        }
        _ => {}
    }
}
