//! Syntax tree produced by the parser.

use std::collections::BTreeSet;
use std::sync::Arc;

use num_bigint::BigInt;

use super::Pos;

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub pos: Pos,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Ident(String),
    Literal(Literal),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Cond {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Arg>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        target: Box<Expr>,
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Dot {
        target: Box<Expr>,
        name: String,
    },
    ListComp {
        body: Box<Expr>,
        clauses: Vec<Clause>,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        clauses: Vec<Clause>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    BitOr,
    BitAnd,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::BitOr => "|",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Keyword(String, Expr),
    Star(Expr),
    StarStar(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    For { target: Expr, iter: Expr },
    If(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub pos: Pos,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Assign {
        target: Expr,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinaryOp,
        value: Expr,
    },
    Def(Arc<FunctionDef>),
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Pass,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Required(String),
    Optional(String, Expr),
    Args(String),
    Kwargs(String),
}

impl Param {
    pub fn name(&self) -> &str {
        match self {
            Param::Required(name)
            | Param::Optional(name, _)
            | Param::Args(name)
            | Param::Kwargs(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub pos: Pos,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    /// Every name bound inside the body, parameters included.
    pub locals: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub stmts: Vec<Stmt>,
}

/// Collects the names a block binds, not descending into nested functions
/// (whose own name is still a binding of the block).
pub fn collect_bindings(stmts: &[Stmt], out: &mut BTreeSet<String>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Assign { target, .. } | StmtKind::AugAssign { target, .. } => {
                collect_target_names(target, out);
            }
            StmtKind::Def(def) => {
                out.insert(def.name.clone());
            }
            StmtKind::If {
                then, otherwise, ..
            } => {
                collect_bindings(then, out);
                collect_bindings(otherwise, out);
            }
            StmtKind::For { target, body, .. } => {
                collect_target_names(target, out);
                collect_bindings(body, out);
            }
            StmtKind::While { body, .. } => collect_bindings(body, out),
            StmtKind::Expr(_)
            | StmtKind::Return(_)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Pass => {}
        }
    }
}

/// Names bound by an assignment target. Index and attribute targets bind
/// nothing.
pub fn collect_target_names(target: &Expr, out: &mut BTreeSet<String>) {
    match &target.kind {
        ExprKind::Ident(name) => {
            out.insert(name.clone());
        }
        ExprKind::List(items) | ExprKind::Tuple(items) => {
            for item in items {
                collect_target_names(item, out);
            }
        }
        _ => {}
    }
}
