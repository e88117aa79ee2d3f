//! Recursive-descent parser over the token stream from [`super::lexer`].

use std::collections::BTreeSet;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::Num;

use super::ast::*;
use super::lexer::{Lexed, Token, tokenize};
use super::{Pos, SyntaxError};

/// Parses a whole program.
pub fn parse_file(filename: &str, src: &str) -> Result<Module, SyntaxError> {
    let tokens = tokenize(filename, src)?;
    let mut parser = Parser::new(filename, tokens);
    let mut stmts = Vec::new();
    while !parser.at(&Token::Eof) {
        if parser.eat(&Token::Newline) {
            continue;
        }
        parser.parse_stmt(&mut stmts)?;
    }
    tracing::trace!(filename, statements = stmts.len(), "Parsed module");
    Ok(Module { stmts })
}

/// Parses a single expression. A bare tuple (`1, 2`) is accepted.
pub fn parse_expr(filename: &str, src: &str) -> Result<Expr, SyntaxError> {
    let tokens = tokenize(filename, src)?;
    let mut parser = Parser::new(filename, tokens);
    let expr = parser.parse_expr_list()?;
    while parser.eat(&Token::Newline) {}
    if !parser.at(&Token::Eof) {
        return Err(parser.unexpected("end of expression"));
    }
    Ok(expr)
}

struct Parser<'a> {
    filename: &'a str,
    tokens: Vec<Lexed>,
    cursor: usize,
}

type ParseResult<T> = Result<T, SyntaxError>;

impl<'a> Parser<'a> {
    fn new(filename: &'a str, tokens: Vec<Lexed>) -> Self {
        Self {
            filename,
            tokens,
            cursor: 0,
        }
    }

    // Token stream helpers. The stream always ends with `Eof`, which is
    // never consumed.

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let index = (self.cursor + ahead).min(self.tokens.len() - 1);
        &self.tokens[index].tok
    }

    fn pos(&self) -> Pos {
        self.tokens[self.cursor.min(self.tokens.len() - 1)].pos
    }

    fn at(&self, tok: &Token) -> bool {
        self.peek() == tok
    }

    fn advance(&mut self) -> Lexed {
        let lexed = self.tokens[self.cursor].clone();
        if lexed.tok != Token::Eof {
            self.cursor += 1;
        }
        lexed
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.at(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token, want: &str) -> ParseResult<Pos> {
        if self.at(&tok) {
            Ok(self.advance().pos)
        } else {
            Err(self.unexpected(want))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<(String, Pos)> {
        match self.peek().clone() {
            Token::Ident(name) => {
                let pos = self.advance().pos;
                Ok((name, pos))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn error(&self, pos: Pos, msg: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.filename, pos, msg)
    }

    fn unexpected(&self, want: &str) -> SyntaxError {
        let msg = match self.peek() {
            Token::Indent => "unexpected indentation".to_string(),
            got => format!("got {}, want {}", got.describe(), want),
        };
        self.error(self.pos(), msg)
    }

    // Statements

    fn parse_stmt(&mut self, out: &mut Vec<Stmt>) -> ParseResult<()> {
        match self.peek() {
            Token::Def => out.push(self.parse_def()?),
            Token::If => out.push(self.parse_if()?),
            Token::For => out.push(self.parse_for()?),
            Token::While => out.push(self.parse_while()?),
            _ => self.parse_simple_stmts(out)?,
        }
        Ok(())
    }

    fn parse_simple_stmts(&mut self, out: &mut Vec<Stmt>) -> ParseResult<()> {
        loop {
            out.push(self.parse_small_stmt()?);
            if !self.eat(&Token::Semicolon) {
                break;
            }
            if self.at(&Token::Newline) || self.at(&Token::Eof) {
                break;
            }
        }
        if !self.eat(&Token::Newline) && !self.at(&Token::Eof) {
            return Err(self.unexpected("newline"));
        }
        Ok(())
    }

    fn parse_small_stmt(&mut self) -> ParseResult<Stmt> {
        let pos = self.pos();
        let kind = match self.peek() {
            Token::Return => {
                self.advance();
                if matches!(
                    self.peek(),
                    Token::Newline | Token::Semicolon | Token::Eof
                ) {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.parse_expr_list()?))
                }
            }
            Token::Break => {
                self.advance();
                StmtKind::Break
            }
            Token::Continue => {
                self.advance();
                StmtKind::Continue
            }
            Token::Pass => {
                self.advance();
                StmtKind::Pass
            }
            _ => return self.parse_expr_stmt(),
        };
        Ok(Stmt { pos, kind })
    }

    fn parse_expr_stmt(&mut self) -> ParseResult<Stmt> {
        let lhs = self.parse_expr_list()?;
        let op = match self.peek() {
            Token::Assign => None,
            Token::PlusEq => Some(BinaryOp::Add),
            Token::MinusEq => Some(BinaryOp::Sub),
            Token::StarEq => Some(BinaryOp::Mul),
            Token::SlashEq => Some(BinaryOp::Div),
            Token::SlashSlashEq => Some(BinaryOp::FloorDiv),
            Token::PercentEq => Some(BinaryOp::Mod),
            Token::PipeEq => Some(BinaryOp::BitOr),
            _ => {
                return Ok(Stmt {
                    pos: lhs.pos,
                    kind: StmtKind::Expr(lhs),
                });
            }
        };
        let op_pos = self.advance().pos;
        let value = self.parse_expr_list()?;
        let kind = match op {
            None => {
                self.check_assign_target(&lhs)?;
                StmtKind::Assign { target: lhs, value }
            }
            Some(op) => {
                if !matches!(
                    lhs.kind,
                    ExprKind::Ident(_) | ExprKind::Index { .. } | ExprKind::Dot { .. }
                ) {
                    return Err(self.error(lhs.pos, "invalid target for augmented assignment"));
                }
                StmtKind::AugAssign {
                    target: lhs,
                    op,
                    value,
                }
            }
        };
        Ok(Stmt { pos: op_pos, kind })
    }

    fn check_assign_target(&self, target: &Expr) -> ParseResult<()> {
        match &target.kind {
            ExprKind::Ident(_) | ExprKind::Index { .. } | ExprKind::Dot { .. } => Ok(()),
            ExprKind::List(items) | ExprKind::Tuple(items) if !items.is_empty() => items
                .iter()
                .try_for_each(|item| self.check_assign_target(item)),
            _ => Err(self.error(target.pos, "can't assign to this expression")),
        }
    }

    /// Parses the body after a `:`, either an indented block or a run of
    /// simple statements on the same line.
    fn parse_suite(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(Token::Colon, ":")?;
        let mut body = Vec::new();
        if self.eat(&Token::Newline) {
            if !self.eat(&Token::Indent) {
                return Err(self.error(self.pos(), "expected an indented block"));
            }
            while !self.eat(&Token::Outdent) {
                if self.at(&Token::Eof) {
                    break;
                }
                self.parse_stmt(&mut body)?;
            }
        } else {
            self.parse_simple_stmts(&mut body)?;
        }
        Ok(body)
    }

    fn parse_def(&mut self) -> ParseResult<Stmt> {
        let def_pos = self.advance().pos;
        let (name, pos) = self.expect_ident()?;
        self.expect(Token::LParen, "(")?;
        let params = self.parse_params()?;
        self.expect(Token::RParen, ")")?;
        let body = self.parse_suite()?;

        let mut locals: BTreeSet<String> =
            params.iter().map(|p| p.name().to_string()).collect();
        collect_bindings(&body, &mut locals);

        Ok(Stmt {
            pos: def_pos,
            kind: StmtKind::Def(Arc::new(FunctionDef {
                name,
                pos,
                params,
                body,
                locals,
            })),
        })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        let mut params: Vec<Param> = Vec::new();
        let mut seen_optional = false;
        while !self.at(&Token::RParen) {
            let pos = self.pos();
            let param = if self.eat(&Token::StarStar) {
                Param::Kwargs(self.expect_ident()?.0)
            } else if self.eat(&Token::Star) {
                Param::Args(self.expect_ident()?.0)
            } else {
                let (name, _) = self.expect_ident()?;
                if self.eat(&Token::Assign) {
                    seen_optional = true;
                    Param::Optional(name, self.parse_test()?)
                } else {
                    if seen_optional {
                        return Err(self.error(
                            pos,
                            "required parameter may not follow optional",
                        ));
                    }
                    Param::Required(name)
                }
            };
            if params.iter().any(|p| p.name() == param.name()) {
                return Err(self.error(
                    pos,
                    format!("duplicate parameter: {}", param.name()),
                ));
            }
            if matches!(params.last(), Some(Param::Kwargs(_))) {
                return Err(self.error(pos, "parameter may not follow **kwargs"));
            }
            params.push(param);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let pos = self.advance().pos;
        let cond = self.parse_test()?;
        let then = self.parse_suite()?;
        let otherwise = if self.at(&Token::Elif) {
            vec![self.parse_if()?]
        } else if self.eat(&Token::Else) {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt {
            pos,
            kind: StmtKind::If {
                cond,
                then,
                otherwise,
            },
        })
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let pos = self.advance().pos;
        let target = self.parse_loop_vars()?;
        self.expect(Token::In, "in")?;
        let iter = self.parse_expr_list()?;
        let body = self.parse_suite()?;
        Ok(Stmt {
            pos,
            kind: StmtKind::For { target, iter, body },
        })
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let pos = self.advance().pos;
        let cond = self.parse_test()?;
        let body = self.parse_suite()?;
        Ok(Stmt {
            pos,
            kind: StmtKind::While { cond, body },
        })
    }

    fn parse_loop_vars(&mut self) -> ParseResult<Expr> {
        let first = self.parse_primary()?;
        if !self.at(&Token::Comma) {
            self.check_assign_target(&first)?;
            return Ok(first);
        }
        let pos = first.pos;
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.at(&Token::In) {
                break;
            }
            items.push(self.parse_primary()?);
        }
        let target = Expr {
            pos,
            kind: ExprKind::Tuple(items),
        };
        self.check_assign_target(&target)?;
        Ok(target)
    }

    // Expressions

    /// `test (',' test)* [',']`, a tuple when a comma is present.
    fn parse_expr_list(&mut self) -> ParseResult<Expr> {
        let first = self.parse_test()?;
        if !self.at(&Token::Comma) {
            return Ok(first);
        }
        let pos = first.pos;
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if !self.starts_expr() {
                break;
            }
            items.push(self.parse_test()?);
        }
        Ok(Expr {
            pos,
            kind: ExprKind::Tuple(items),
        })
    }

    fn starts_expr(&self) -> bool {
        matches!(
            self.peek(),
            Token::Ident(_)
                | Token::Int(_)
                | Token::Float(_)
                | Token::String(_)
                | Token::Bytes(_)
                | Token::None
                | Token::True
                | Token::False
                | Token::LParen
                | Token::LBracket
                | Token::LBrace
                | Token::Minus
                | Token::Plus
                | Token::Tilde
                | Token::Not
        )
    }

    /// A conditional expression or anything tighter.
    fn parse_test(&mut self) -> ParseResult<Expr> {
        let then = self.parse_or()?;
        if !self.at(&Token::If) {
            return Ok(then);
        }
        let pos = self.advance().pos;
        let cond = self.parse_or()?;
        self.expect(Token::Else, "else")?;
        let otherwise = self.parse_test()?;
        Ok(Expr {
            pos,
            kind: ExprKind::Cond {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        })
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.at(&Token::Or) {
            let pos = self.advance().pos;
            let rhs = self.parse_and()?;
            lhs = binary(pos, BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_not()?;
        while self.at(&Token::And) {
            let pos = self.advance().pos;
            let rhs = self.parse_not()?;
            lhs = binary(pos, BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> ParseResult<Expr> {
        if self.at(&Token::Not) {
            let pos = self.advance().pos;
            let operand = self.parse_not()?;
            return Ok(Expr {
                pos,
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let lhs = self.parse_binary(0)?;
        let op = match self.peek() {
            Token::EqEq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::Ne,
            Token::Lt => BinaryOp::Lt,
            Token::Le => BinaryOp::Le,
            Token::Gt => BinaryOp::Gt,
            Token::Ge => BinaryOp::Ge,
            Token::In => BinaryOp::In,
            Token::Not if self.peek_at(1) == &Token::In => BinaryOp::NotIn,
            _ => return Ok(lhs),
        };
        let pos = self.advance().pos;
        if op == BinaryOp::NotIn {
            self.advance();
        }
        let rhs = self.parse_binary(0)?;
        if is_comparison(self.peek()) {
            return Err(self.error(
                self.pos(),
                format!("{} does not associate with {}", op.symbol(), self.peek().describe()),
            ));
        }
        Ok(binary(pos, op, lhs, rhs))
    }

    /// Precedence climbing over the arithmetic and bitwise operators.
    fn parse_binary(&mut self, min_level: u8) -> ParseResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, level)) = arith_op(self.peek()) {
            if level < min_level {
                break;
            }
            let pos = self.advance().pos;
            let rhs = self.parse_binary(level + 1)?;
            lhs = binary(pos, op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            Token::Tilde => UnaryOp::Invert,
            _ => return self.parse_primary(),
        };
        let pos = self.advance().pos;
        let operand = self.parse_unary()?;
        Ok(Expr {
            pos,
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        })
    }

    /// An operand followed by any number of call, index and dot suffixes.
    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_operand()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    let pos = self.advance().pos;
                    let (name, _) = self.expect_ident()?;
                    expr = Expr {
                        pos,
                        kind: ExprKind::Dot {
                            target: Box::new(expr),
                            name,
                        },
                    };
                }
                Token::LParen => {
                    let pos = self.advance().pos;
                    let args = self.parse_call_args()?;
                    self.expect(Token::RParen, ")")?;
                    expr = Expr {
                        pos,
                        kind: ExprKind::Call {
                            func: Box::new(expr),
                            args,
                        },
                    };
                }
                Token::LBracket => {
                    let pos = self.advance().pos;
                    expr = self.parse_subscript(pos, expr)?;
                    self.expect(Token::RBracket, "]")?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_subscript(&mut self, pos: Pos, target: Expr) -> ParseResult<Expr> {
        let start = if self.at(&Token::Colon) {
            None
        } else {
            let index = self.parse_expr_list()?;
            if !self.at(&Token::Colon) {
                return Ok(Expr {
                    pos,
                    kind: ExprKind::Index {
                        target: Box::new(target),
                        index: Box::new(index),
                    },
                });
            }
            Some(Box::new(index))
        };
        self.expect(Token::Colon, ":")?;
        let stop = if self.at(&Token::Colon) || self.at(&Token::RBracket) {
            None
        } else {
            Some(Box::new(self.parse_test()?))
        };
        let step = if self.eat(&Token::Colon) && !self.at(&Token::RBracket) {
            Some(Box::new(self.parse_test()?))
        } else {
            None
        };
        Ok(Expr {
            pos,
            kind: ExprKind::Slice {
                target: Box::new(target),
                start,
                stop,
                step,
            },
        })
    }

    fn parse_call_args(&mut self) -> ParseResult<Vec<Arg>> {
        let mut args = Vec::new();
        while !self.at(&Token::RParen) {
            let arg = if self.eat(&Token::StarStar) {
                Arg::StarStar(self.parse_test()?)
            } else if self.eat(&Token::Star) {
                Arg::Star(self.parse_test()?)
            } else if matches!(self.peek(), Token::Ident(_)) && self.peek_at(1) == &Token::Assign
            {
                let (name, _) = self.expect_ident()?;
                self.advance();
                Arg::Keyword(name, self.parse_test()?)
            } else {
                Arg::Positional(self.parse_test()?)
            };
            args.push(arg);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_operand(&mut self) -> ParseResult<Expr> {
        let pos = self.pos();
        let kind = match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                ExprKind::Ident(name)
            }
            Token::Int(text) => {
                self.advance();
                ExprKind::Literal(Literal::Int(self.parse_int(pos, &text)?))
            }
            Token::Float(text) => {
                self.advance();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| self.error(pos, format!("invalid float literal {}", text)))?;
                ExprKind::Literal(Literal::Float(value))
            }
            Token::String(value) => {
                self.advance();
                ExprKind::Literal(Literal::String(value))
            }
            Token::Bytes(value) => {
                self.advance();
                ExprKind::Literal(Literal::Bytes(value))
            }
            Token::None => {
                self.advance();
                ExprKind::Literal(Literal::None)
            }
            Token::True => {
                self.advance();
                ExprKind::Literal(Literal::Bool(true))
            }
            Token::False => {
                self.advance();
                ExprKind::Literal(Literal::Bool(false))
            }
            Token::LParen => {
                self.advance();
                if self.eat(&Token::RParen) {
                    ExprKind::Tuple(Vec::new())
                } else {
                    let inner = self.parse_expr_list()?;
                    self.expect(Token::RParen, ")")?;
                    return Ok(inner);
                }
            }
            Token::LBracket => {
                self.advance();
                return self.parse_list(pos);
            }
            Token::LBrace => {
                self.advance();
                return self.parse_dict(pos);
            }
            _ => return Err(self.unexpected("primary expression")),
        };
        Ok(Expr { pos, kind })
    }

    fn parse_int(&self, pos: Pos, text: &str) -> ParseResult<BigInt> {
        let (digits, radix) = match text.get(..2) {
            Some("0x") | Some("0X") => (&text[2..], 16),
            Some("0o") | Some("0O") => (&text[2..], 8),
            _ => {
                if text.len() > 1 && text.starts_with('0') && text.bytes().any(|b| b != b'0') {
                    return Err(self.error(
                        pos,
                        "obsolete form of octal literal; use 0o...",
                    ));
                }
                (text, 10)
            }
        };
        BigInt::from_str_radix(digits, radix)
            .map_err(|_| self.error(pos, format!("invalid int literal {}", text)))
    }

    fn parse_list(&mut self, pos: Pos) -> ParseResult<Expr> {
        if self.eat(&Token::RBracket) {
            return Ok(Expr {
                pos,
                kind: ExprKind::List(Vec::new()),
            });
        }
        let first = self.parse_test()?;
        if self.at(&Token::For) {
            let clauses = self.parse_clauses()?;
            self.expect(Token::RBracket, "]")?;
            return Ok(Expr {
                pos,
                kind: ExprKind::ListComp {
                    body: Box::new(first),
                    clauses,
                },
            });
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.at(&Token::RBracket) {
                break;
            }
            items.push(self.parse_test()?);
        }
        self.expect(Token::RBracket, "]")?;
        Ok(Expr {
            pos,
            kind: ExprKind::List(items),
        })
    }

    fn parse_dict(&mut self, pos: Pos) -> ParseResult<Expr> {
        if self.eat(&Token::RBrace) {
            return Ok(Expr {
                pos,
                kind: ExprKind::Dict(Vec::new()),
            });
        }
        let key = self.parse_test()?;
        self.expect(Token::Colon, ":")?;
        let value = self.parse_test()?;
        if self.at(&Token::For) {
            let clauses = self.parse_clauses()?;
            self.expect(Token::RBrace, "}")?;
            return Ok(Expr {
                pos,
                kind: ExprKind::DictComp {
                    key: Box::new(key),
                    value: Box::new(value),
                    clauses,
                },
            });
        }
        let mut entries = vec![(key, value)];
        while self.eat(&Token::Comma) {
            if self.at(&Token::RBrace) {
                break;
            }
            let key = self.parse_test()?;
            self.expect(Token::Colon, ":")?;
            let value = self.parse_test()?;
            entries.push((key, value));
        }
        self.expect(Token::RBrace, "}")?;
        Ok(Expr {
            pos,
            kind: ExprKind::Dict(entries),
        })
    }

    fn parse_clauses(&mut self) -> ParseResult<Vec<Clause>> {
        let mut clauses = Vec::new();
        loop {
            if self.eat(&Token::For) {
                let target = self.parse_loop_vars()?;
                self.expect(Token::In, "in")?;
                let iter = self.parse_or()?;
                clauses.push(Clause::For { target, iter });
            } else if self.eat(&Token::If) {
                clauses.push(Clause::If(self.parse_or()?));
            } else {
                return Ok(clauses);
            }
        }
    }
}

fn binary(pos: Pos, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr {
        pos,
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    }
}

fn is_comparison(tok: &Token) -> bool {
    matches!(
        tok,
        Token::EqEq | Token::NotEq | Token::Lt | Token::Le | Token::Gt | Token::Ge | Token::In
    )
}

/// Binding level of the arithmetic and bitwise operators. Higher binds
/// tighter.
fn arith_op(tok: &Token) -> Option<(BinaryOp, u8)> {
    let entry = match tok {
        Token::Pipe => (BinaryOp::BitOr, 0),
        Token::Caret => (BinaryOp::BitXor, 1),
        Token::Amp => (BinaryOp::BitAnd, 2),
        Token::Shl => (BinaryOp::Shl, 3),
        Token::Shr => (BinaryOp::Shr, 3),
        Token::Plus => (BinaryOp::Add, 4),
        Token::Minus => (BinaryOp::Sub, 4),
        Token::Star => (BinaryOp::Mul, 5),
        Token::Slash => (BinaryOp::Div, 5),
        Token::SlashSlash => (BinaryOp::FloorDiv, 5),
        Token::Percent => (BinaryOp::Mod, 5),
        _ => return None,
    };
    Some(entry)
}
