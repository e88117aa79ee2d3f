use core::fmt;

use thiserror::Error;

use crate::syntax::{Pos, SyntaxError};

/// One entry of an evaluation call stack, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    /// Function name, `<toplevel>` for module code, `<expr>` for `eval`.
    pub name: String,
    /// Where execution was in this frame. `None` for native functions.
    pub location: Option<(String, Pos)>,
}

impl fmt::Display for CallFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some((filename, pos)) => write!(f, "{}:{}: in {}", filename, pos, self.name),
            None => write!(f, "<builtin>: in {}", self.name),
        }
    }
}

/// A runtime failure, with the call stack active when it was raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{msg}")]
pub struct EvalError {
    pub msg: String,
    pub call_stack: Vec<CallFrame>,
}

impl EvalError {
    /// Renders the error the way a Python traceback reads.
    pub fn backtrace(&self) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        for frame in &self.call_stack {
            out.push_str("  ");
            out.push_str(&frame.to_string());
            out.push('\n');
        }
        out.push_str("Error: ");
        out.push_str(&self.msg);
        out
    }

    /// The innermost frame, where the error was raised.
    pub fn innermost(&self) -> Option<&CallFrame> {
        self.call_stack.last()
    }
}

/// A single reference the resolver could not bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    pub pos: Pos,
    pub msg: String,
}

/// Every resolution failure of one program, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ResolveErrorList {
    pub filename: String,
    pub errors: Vec<ResolveError>,
}

impl fmt::Display for ResolveErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.first() {
            Some(first) => {
                write!(f, "{}:{}: {}", self.filename, first.pos, first.msg)?;
                if self.errors.len() > 1 {
                    write!(f, " (and {} more)", self.errors.len() - 1)?;
                }
                Ok(())
            }
            None => write!(f, "{}: resolve error", self.filename),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Resolve(#[from] ResolveErrorList),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_backtrace_format() {
        let err = EvalError {
            msg: "boom".to_string(),
            call_stack: vec![
                CallFrame {
                    name: "<toplevel>".to_string(),
                    location: Some(("a.star".to_string(), Pos::new(3, 1))),
                },
                CallFrame {
                    name: "fail".to_string(),
                    location: None,
                },
            ],
        };
        assert_eq!(
            err.backtrace(),
            "Traceback (most recent call last):\n  a.star:3:1: in <toplevel>\n  <builtin>: in fail\nError: boom"
        );
        assert_eq!(err.innermost().map(|f| f.name.as_str()), Some("fail"));
    }

    #[test]
    fn test_resolve_error_list_display() {
        let list = ResolveErrorList {
            filename: "<expr>".to_string(),
            errors: vec![
                ResolveError {
                    pos: Pos::new(1, 1),
                    msg: "undefined: a".to_string(),
                },
                ResolveError {
                    pos: Pos::new(1, 8),
                    msg: "undefined: b".to_string(),
                },
            ],
        };
        assert_eq!(list.to_string(), "<expr>:1:1: undefined: a (and 1 more)");
    }
}
