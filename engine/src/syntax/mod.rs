//! Lexing and parsing of Starlark source.

pub mod ast;
mod error;
mod lexer;
mod parser;
pub mod string_literal;

#[cfg(test)]
mod parser_test;

use core::fmt;

pub use error::SyntaxError;
pub use parser::{parse_expr, parse_file};

/// A 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Maps byte offsets to line/column positions.
pub(crate) struct LineIndex<'src> {
    src: &'src str,
    line_starts: Vec<usize>,
}

impl<'src> LineIndex<'src> {
    pub(crate) fn new(src: &'src str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(src.match_indices('\n').map(|(i, _)| i + 1));
        Self { src, line_starts }
    }

    pub(crate) fn pos(&self, offset: usize) -> Pos {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let end = offset.min(self.src.len());
        let col = self.src.get(start..end).map_or(end - start, |s| s.chars().count());
        Pos::new(line as u32 + 1, col as u32 + 1)
    }
}
