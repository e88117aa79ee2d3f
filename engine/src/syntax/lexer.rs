//! Tokenizer: `logos` does the raw scanning, a second pass turns leading
//! whitespace into `Indent`/`Outdent` tokens and drops newlines inside
//! brackets.

use logos::Logos;

use super::string_literal::{unescape_bytes, unescape_string};
use super::{LineIndex, Pos, SyntaxError};

fn triple_quoted(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    let quote = &slice[slice.len() - 3..];
    let rest = lex.remainder();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
            continue;
        }
        if rest[i..].starts_with(quote) {
            lex.bump(i + 3);
            return Some(lex.slice().to_owned());
        }
    }
    None
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f\r]+")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"\\\r?\n")]
pub(crate) enum Token {
    #[token("\n")]
    Newline,

    // Keywords
    #[token("and")]
    And,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("def")]
    Def,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("if")]
    If,
    #[token("in")]
    In,
    #[token("not")]
    Not,
    #[token("or")]
    Or,
    #[token("pass")]
    Pass,
    #[token("return")]
    Return,
    #[token("while")]
    While,
    #[token("None")]
    None,
    #[token("True")]
    True,
    #[token("False")]
    False,

    #[regex("[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),

    #[regex("[0-9]+", |lex| lex.slice().to_owned())]
    #[regex("0[xX][0-9a-fA-F]+", |lex| lex.slice().to_owned())]
    #[regex("0[oO][0-7]+", |lex| lex.slice().to_owned())]
    Int(String),

    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().to_owned())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().to_owned())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().to_owned())]
    Float(String),

    /// Raw literal text, prefix and quotes included. Decoded into
    /// [`Token::String`] or [`Token::Bytes`] by [`tokenize`].
    #[regex(r#"[bBrR]{0,2}"([^"\\\n]|\\.)*""#, |lex| lex.slice().to_owned())]
    #[regex(r#"[bBrR]{0,2}'([^'\\\n]|\\.)*'"#, |lex| lex.slice().to_owned())]
    #[regex(r#"[bBrR]{0,2}""""#, triple_quoted)]
    #[regex(r#"[bBrR]{0,2}'''"#, triple_quoted)]
    RawString(String),

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("//=")]
    SlashSlashEq,
    #[token("%=")]
    PercentEq,
    #[token("|=")]
    PipeEq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    StarStar,
    #[token("/")]
    Slash,
    #[token("//")]
    SlashSlash,
    #[token("%")]
    Percent,
    #[token("|")]
    Pipe,
    #[token("&")]
    Amp,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,

    // Produced by `tokenize`, never by the scanner.
    String(String),
    Bytes(Vec<u8>),
    Indent,
    Outdent,
    Eof,
}

impl Token {
    /// Short description used in "got X, want Y" messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Newline => "newline".to_string(),
            Token::Ident(name) => format!("identifier {}", name),
            Token::Int(text) | Token::Float(text) => format!("number {}", text),
            Token::String(_) | Token::RawString(_) => "string literal".to_string(),
            Token::Bytes(_) => "bytes literal".to_string(),
            Token::Indent => "indent".to_string(),
            Token::Outdent => "outdent".to_string(),
            Token::Eof => "end of file".to_string(),
            other => format!("{:?}", other).to_lowercase(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Lexed {
    pub tok: Token,
    pub pos: Pos,
}

/// Scans `src` into a token stream terminated by [`Token::Eof`].
pub(crate) fn tokenize(filename: &str, src: &str) -> Result<Vec<Lexed>, SyntaxError> {
    let index = LineIndex::new(src);
    let mut out: Vec<Lexed> = Vec::new();
    let mut indents: Vec<u32> = vec![1];
    let mut depth = 0usize;
    let mut at_line_start = true;

    for (result, span) in Token::lexer(src).spanned() {
        let pos = index.pos(span.start);
        let tok = match result {
            Ok(tok) => tok,
            Err(()) => {
                let rest = &src[span.start..];
                let msg = match rest.chars().next() {
                    Some('"') | Some('\'') => "unterminated string literal".to_string(),
                    Some(c) => format!("invalid character {:?}", c),
                    None => "unexpected end of input".to_string(),
                };
                return Err(SyntaxError::new(filename, pos, msg));
            }
        };

        if tok == Token::Newline {
            if depth == 0 && !at_line_start {
                out.push(Lexed { tok, pos });
                at_line_start = true;
            }
            continue;
        }

        if at_line_start && depth == 0 {
            let current = indents.last().copied().unwrap_or(1);
            if pos.col > current {
                indents.push(pos.col);
                out.push(Lexed {
                    tok: Token::Indent,
                    pos,
                });
            } else {
                while pos.col < indents.last().copied().unwrap_or(1) {
                    indents.pop();
                    out.push(Lexed {
                        tok: Token::Outdent,
                        pos,
                    });
                }
                if indents.last().copied().unwrap_or(1) != pos.col {
                    return Err(SyntaxError::new(
                        filename,
                        pos,
                        "unindent does not match any outer indentation level",
                    ));
                }
            }
            at_line_start = false;
        }

        let tok = match tok {
            Token::LParen | Token::LBracket | Token::LBrace => {
                depth += 1;
                tok
            }
            Token::RParen | Token::RBracket | Token::RBrace => {
                depth = depth.saturating_sub(1);
                tok
            }
            Token::RawString(raw) => decode_string(&raw)
                .map_err(|msg| SyntaxError::new(filename, pos, msg))?,
            tok => tok,
        };
        out.push(Lexed { tok, pos });
    }

    let end = index.pos(src.len());
    if !at_line_start {
        out.push(Lexed {
            tok: Token::Newline,
            pos: end,
        });
    }
    while indents.len() > 1 {
        indents.pop();
        out.push(Lexed {
            tok: Token::Outdent,
            pos: end,
        });
    }
    out.push(Lexed {
        tok: Token::Eof,
        pos: end,
    });
    Ok(out)
}

fn decode_string(raw: &str) -> Result<Token, String> {
    let quote_at = raw.find(['"', '\'']).unwrap_or(0);
    let (prefix, quoted) = raw.split_at(quote_at);
    let is_bytes = prefix.contains(['b', 'B']);
    let is_raw = prefix.contains(['r', 'R']);

    let quote_len = if quoted.starts_with("\"\"\"") || quoted.starts_with("'''") {
        3
    } else {
        1
    };
    if quoted.len() < quote_len * 2 {
        return Err("unterminated string literal".to_string());
    }
    let body = &quoted[quote_len..quoted.len() - quote_len];

    match (is_bytes, is_raw) {
        (false, true) => Ok(Token::String(body.to_string())),
        (true, true) => Ok(Token::Bytes(body.as_bytes().to_vec())),
        (false, false) => unescape_string(body)
            .map(Token::String)
            .map_err(|e| e.to_string()),
        (true, false) => unescape_bytes(body)
            .map(Token::Bytes)
            .map_err(|e| e.to_string()),
    }
}
