use super::Pos;

/// A source file failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{filename}:{pos}: {msg}")]
pub struct SyntaxError {
    pub filename: String,
    pub pos: Pos,
    pub msg: String,
}

impl SyntaxError {
    pub(crate) fn new(filename: &str, pos: Pos, msg: impl Into<String>) -> Self {
        Self {
            filename: filename.to_string(),
            pos,
            msg: msg.into(),
        }
    }
}
