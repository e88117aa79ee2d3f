/// String and bytes literal escaping and unescaping for Starlark syntax.
///
/// This module converts between:
/// - Runtime strings (e.g., "hello\n" with an actual newline character)
/// - Starlark source literals (e.g., "hello\n" with a backslash-n sequence)
use core::fmt;

/// Controls which quote style to use when escaping strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteStyle {
    /// Always use single quotes: `'...'`
    AlwaysSingle,
    /// Always use double quotes: `"..."`
    #[default]
    AlwaysDouble,
    /// Prefer double quotes, use single if string contains double quotes but not single
    PreferDouble,
}

/// Errors that can occur when unescaping literals.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnescapeError {
    /// Invalid escape sequence (e.g., `\q`)
    #[error("invalid escape sequence {seq}")]
    InvalidEscape { pos: usize, seq: String },
    /// Invalid hex digit in a numeric escape
    #[error("invalid hex digit in {seq}")]
    InvalidHexDigit { pos: usize, seq: String },
    /// Incomplete numeric escape (not enough digits)
    #[error("incomplete escape sequence: expected {expected} hex digits, got {got}")]
    IncompleteEscape {
        pos: usize,
        expected: usize,
        got: usize,
    },
    /// Invalid Unicode scalar value
    #[error("invalid Unicode code point U+{value:X}")]
    InvalidUnicodeScalar { pos: usize, value: u32 },
    /// `\x` escape above 0x7f in a text string
    #[error("non-ASCII hex escape {seq} in string (use \\u)")]
    NonAsciiHexEscape { pos: usize, seq: String },
}

/// Escape a runtime string as a Starlark string literal, quotes included.
///
/// ```ignore
/// let mut output = String::new();
/// escape_string(&mut output, "hello\nworld", QuoteStyle::AlwaysDouble).unwrap();
/// assert_eq!(output, r#""hello\nworld""#);
/// ```
pub fn escape_string(f: &mut impl fmt::Write, s: &str, style: QuoteStyle) -> fmt::Result {
    let quote_char = match style {
        QuoteStyle::AlwaysDouble => '"',
        QuoteStyle::AlwaysSingle => '\'',
        QuoteStyle::PreferDouble => {
            if s.contains('"') && !s.contains('\'') {
                '\''
            } else {
                '"'
            }
        }
    };

    f.write_char(quote_char)?;
    for ch in s.chars() {
        match ch {
            c if c == quote_char => write!(f, "\\{}", c)?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\0' => f.write_str("\\x00")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote_char)
}

/// Escape bytes as a Starlark bytes literal, `b` prefix and quotes included.
///
/// Printable ASCII is shown directly, the usual control characters use
/// backslash notation and everything else uses `\xNN`.
pub fn escape_bytes(f: &mut impl fmt::Write, bytes: &[u8]) -> fmt::Result {
    f.write_str("b\"")?;
    for &byte in bytes {
        match byte {
            b'"' => f.write_str("\\\"")?,
            b'\\' => f.write_str("\\\\")?,
            b'\n' => f.write_str("\\n")?,
            b'\r' => f.write_str("\\r")?,
            b'\t' => f.write_str("\\t")?,
            0x20..=0x7E => f.write_char(byte as char)?,
            _ => write!(f, "\\x{:02x}", byte)?,
        }
    }
    f.write_char('"')
}

/// Unescape the body of a string literal (without its quotes).
pub fn unescape_string(input: &str) -> Result<String, UnescapeError> {
    if !input.contains('\\') {
        return Ok(input.to_string());
    }

    let mut output = String::with_capacity(input.len());
    unescape(input, |piece| match piece {
        Piece::Char(c) => {
            output.push(c);
            Ok(())
        }
        Piece::Byte(pos, b) => {
            if b > 0x7f {
                return Err(UnescapeError::NonAsciiHexEscape {
                    pos,
                    seq: format!("\\x{:02x}", b),
                });
            }
            output.push(b as char);
            Ok(())
        }
    })?;
    Ok(output)
}

/// Unescape the body of a bytes literal (without its `b` prefix and quotes).
///
/// Unlike text strings, `\xNN` may produce any byte value.
pub fn unescape_bytes(input: &str) -> Result<Vec<u8>, UnescapeError> {
    if !input.contains('\\') {
        return Ok(input.as_bytes().to_vec());
    }

    let mut output = Vec::with_capacity(input.len());
    unescape(input, |piece| {
        match piece {
            Piece::Char(c) => {
                let mut buf = [0u8; 4];
                output.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            Piece::Byte(_, b) => output.push(b),
        }
        Ok(())
    })?;
    Ok(output)
}

enum Piece {
    Char(char),
    Byte(usize, u8),
}

fn unescape(
    input: &str,
    mut emit: impl FnMut(Piece) -> Result<(), UnescapeError>,
) -> Result<(), UnescapeError> {
    let mut chars = input.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        if ch != '\\' {
            emit(Piece::Char(ch))?;
            continue;
        }

        match chars.next() {
            Some((_, 'n')) => emit(Piece::Char('\n'))?,
            Some((_, 'r')) => emit(Piece::Char('\r'))?,
            Some((_, 't')) => emit(Piece::Char('\t'))?,
            Some((_, 'a')) => emit(Piece::Char('\x07'))?,
            Some((_, 'b')) => emit(Piece::Char('\x08'))?,
            Some((_, 'f')) => emit(Piece::Char('\x0c'))?,
            Some((_, 'v')) => emit(Piece::Char('\x0b'))?,
            Some((_, '0')) => emit(Piece::Char('\0'))?,
            Some((_, '\\')) => emit(Piece::Char('\\'))?,
            Some((_, '"')) => emit(Piece::Char('"'))?,
            Some((_, '\'')) => emit(Piece::Char('\''))?,
            // Line continuation: drop both the backslash and the newline.
            Some((_, '\n')) => {}
            Some((_, 'x')) => {
                let value = read_hex(&mut chars, pos, 'x', 2)?;
                emit(Piece::Byte(pos, value as u8))?;
            }
            Some((_, 'u')) => {
                let value = read_hex(&mut chars, pos, 'u', 4)?;
                let c = char::from_u32(value)
                    .ok_or(UnescapeError::InvalidUnicodeScalar { pos, value })?;
                emit(Piece::Char(c))?;
            }
            Some((_, 'U')) => {
                let value = read_hex(&mut chars, pos, 'U', 8)?;
                let c = char::from_u32(value)
                    .ok_or(UnescapeError::InvalidUnicodeScalar { pos, value })?;
                emit(Piece::Char(c))?;
            }
            Some((_, other)) => {
                return Err(UnescapeError::InvalidEscape {
                    pos,
                    seq: format!("\\{}", other),
                });
            }
            None => {
                return Err(UnescapeError::InvalidEscape {
                    pos,
                    seq: "\\".to_string(),
                });
            }
        }
    }

    Ok(())
}

fn read_hex(
    chars: &mut core::iter::Peekable<core::str::CharIndices<'_>>,
    pos: usize,
    kind: char,
    digits: usize,
) -> Result<u32, UnescapeError> {
    let mut value = 0u32;
    for got in 0..digits {
        match chars.next() {
            Some((_, ch)) => match ch.to_digit(16) {
                Some(digit) => value = (value << 4) | digit,
                None => {
                    return Err(UnescapeError::InvalidHexDigit {
                        pos,
                        seq: format!("\\{}{}", kind, ch),
                    });
                }
            },
            None => {
                return Err(UnescapeError::IncompleteEscape {
                    pos,
                    expected: digits,
                    got,
                });
            }
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn escape(s: &str, style: QuoteStyle) -> String {
        let mut output = String::new();
        escape_string(&mut output, s, style).unwrap();
        output
    }

    fn escape_b(b: &[u8]) -> String {
        let mut output = String::new();
        escape_bytes(&mut output, b).unwrap();
        output
    }

    #[test]
    fn test_escape_empty() {
        assert_eq!(escape("", QuoteStyle::AlwaysDouble), r#""""#);
        assert_eq!(escape("", QuoteStyle::AlwaysSingle), "''");
    }

    #[test]
    fn test_escape_common_escapes() {
        assert_eq!(
            escape("hello\nworld", QuoteStyle::AlwaysDouble),
            r#""hello\nworld""#
        );
        assert_eq!(escape("tab\there", QuoteStyle::AlwaysDouble), r#""tab\there""#);
        assert_eq!(
            escape("back\\slash", QuoteStyle::AlwaysDouble),
            r#""back\\slash""#
        );
        assert_eq!(escape(r#"say "hi""#, QuoteStyle::AlwaysDouble), r#""say \"hi\"""#);
    }

    #[test]
    fn test_escape_prefer_double_switches_quotes() {
        assert_eq!(escape(r#"a "b""#, QuoteStyle::PreferDouble), r#"'a "b"'"#);
    }

    #[test]
    fn test_escape_bytes() {
        assert_eq!(escape_b(b"dead0000beef"), r#"b"dead0000beef""#);
        assert_eq!(escape_b(&[0, 255, b'"']), r#"b"\x00\xff\"""#);
    }

    #[test]
    fn test_unescape_string() {
        assert_eq!(unescape_string("plain").unwrap(), "plain");
        assert_eq!(unescape_string(r"a\nb\tc").unwrap(), "a\nb\tc");
        assert_eq!(unescape_string(r"é\x41").unwrap(), "éA");
        assert_eq!(unescape_string(r"\U0001F600").unwrap(), "😀");
    }

    #[test]
    fn test_unescape_string_errors() {
        assert!(matches!(
            unescape_string(r"\q"),
            Err(UnescapeError::InvalidEscape { .. })
        ));
        assert!(matches!(
            unescape_string(r"\u12"),
            Err(UnescapeError::IncompleteEscape { expected: 4, got: 2, .. })
        ));
        assert!(matches!(
            unescape_string(r"\xff"),
            Err(UnescapeError::NonAsciiHexEscape { .. })
        ));
    }

    #[test]
    fn test_unescape_bytes() {
        assert_eq!(unescape_bytes(r"\x00\xffz").unwrap(), vec![0, 255, b'z']);
        assert_eq!(unescape_bytes("é").unwrap(), "é".as_bytes().to_vec());
    }
}
