//! Error rendering using ariadne
//!
//! Syntax, resolve and evaluation errors carry a line and column; these are
//! rendered as a report over the program source. Everything else is printed
//! as a single `ErrorType: message` line.

use crate::Error;
use ariadne::{ColorGenerator, Config, IndexType, Label, Report, ReportKind, Source};
use std::io::Write;
use std::ops::Range;

/// Render an error with source snippets to stderr
///
/// # Example
/// ```no_run
/// use starbridge::{Session, render_error};
///
/// let source = "x = 1 +";
/// if let Err(e) = Session::new().exec(source) {
///     render_error(&e, source);
/// }
/// ```
pub fn render_error(error: &Error, source: &str) {
    render_error_to_writer(error, source, &mut std::io::stderr(), true).ok();
}

/// Render an error to a specific writer
pub fn render_error_to(error: &Error, source: &str, writer: &mut dyn Write) -> std::io::Result<()> {
    render_error_to_writer(error, source, writer, true)
}

/// Render an error to a String (useful for logs and UIs)
pub fn render_error_to_string(error: &Error, source: &str) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, source, &mut buf, true).ok();
    String::from_utf8_lossy(&buf).to_string()
}

/// Same as [`render_error_to_string`] without ANSI color codes.
pub fn render_error_to_string_no_color(error: &Error, source: &str) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, source, &mut buf, false).ok();
    String::from_utf8_lossy(&buf).to_string()
}

fn render_error_to_writer(
    error: &Error,
    source: &str,
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    match error {
        Error::Syntax(err) => {
            let span = span_at(source, err.line, err.column);
            let report = report(err.error_type, &err.filename, span.clone(), use_color)
                .with_message(&err.msg)
                .with_label(label(&err.filename, span, &err.msg, &mut ColorGenerator::new()));
            report.finish().write((err.filename.as_str(), Source::from(source)), &mut *writer)
        }
        Error::Resolve(err) => {
            let mut colors = ColorGenerator::new();
            for item in &err.errors {
                let span = span_at(source, item.line, item.column);
                let report = report(err.error_type, &err.filename, span.clone(), use_color)
                    .with_message(&item.msg)
                    .with_label(label(&err.filename, span, &item.msg, &mut colors));
                report.finish().write((err.filename.as_str(), Source::from(source)), &mut *writer)?;
            }
            Ok(())
        }
        Error::Eval(err) | Error::EvalTimeout(err) => {
            let (Some(filename), Some(line), Some(column)) = (&err.filename, err.line, err.column)
            else {
                return writeln!(writer, "{}: {}", err.error_type, err.message);
            };
            let span = span_at(source, line, column);
            let mut report = report(err.error_type, filename, span.clone(), use_color)
                .with_message(&err.message)
                .with_label(label(filename, span, "raised here", &mut ColorGenerator::new()));
            if !err.backtrace.is_empty() {
                report = report.with_note(&err.backtrace);
            }
            report.finish().write((filename.as_str(), Source::from(source)), &mut *writer)
        }
        other => writeln!(writer, "{}: {}", other.error_type(), other.message()),
    }
}

fn report<'a>(
    code: &'static str,
    filename: &'a str,
    span: Range<usize>,
    use_color: bool,
) -> ariadne::ReportBuilder<'static, (&'a str, Range<usize>)> {
    Report::build(ReportKind::Error, (filename, span))
        .with_code(code)
        .with_config(
            Config::default()
                .with_color(use_color)
                .with_index_type(IndexType::Byte),
        )
}

fn label<'a>(
    filename: &'a str,
    span: Range<usize>,
    message: &str,
    colors: &mut ColorGenerator,
) -> Label<(&'a str, Range<usize>)> {
    colors.next(); // Skip the first color.
    Label::new((filename, span))
        .with_message(message)
        .with_color(colors.next())
}

/// Byte span of the character at a 1-based line and column.
///
/// Positions past the end of a line or of the source clamp to the nearest
/// valid offset, so a report can always be drawn.
fn span_at(source: &str, line: u32, column: u32) -> Range<usize> {
    let mut start = 0;
    for (index, text) in source.split_inclusive('\n').enumerate() {
        if index + 1 == line as usize {
            let skip = column.saturating_sub(1) as usize;
            let offset = text
                .char_indices()
                .nth(skip)
                .map(|(offset, _)| offset)
                .unwrap_or(text.trim_end_matches('\n').len());
            let begin = start + offset;
            let width = source[begin..].chars().next().map_or(0, char::len_utf8);
            return begin..begin + width;
        }
        start += text.len();
    }
    source.len()..source.len()
}
