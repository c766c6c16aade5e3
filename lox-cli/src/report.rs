use ariadne::{Color, Label, Report, ReportKind, Source};
use lox::LoxError;
use std::io::Write;
use std::ops::Range;

/// Converts a byte span to a character span for ariadne.
///
/// Returns `None` when the span does not fall on character boundaries of
/// `source`, as happens for errors raised by code from another buffer.
fn byte_to_char_span(source: &str, byte_span: &Range<usize>) -> Option<Range<usize>> {
    if byte_span.start > byte_span.end {
        return None;
    }
    let start = source.get(..byte_span.start)?.chars().count();
    let end = source.get(..byte_span.end)?.chars().count();
    Some(start..end)
}

/// Character span of the 1-based `line` in `source`, without its newline.
fn line_span(source: &str, line: usize) -> Range<usize> {
    let mut start = 0;
    for (index, text) in source.split('\n').enumerate() {
        let len = text.chars().count();
        if index + 1 == line {
            return start..start + len;
        }
        start += len + 1;
    }
    let end = source.chars().count();
    end..end
}

fn error_span(error: &LoxError, source: &str) -> Range<usize> {
    let line = error.line().unwrap_or(1);
    match error.span() {
        Some(span) if span.is_empty() && span.start == 0 => line_span(source, line),
        Some(span) => byte_to_char_span(source, &span).unwrap_or_else(|| line_span(source, line)),
        None => line_span(source, line),
    }
}

/// Renders a LoxError using ariadne
pub fn report_error<W: Write>(
    error: &LoxError,
    source: &str,
    filename: Option<&str>,
    mut writer: W,
) {
    let name = filename.unwrap_or("");
    let src = (name, Source::from(source));

    match error {
        LoxError::Io(_) => {
            writeln!(writer, "{}", error).ok();
        }
        LoxError::Scan { .. } | LoxError::Parse { .. } | LoxError::Resolution { .. } => {
            let span = error_span(error, source);
            Report::build(ReportKind::Error, (name, span.clone()))
                .with_message(error.to_string())
                .with_label(
                    Label::new((name, span))
                        .with_message(error.message())
                        .with_color(Color::Red),
                )
                .finish()
                .write(src, &mut writer)
                .ok();
        }
        LoxError::Runtime { message, line, .. } => {
            let span = error_span(error, source);
            Report::build(ReportKind::Error, (name, span.clone()))
                .with_message(message)
                .with_label(
                    Label::new((name, span))
                        .with_message(message)
                        .with_color(Color::Yellow),
                )
                .with_note(format!("[line {}]", line))
                .finish()
                .write(src, &mut writer)
                .ok();
        }
        LoxError::Return(_) => {}
    }
}
