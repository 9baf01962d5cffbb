//! Maps runtime failures back onto template source lines.

use std::iter;

use ejs_script::ScriptError;

use crate::error::RenderError;

/// Window size around the failing line: two lines before it, three after.
const CONTEXT_RADIUS: usize = 3;

/// Byte offsets of the start of each line of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let starts = iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Text of a 1-based line, without its `\n` or `\r\n` line break.
    pub fn line<'s>(&self, source: &'s str, line: usize) -> Option<&'s str> {
        let start = *self.starts.get(line.checked_sub(1)?)?;
        let end = self
            .starts
            .get(line)
            .map_or(source.len(), |next| next - 1);
        let text = source.get(start..end)?;
        Some(text.strip_suffix('\r').unwrap_or(text))
    }

    /// Lines around `line`, the failing one marked with ` >> `.
    pub fn context(&self, source: &str, line: usize) -> String {
        let start = line.saturating_sub(CONTEXT_RADIUS);
        let end = self.line_count().min(line + CONTEXT_RADIUS);
        (start..end)
            .map(|i| {
                let current = i + 1;
                let gutter = if current == line { " >> " } else { "    " };
                let text = self.line(source, current).unwrap_or_default();
                format!("{gutter}{current}| {text}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Attach template context to a runtime failure.
pub fn map_error(
    err: ScriptError,
    line: usize,
    source: &str,
    index: &LineIndex,
    filename: Option<&str>,
) -> RenderError {
    let (name, message) = match &err {
        ScriptError::Runtime(runtime) => (runtime.name.clone(), runtime.message.clone()),
        ScriptError::Syntax { message, .. } => ("SyntaxError".to_string(), message.clone()),
    };
    RenderError::Template {
        name,
        message,
        path: filename.map(ToString::to_string),
        line,
        context: index.context(source, line),
        source: err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_marks_failing_line() {
        let source = "a\nb\nc\nd\ne\nf\ng";
        let index = LineIndex::new(source);
        assert_eq!(index.line_count(), 7);
        assert_eq!(
            index.context(source, 4),
            "    2| b\n    3| c\n >> 4| d\n    5| e\n    6| f\n    7| g"
        );
    }

    #[test]
    fn context_is_clamped_at_edges() {
        let source = "only";
        let index = LineIndex::new(source);
        assert_eq!(index.context(source, 1), " >> 1| only");
    }

    #[test]
    fn line_lookup() {
        let source = "one\ntwo\n";
        let index = LineIndex::new(source);
        assert_eq!(index.line(source, 2), Some("two"));
        assert_eq!(index.line(source, 3), Some(""));
        assert_eq!(index.line(source, 4), None);
        assert_eq!(index.line(source, 0), None);
    }

    #[test]
    fn crlf_lines_drop_the_carriage_return() {
        let source = "one\r\ntwo\r\nthree";
        let index = LineIndex::new(source);
        assert_eq!(index.line(source, 1), Some("one"));
        assert_eq!(index.line(source, 3), Some("three"));
        assert_eq!(index.context(source, 2), "    1| one\n >> 2| two\n    3| three");
    }
}
