//! Turns template segments into a script body that appends to `__output`.
//!
//! Line `k` of the generated body always corresponds to line `k` of the
//! template: each segment emits its code on the line it starts on and then
//! pads with line breaks until it has emitted as many as its source spans.

use ejs_script::format_number;

use crate::escape::quote;
use crate::parser::{FilterArg, FilterCall, Segment, SegmentKind};

/// Name of the output accumulator in generated code.
pub const OUTPUT: &str = "__output";
/// Name of the current-line tracker in generated code.
pub const LINE: &str = "__line";

/// A generated function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProgram {
    /// Statements operating on `__output`, `escape`, `filters` and the
    /// names bound by `with (locals)`.
    pub body: String,
    /// Number of lines in `body`; equals the template's line count.
    pub lines: usize,
    /// Whether `__line` markers were emitted.
    pub debug: bool,
}

/// Generate the body for a scanned template.
pub fn generate(segments: &[Segment], debug: bool) -> GeneratedProgram {
    let mut body = String::new();
    let mut trim_next = false;

    for segment in segments {
        let code = match &segment.kind {
            SegmentKind::Literal(text) => {
                let text = if trim_next { strip_leading_newline(text) } else { text };
                if text.is_empty() {
                    String::new()
                } else {
                    append(&quote(text))
                }
            }
            SegmentKind::Scriptlet(code) => format!("{}{code};", marker(segment, debug)),
            SegmentKind::Expression { code, escape } => format!(
                "{}{}",
                marker(segment, debug),
                append(&wrap(&format!("({code})"), *escape))
            ),
            SegmentKind::FilteredExpression {
                base,
                filters,
                escape,
            } => format!(
                "{}{}",
                marker(segment, debug),
                append(&wrap(&filter_chain(base, filters), *escape))
            ),
            SegmentKind::Comment(_) => String::new(),
            SegmentKind::LiteralTagEscape(open) => append(&quote(open)),
        };

        let emitted = code.matches('\n').count();
        body.push_str(&code);
        for _ in emitted..segment.newlines {
            body.push('\n');
        }
        trim_next = segment.trim;
    }

    let lines = body.matches('\n').count() + 1;
    GeneratedProgram { body, lines, debug }
}

fn marker(segment: &Segment, debug: bool) -> String {
    if debug {
        format!("{LINE} = {}; ", segment.line)
    } else {
        String::new()
    }
}

fn append(value: &str) -> String {
    format!("{OUTPUT}.push({value});")
}

fn wrap(value: &str, escape: bool) -> String {
    if escape {
        format!("escape({value})")
    } else {
        value.to_string()
    }
}

/// `a | f | g:1` becomes `filters.g(filters.f((a)), 1)`.
fn filter_chain(base: &str, filters: &[FilterCall]) -> String {
    let mut value = format!("({base})");
    for filter in filters {
        let mut call = format!("filters.{}({value}", filter.name);
        for arg in &filter.args {
            call.push_str(", ");
            call.push_str(&filter_arg(arg));
        }
        call.push(')');
        value = call;
    }
    value
}

fn filter_arg(arg: &FilterArg) -> String {
    match arg {
        FilterArg::Number(n) => format_number(*n),
        FilterArg::Str(s) => quote(s),
        FilterArg::Ident(name) => name.clone(),
    }
}

fn strip_leading_newline(text: &str) -> &str {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Delimiters;
    use crate::parser::parse_template;

    fn body(template: &str, debug: bool) -> String {
        let segments = parse_template(template, &Delimiters::default(), None).unwrap();
        generate(&segments, debug).body
    }

    #[test]
    fn literal_and_expressions() {
        assert_eq!(
            body("<p><%= a %><%- b %></p>", false),
            r#"__output.push("<p>");__output.push(escape(( a )));__output.push(( b ));__output.push("</p>");"#
        );
    }

    #[test]
    fn debug_markers_name_the_tag_line() {
        assert_eq!(
            body("x\n<% y() %>", true),
            "__output.push(\"x\\n\");\n__line = 2;  y() ;"
        );
    }

    #[test]
    fn filter_chain_nests_calls() {
        assert_eq!(
            body(r#"<%=: items | map:"name" | join:", " %>"#, false),
            r#"__output.push(escape(filters.join(filters.map((items), "name"), ", ")));"#
        );
    }

    #[test]
    fn trimmed_newline_still_counts_as_a_line() {
        let program = {
            let segments =
                parse_template("<% a -%>\nb\n", &Delimiters::default(), None).unwrap();
            generate(&segments, false)
        };
        assert_eq!(program.body, " a ;__output.push(\"b\\n\");\n\n");
        assert_eq!(program.lines, 3);
    }

    #[test]
    fn comments_keep_their_lines() {
        let program = {
            let segments =
                parse_template("<%# one\ntwo %>x", &Delimiters::default(), None).unwrap();
            generate(&segments, true)
        };
        assert_eq!(program.body, "\n__output.push(\"x\");");
        assert_eq!(program.lines, 2);
    }
}
