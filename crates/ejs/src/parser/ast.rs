//! Segment types produced by the template scanner.

/// A span of template source.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub kind: SegmentKind,
    /// 1-based line the segment starts on.
    pub line: usize,
    /// Line breaks in the source text of the segment, delimiters included.
    pub newlines: usize,
    /// Closed with a trim suffix (`-%>`): a newline directly after the tag
    /// is dropped from the output.
    pub trim: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentKind {
    /// Plain text, appended as is.
    Literal(String),
    /// `<% code %>`: inserted verbatim into the generated program.
    Scriptlet(String),
    /// `<%= code %>` (escaped) or `<%- code %>` (raw).
    Expression { code: String, escape: bool },
    /// `<%=: base | filter:arg %>`.
    FilteredExpression {
        base: String,
        filters: Vec<FilterCall>,
        escape: bool,
    },
    /// `<%# text %>`: produces nothing.
    Comment(String),
    /// The literal-tag marker; outputs the open delimiter it carries.
    LiteralTagEscape(String),
}

/// One stage of a filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<FilterArg>,
}

/// A filter argument, fixed when the template is compiled.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArg {
    Number(f64),
    Str(String),
    /// A name, possibly dotted, resolved against locals at render time.
    Ident(String),
}
