//! Output escaping and string-literal quoting.

use ejs_script::Value;

/// Escape text for HTML output.
///
/// Every `&` is escaped, including one that already starts an entity.
///
/// ```
/// assert_eq!(ejs::escape_html("&foo_bar;"), "&amp;foo_bar;");
/// assert_eq!(ejs::escape_html("<script>"), "&lt;script&gt;");
/// ```
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Escape a script value: `null` and `undefined` become the empty string,
/// anything else is stringified first.
pub fn escape_value(value: &Value) -> String {
    if value.is_nullish() {
        String::new()
    } else {
        escape_html(&value.to_string())
    }
}

/// Quote text as a double-quoted script string literal.
///
/// Quotes, backslashes and control characters are escaped, so the literal
/// always fits on one line.
pub fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\u{2028}' => quoted.push_str("\\u2028"),
            '\u{2029}' => quoted.push_str("\\u2029"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_all_five_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn nullish_values_escape_to_empty() {
        assert_eq!(escape_value(&Value::Null), "");
        assert_eq!(escape_value(&Value::Undefined), "");
        assert_eq!(escape_value(&Value::from(3)), "3");
    }

    #[test]
    fn quote_keeps_literal_on_one_line() {
        assert_eq!(quote("a\"b\\c\nd"), r#""a\"b\\c\nd""#);
        assert_eq!(quote("\u{1}"), r#""\u0001""#);
    }
}
