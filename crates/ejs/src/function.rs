//! Source-text output: a standalone `function` definition that can be
//! shipped elsewhere and evaluated later.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use ejs_script::{Interpreter, RuntimeError, ScriptError, parse_program};
use serde::Serialize;
use tracing::trace;

use crate::codegen::{GeneratedProgram, LINE, OUTPUT};
use crate::error::{CompileError, RenderError};
use crate::escape::quote;
use crate::filters::FilterRegistry;
use crate::template::{escape_function, locals_value};

/// Function name used when none is configured.
pub const DEFAULT_FUNCTION_NAME: &str = "anonymous";

/// Used when the caller passes no `escape` argument.
const ESCAPE_FALLBACK: &str = r#"function (value) {
  if (value == null) { return ""; }
  return String(value).split("&").join("&amp;").split("<").join("&lt;").split(">").join("&gt;").split("\"").join("&quot;").split("'").join("&#39;");
}"#;

/// Rewrites a failure so its message carries the template position.
const RETHROW: &str = r#"function __rethrow(err, lineno) {
  var lines = __source.split("\r\n").join("\n").split("\n");
  var start = Math.max(lineno - 3, 0);
  var end = Math.min(lines.length, lineno + 3);
  var context = [];
  for (var i = start; i < end; i++) {
    context.push((i + 1 == lineno ? " >> " : "    ") + (i + 1) + "| " + lines[i]);
  }
  if (err == null || typeof err != "object") {
    err = Error(String(err));
  }
  err.path = __filename;
  err.message = (__filename || "ejs") + ":" + lineno + "\n" + context.join("\n") + "\n\n" + err.message;
  return err;
}"#;

/// Text of a function `name(locals, filters, escape)` that renders the
/// template when called.
///
/// The text only refers to its own parameters, so it can be stored and run
/// wherever a compatible script runtime exists. [`FunctionSource::call`]
/// runs it with the bundled interpreter.
#[derive(Clone)]
pub struct FunctionSource {
    text: String,
    name: String,
    filename: Option<String>,
    filters: Arc<FilterRegistry>,
}

impl FunctionSource {
    pub(crate) fn build(
        generated: &GeneratedProgram,
        source: &str,
        filename: Option<&str>,
        name: Option<&str>,
        filters: Arc<FilterRegistry>,
    ) -> Result<Self, CompileError> {
        let name = name.unwrap_or(DEFAULT_FUNCTION_NAME);
        let text = function_text(generated, source, filename, name);
        parse_program(&text).map_err(|source| CompileError::Script {
            source,
            filename: filename.map(ToString::to_string),
        })?;
        Ok(Self {
            text,
            name: name.to_string(),
            filename: filename.map(ToString::to_string),
            filters,
        })
    }

    /// The function definition.
    pub fn source(&self) -> &str {
        &self.text
    }

    pub fn into_source(self) -> String {
        self.text
    }

    /// Name the function is declared under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Evaluate the definition and call it with the filters it was
    /// compiled against.
    pub fn call<S: Serialize + ?Sized>(&self, locals: &S) -> Result<String, RenderError> {
        self.call_with_filters(locals, &self.filters)
    }

    /// Evaluate the definition and call it with `filters` as its
    /// `filters` argument.
    ///
    /// Failures come back as [`RenderError::Script`]; in debug builds the
    /// message already names the template line and the error carries a
    /// `path` property when a filename was set.
    pub fn call_with_filters<S: Serialize + ?Sized>(
        &self,
        locals: &S,
        filters: &FilterRegistry,
    ) -> Result<String, RenderError> {
        trace!(name = %self.name, "Calling function source");
        let locals = locals_value(locals)?;
        let program = parse_program(&self.text)?;
        let mut interpreter = Interpreter::new();
        interpreter.run(&program)?;
        let function = interpreter.global(&self.name).ok_or_else(|| {
            ScriptError::Runtime(RuntimeError {
                name: "ReferenceError".to_string(),
                message: format!("{} is not defined", self.name),
                line: 1,
                properties: Vec::new(),
            })
        })?;
        let output = interpreter.call(
            &function,
            &[locals, filters.to_script_object(), escape_function()],
        )?;
        Ok(output.to_string())
    }
}

impl Display for FunctionSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for FunctionSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSource")
            .field("name", &self.name)
            .field("filename", &self.filename)
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

fn function_text(
    generated: &GeneratedProgram,
    source: &str,
    filename: Option<&str>,
    name: &str,
) -> String {
    let debug = generated.debug;
    let mut lines = vec![
        format!("function {name}(locals, filters, escape) {{"),
        format!("escape = escape || {ESCAPE_FALLBACK};"),
        format!("var {OUTPUT} = [];"),
    ];
    if debug {
        lines.push(format!("var __source = {};", quote(source)));
        lines.push(format!(
            "var __filename = {};",
            filename.map_or_else(|| "null".to_string(), quote)
        ));
        lines.push(format!("var {LINE} = 1;"));
        lines.push("try {".to_string());
    }
    lines.push("with (locals || {}) {".to_string());
    lines.push(generated.body.clone());
    lines.push("}".to_string());
    if debug {
        lines.push(format!("}} catch (err) {{ throw __rethrow(err, {LINE}); }}"));
    }
    lines.push(format!("return {OUTPUT}.join(\"\");"));
    if debug {
        lines.push(RETHROW.to_string());
    }
    lines.push("}".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::generate;
    use crate::options::Delimiters;
    use crate::parser::parse_template;

    fn build(template: &str, debug: bool, name: Option<&str>) -> FunctionSource {
        let segments = parse_template(template, &Delimiters::default(), None).unwrap();
        let generated = generate(&segments, debug);
        FunctionSource::build(&generated, template, None, name, Arc::new(FilterRegistry::new()))
            .unwrap()
    }

    #[test]
    fn declares_named_function() {
        let function = build("<%= a %>", false, Some("render"));
        assert!(function.source().starts_with("function render(locals, filters, escape) {"));
        assert!(function.source().ends_with("}"));
        assert_eq!(function.name(), "render");
    }

    #[test]
    fn default_name_is_anonymous() {
        let function = build("x", false, None);
        assert!(function.source().starts_with("function anonymous("));
    }

    #[test]
    fn debug_output_embeds_source_and_handler() {
        let function = build("<%= a %>", true, None);
        assert!(function.source().contains("var __source = \"<%= a %>\";"));
        assert!(function.source().contains("function __rethrow(err, lineno)"));
        assert!(!build("<%= a %>", false, None).source().contains("__rethrow"));
    }

    #[test]
    fn call_renders() {
        let function = build("<p><%= name %></p>", true, None);
        let locals = serde_json::json!({ "name": "<b>" });
        assert_eq!(function.call(&locals).unwrap(), "<p>&lt;b&gt;</p>");
    }
}
