//! Invocable compiled templates.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use ejs_script::{Interpreter, Object, Program, Value, parse_program};
use serde::Serialize;
use serde_json::Value as Json;
use tracing::trace;

use crate::codegen::{GeneratedProgram, LINE, OUTPUT};
use crate::diagnostics::{LineIndex, map_error};
use crate::error::{CompileError, RenderError};
use crate::escape::escape_value;
use crate::filters::FilterRegistry;

/// A named set of input values, as accepted by [`Template::render`].
pub type Locals = serde_json::Map<String, Json>;

/// A compiled template, ready to render.
///
/// Templates are immutable and cheap to clone; they can be rendered
/// concurrently from several threads.
#[derive(Clone)]
pub struct Template {
    program: Arc<Program>,
    source: Arc<str>,
    index: Arc<LineIndex>,
    filename: Option<String>,
    debug: bool,
    filters: Arc<FilterRegistry>,
}

impl Template {
    pub(crate) fn build(
        generated: &GeneratedProgram,
        source: &str,
        filename: Option<&str>,
        filters: Arc<FilterRegistry>,
    ) -> Result<Self, CompileError> {
        let text = program_source(generated);
        let program = parse_program(&text).map_err(|source| CompileError::Script {
            source,
            filename: filename.map(ToString::to_string),
        })?;
        Ok(Self {
            program: Arc::new(program),
            source: Arc::from(source),
            index: Arc::new(LineIndex::new(source)),
            filename: filename.map(ToString::to_string),
            debug: generated.debug,
            filters,
        })
    }

    /// Render with any value that serializes to an object.
    ///
    /// `()` and `None` count as no locals.
    pub fn render<S: Serialize + ?Sized>(&self, locals: &S) -> Result<String, RenderError> {
        let locals = locals_value(locals)?;
        self.render_value(locals)
    }

    /// Render with script values directly.
    pub fn render_value(&self, locals: Value) -> Result<String, RenderError> {
        trace!(filename = ?self.filename, debug = self.debug, "Rendering template");
        let mut interpreter = Interpreter::new();
        interpreter.define_global("locals", locals);
        interpreter.define_global("escape", escape_function());
        interpreter.define_global("filters", self.filters.to_script_object());
        if self.debug {
            interpreter.define_global(LINE, Value::Number(1.0));
        }

        match interpreter.run(&self.program) {
            Ok(output) => Ok(output.to_string()),
            Err(err) if self.debug => {
                let line = interpreter
                    .global(LINE)
                    .as_ref()
                    .map_or(1.0, Value::to_number);
                let line = if line.is_finite() && line >= 1.0 { line as usize } else { 1 };
                Err(map_error(
                    err,
                    line,
                    &self.source,
                    &self.index,
                    self.filename.as_deref(),
                ))
            }
            Err(err) => Err(RenderError::Script(err)),
        }
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// The template text this was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed program the template runs.
    pub fn program(&self) -> &Program {
        &self.program
    }
}

impl Debug for Template {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("filename", &self.filename)
            .field("debug", &self.debug)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Wrap a generated body into the program run by [`Template`].
pub(crate) fn program_source(generated: &GeneratedProgram) -> String {
    format!(
        "var {OUTPUT} = [];\nwith (locals) {{\n{}\n}}\nreturn {OUTPUT}.join(\"\");\n",
        generated.body
    )
}

pub(crate) fn escape_function() -> Value {
    Value::native("escape", |args| {
        Ok(Value::String(args.first().map_or_else(String::new, escape_value)))
    })
}

/// Convert serializable locals into a script object.
pub(crate) fn locals_value<S: Serialize + ?Sized>(locals: &S) -> Result<Value, RenderError> {
    match serde_json::to_value(locals)? {
        Json::Null => Ok(Value::object(Object::new())),
        json @ Json::Object(_) => Ok(Value::from_json(json)),
        other => Err(RenderError::InvalidLocals {
            kind: json_kind(&other),
        }),
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
