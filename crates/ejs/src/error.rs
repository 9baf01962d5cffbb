//! Error types for compiling and rendering templates.

use ejs_script::ScriptError;
use thiserror::Error;

/// An error that prevents a template from compiling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// A tag was opened and never closed.
    #[error("Could not find matching close tag \"{close}\"{}.", in_file(.filename))]
    UnterminatedTag {
        close: String,
        /// Line of the unmatched open delimiter.
        line: usize,
        filename: Option<String>,
    },

    /// An open or close delimiter was configured as the empty string.
    #[error("{which} delimiter must not be empty")]
    EmptyDelimiter { which: &'static str },

    /// A `<%=: ... %>` filter chain could not be parsed.
    #[error("invalid filter chain at line {line}: {message}")]
    InvalidFilter { line: usize, message: String },

    /// The generated program is not valid script, usually because of a
    /// malformed scriptlet.
    #[error("{source} {}", compiling(.filename))]
    Script {
        source: ScriptError,
        filename: Option<String>,
    },
}

fn in_file(filename: &Option<String>) -> String {
    match filename {
        Some(filename) => format!(" in {filename}"),
        None => String::new(),
    }
}

fn compiling(filename: &Option<String>) -> String {
    match filename {
        Some(filename) => format!("in {filename}"),
        None => "while compiling ejs".to_string(),
    }
}

/// An error raised while rendering a compiled template.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The locals value could not be serialized.
    #[error("failed to convert locals: {0}")]
    Locals(#[from] serde_json::Error),

    /// The locals value serialized to something other than an object.
    #[error("locals must serialize to an object, got {kind}")]
    InvalidLocals { kind: &'static str },

    /// Script failure reported against the generated program, without
    /// template line mapping.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Script failure mapped back onto the template source.
    #[error("{name}: {}:{line}\n{context}\n\n{message}", display_path(.path))]
    Template {
        /// Error class, e.g. `ReferenceError`.
        name: String,
        /// The original failure message.
        message: String,
        /// The configured filename, if any.
        path: Option<String>,
        /// 1-based template line that was executing.
        line: usize,
        /// Source lines around `line`, the failing one marked with `>>`.
        context: String,
        source: ScriptError,
    },
}

fn display_path(path: &Option<String>) -> &str {
    path.as_deref().unwrap_or("ejs")
}

impl RenderError {
    /// Filename attributed to a line-mapped failure.
    pub fn path(&self) -> Option<&str> {
        match self {
            RenderError::Template { path, .. } => path.as_deref(),
            _ => None,
        }
    }

    /// Template line of a line-mapped failure.
    pub fn template_line(&self) -> Option<usize> {
        match self {
            RenderError::Template { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Any failure of a one-shot [`render`](crate::render).
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// A filter rejected its input or arguments.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("filter '{filter}' expects {expected}, got {got}")]
    InvalidInput {
        filter: String,
        expected: &'static str,
        got: String,
    },

    #[error("filter '{filter}' argument {index}: {message}")]
    InvalidArgument {
        filter: String,
        index: usize,
        message: String,
    },

    #[error("unknown filter '{name}'")]
    Unknown { name: String },
}
