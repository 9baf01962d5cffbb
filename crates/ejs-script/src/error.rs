//! Error types for the scriptlet language.

use thiserror::Error;

/// An error produced while parsing or running a script.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// The script text could not be parsed.
    #[error("SyntaxError: {message} (line {line}, column {column})")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// A value was thrown and never caught.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ScriptError {
    /// Line of the script the error points at.
    pub fn line(&self) -> usize {
        match self {
            ScriptError::Syntax { line, .. } => *line,
            ScriptError::Runtime(err) => err.line,
        }
    }
}

/// An uncaught runtime failure.
///
/// Error objects thrown by scripts are flattened into this shape: `name` and
/// `message` come from the object's properties, and any other string or number
/// properties (for example a `path` set by a rethrow handler) are kept in
/// `properties`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{name}: {message} (line {line})")]
pub struct RuntimeError {
    /// Error class name, e.g. `ReferenceError` or `TypeError`.
    pub name: String,
    /// Human readable message.
    pub message: String,
    /// Script line that was executing when the value was thrown.
    pub line: usize,
    /// Extra properties carried by the thrown object.
    pub properties: Vec<(String, String)>,
}

impl RuntimeError {
    /// Look up an extra property of the thrown object.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
