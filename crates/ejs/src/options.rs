//! Compile-time configuration.

use bon::Builder;

use crate::error::CompileError;

/// Default open delimiter.
pub const DEFAULT_OPEN: &str = "<%";
/// Default close delimiter.
pub const DEFAULT_CLOSE: &str = "%>";

/// Options recognized by [`compile`](crate::compile) and friends.
///
/// # Example
///
/// ```
/// use ejs::CompileOptions;
///
/// let options = CompileOptions::builder()
///     .open("{")
///     .close("}")
///     .filename("page.ejs")
///     .build();
/// assert!(options.compile_debug);
/// assert!(!options.client);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct CompileOptions {
    /// Open delimiter; the engine default when unset.
    #[builder(into)]
    pub open: Option<String>,

    /// Close delimiter; the engine default when unset.
    #[builder(into)]
    pub close: Option<String>,

    /// Name reported in diagnostics. Never read from disk.
    #[builder(into)]
    pub filename: Option<String>,

    /// Embed line tracking so runtime failures point at template lines.
    #[builder(default = true)]
    pub compile_debug: bool,

    /// Produce function source text instead of an invocable template.
    #[builder(default)]
    pub client: bool,

    /// Name of the function in source-text output.
    #[builder(into)]
    pub function_name: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions::builder().build()
    }
}

/// A validated open/close delimiter pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    open: String,
    close: String,
}

impl Delimiters {
    /// Both delimiters must be non-empty; they are matched literally.
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Result<Self, CompileError> {
        let open = open.into();
        let close = close.into();
        if open.is_empty() {
            return Err(CompileError::EmptyDelimiter { which: "open" });
        }
        if close.is_empty() {
            return Err(CompileError::EmptyDelimiter { which: "close" });
        }
        Ok(Self { open, close })
    }

    pub fn open(&self) -> &str {
        &self.open
    }

    pub fn close(&self) -> &str {
        &self.close
    }

    /// The text that stands for a literal open delimiter: the open delimiter
    /// followed by its own last character (`<%%` for `<%`).
    pub fn literal_marker(&self) -> String {
        let mut marker = self.open.clone();
        if let Some(last) = self.open.chars().last() {
            marker.push(last);
        }
        marker
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            open: DEFAULT_OPEN.to_string(),
            close: DEFAULT_CLOSE.to_string(),
        }
    }
}
