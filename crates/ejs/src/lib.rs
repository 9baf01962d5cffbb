//! Embedded JavaScript-style templates.
//!
//! Templates mix literal text with tags: `<% code %>` runs a scriptlet,
//! `<%= expr %>` outputs an escaped value, `<%- expr %>` outputs it raw,
//! `<%# ... %>` is a comment and `<%%` writes a literal `<%`. An escaped or
//! raw tag starting with `:` pipes its value through filters, as in
//! `<%=: items | map:"name" | join:", " %>`.
//!
//! ```
//! use ejs::{CompileOptions, locals};
//!
//! let html = ejs::render(
//!     "<% for (const user of users) { %><li><%= user %></li><% } %>",
//!     &locals! { "users" => vec!["tobi", "<loki>"] },
//!     &CompileOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(html, "<li>tobi</li><li>&lt;loki&gt;</li>");
//! ```

pub mod codegen;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod escape;
pub mod filters;
pub mod function;
pub mod options;
pub mod parser;
pub mod template;

pub use engine::{Artifact, Engine};
pub use error::{CompileError, Error, FilterError, RenderError};
pub use escape::escape_html;
pub use filters::{FilterFn, FilterRegistry};
pub use function::FunctionSource;
pub use options::{CompileOptions, Delimiters};
pub use serde_json::Value as JsonValue;
pub use template::{Locals, Template};

pub use ejs_script;

use serde::Serialize;

/// Compile with the default [`Engine`].
pub fn compile(template: &str, options: &CompileOptions) -> Result<Artifact, CompileError> {
    Engine::default().compile(template, options)
}

/// Compile and render with the default [`Engine`].
pub fn render<S: Serialize + ?Sized>(
    template: &str,
    locals: &S,
    options: &CompileOptions,
) -> Result<String, Error> {
    Engine::default().render(template, locals, options)
}

/// Compile to function definition text with the default [`Engine`].
pub fn compile_to_function_string(
    template: &str,
    options: &CompileOptions,
) -> Result<FunctionSource, CompileError> {
    Engine::default().compile_to_function_string(template, options)
}

/// Creates a [`Locals`] map from key-value pairs.
///
/// Values are converted via `Into<JsonValue>`; use `serde_json::json!` for
/// nested objects.
///
/// # Example
///
/// ```
/// use ejs::locals;
///
/// let l = locals! { "count" => 3, "name" => "Alice" };
/// assert_eq!(l.len(), 2);
/// assert_eq!(l["name"], "Alice");
/// ```
#[macro_export]
macro_rules! locals {
    {} => {
        $crate::Locals::new()
    };
    { $($key:expr => $value:expr),+ $(,)? } => {
        {
            let mut map = $crate::Locals::new();
            $(
                map.insert($key.to_string(), ::std::convert::Into::<$crate::JsonValue>::into($value));
            )+
            map
        }
    };
}
