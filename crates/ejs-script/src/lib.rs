//! A small dynamic scripting language for template scriptlets.
//!
//! The language covers the subset of JavaScript that templates tend to use:
//! `var`/`let`/`const`, functions and arrows, `if`/`for`/`while`, `try`,
//! `with`, object and array literals, and the common string and array methods.
//!
//! ```
//! use ejs_script::{Interpreter, Value, parse_program};
//!
//! let program = parse_program("var total = 0; for (const n of [1, 2, 3]) total += n; return total;").unwrap();
//! let result = Interpreter::new().run(&program).unwrap();
//! assert_eq!(result.to_string(), "6");
//! # let _ = Value::Undefined;
//! ```

pub mod ast;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
mod stack;
pub mod value;

pub use ast::Program;
pub use error::{RuntimeError, ScriptError};
pub use interpreter::Interpreter;
pub use parser::parse_program;
pub use value::{NativeFunction, Object, Value, format_number, join_values};
