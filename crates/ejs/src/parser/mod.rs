//! Template scanning.

pub mod ast;
mod filter;
mod scanner;

pub use ast::{FilterArg, FilterCall, Segment, SegmentKind};
pub use filter::parse_chain;
pub use scanner::parse_template;
