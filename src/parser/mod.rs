//! Parser module for bash scripts
//!
//! A recursive-descent parser producing the AST the executor consumes.
//! The cursor works on raw bytes of the source; words keep their raw text
//! (quotes included) with expansions recorded as byte spans into it, so the
//! expansion engine can splice values and unquote in one pass.

pub mod arithmetic_parser;
pub mod conditional_parser;
pub mod lexer;
pub mod parser;
pub mod types;
pub mod word_parser;

pub use arithmetic_parser::parse_arithmetic;
pub use types::ParseError;

use crate::ast::types::Script;

/// Parse a complete script.
pub fn parse(source: &str) -> Result<Script, ParseError> {
    let mut parser = parser::Parser::new(source);
    parser.parse_script()
}
