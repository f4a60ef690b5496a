//! Abstract Syntax Tree (AST) Types for Bash
//!
//! This module defines the AST consumed by the executor. The parser produces
//! these nodes; the interpreter walks them.

pub mod types;
