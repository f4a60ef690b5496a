//! Parser Types
//!
//! The parse error carries the full source text and a resolved line/column
//! so callers can render a contextual snippet.

use thiserror::Error;

/// Syntax error with source location.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("syntax error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    /// Full source text, kept for snippet rendering.
    pub source_text: String,
}

impl ParseError {
    /// Build an error from a byte offset, computing row and column by a
    /// linear scan of the source.
    pub fn at_offset(message: impl Into<String>, source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let mut line = 1;
        let mut column = 1;
        for (i, c) in source.char_indices() {
            if i >= offset {
                break;
            }
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self {
            message: message.into(),
            offset,
            line,
            column,
            source_text: source.to_string(),
        }
    }

    /// Render the offending source line with a caret under the error column.
    pub fn snippet(&self) -> String {
        let line_text = self
            .source_text
            .lines()
            .nth(self.line.saturating_sub(1))
            .unwrap_or("");
        let mut out = String::new();
        out.push_str(&format!("{:>4} | {}\n", self.line, line_text));
        out.push_str(&format!(
            "     | {}^\n",
            " ".repeat(self.column.saturating_sub(1))
        ));
        out
    }
}
