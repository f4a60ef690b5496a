//! Replacement Buffer
//!
//! Tracks a word's original text and the edits recorded against absolute
//! byte spans of that text. Edits are stitched into the output in a single
//! pass, so earlier replacements never shift later spans.

use crate::ast::types::Span;

pub struct ReplaceString<'a> {
    original: &'a str,
    edits: Vec<(Span, String)>,
}

impl<'a> ReplaceString<'a> {
    pub fn new(original: &'a str) -> Self {
        Self {
            original,
            edits: Vec::new(),
        }
    }

    /// Record a replacement for a span of the original text. Spans must not
    /// overlap; the parser emits them in ascending order.
    pub fn replace(&mut self, span: Span, value: impl Into<String>) {
        self.edits.push((span, value.into()));
    }

    /// Stitch the original text and recorded edits into the final string.
    pub fn apply(mut self) -> String {
        self.edits.sort_by_key(|(span, _)| span.start);
        let mut out = String::with_capacity(self.original.len());
        let mut cursor = 0usize;
        for (span, value) in &self.edits {
            if span.start >= cursor && span.start <= self.original.len() {
                out.push_str(&self.original[cursor..span.start]);
                out.push_str(value);
                cursor = span.end.min(self.original.len());
            }
        }
        out.push_str(&self.original[cursor..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_edits() {
        let rs = ReplaceString::new("hello");
        assert_eq!(rs.apply(), "hello");
    }

    #[test]
    fn test_single_edit() {
        let mut rs = ReplaceString::new("pre$VAR post");
        rs.replace(Span::new(3, 7), "value");
        assert_eq!(rs.apply(), "prevalue post");
    }

    #[test]
    fn test_multiple_edits_reference_original_spans() {
        let mut rs = ReplaceString::new("$a-$b");
        rs.replace(Span::new(0, 2), "longer");
        rs.replace(Span::new(3, 5), "x");
        assert_eq!(rs.apply(), "longer-x");
    }

    #[test]
    fn test_out_of_order_edits() {
        let mut rs = ReplaceString::new("$a $b");
        rs.replace(Span::new(3, 5), "two");
        rs.replace(Span::new(0, 2), "one");
        assert_eq!(rs.apply(), "one two");
    }

    #[test]
    fn test_replacement_shorter_and_empty() {
        let mut rs = ReplaceString::new("x$LONGNAME!y");
        rs.replace(Span::new(1, 10), "");
        assert_eq!(rs.apply(), "x!y");
    }
}
