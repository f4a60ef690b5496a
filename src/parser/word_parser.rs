//! Word Parsing
//!
//! Scans one shell word, keeping the raw text (quotes and escapes intact)
//! and recording every expansion with its byte span into that text. The
//! expansion engine later splices resolved values into the raw text and
//! unquotes in a single pass.

use crate::ast::types::{Expansion, ExpansionKind, Span, Word};

use super::lexer::is_word_terminator;
use super::parser::Parser;
use super::types::ParseError;

impl<'a> Parser<'a> {
    /// Parse one word. The cursor must sit on its first character.
    pub(crate) fn parse_word(&mut self) -> Result<Word, ParseError> {
        self.parse_word_with(false)
    }

    /// Conditional-expression variant: only whitespace terminates, and no
    /// path expansion is recorded ([[ ]] does no globbing).
    pub(crate) fn parse_cond_word(&mut self) -> Result<Word, ParseError> {
        self.parse_word_with(true)
    }

    fn parse_word_with(&mut self, conditional: bool) -> Result<Word, ParseError> {
        let mut text = String::new();
        let mut expansions: Vec<Expansion> = Vec::new();
        let mut has_glob = false;

        loop {
            let Some(c) = self.peek() else { break };
            let terminated = if conditional {
                matches!(c, ' ' | '\t' | '\n')
            } else {
                is_word_terminator(c)
            };
            if terminated {
                break;
            }
            match c {
                '\'' => self.scan_single_quoted(&mut text)?,
                '"' => self.scan_double_quoted(&mut text, &mut expansions)?,
                '\\' => {
                    text.push('\\');
                    self.bump();
                    if let Some(escaped) = self.bump() {
                        text.push(escaped);
                    }
                }
                '$' => self.scan_dollar(&mut text, &mut expansions)?,
                '`' => self.scan_backtick(&mut text, &mut expansions)?,
                c => {
                    if !conditional && matches!(c, '*' | '?' | '[') {
                        has_glob = true;
                    }
                    text.push(c);
                    self.bump();
                }
            }
        }

        if text.is_empty() && expansions.is_empty() {
            return Err(self.error("expected word"));
        }

        if has_glob {
            let len = text.len();
            expansions.push(Expansion {
                kind: ExpansionKind::Path { pattern: text.clone() },
                span: Span::new(0, len),
                resolved: false,
            });
        }

        Ok(Word { text, expansions })
    }

    fn scan_single_quoted(&mut self, text: &mut String) -> Result<(), ParseError> {
        let start = self.pos;
        text.push('\'');
        self.bump();
        loop {
            match self.bump() {
                Some('\'') => {
                    text.push('\'');
                    return Ok(());
                }
                Some(c) => text.push(c),
                None => {
                    return Err(ParseError::at_offset(
                        "unterminated single quote",
                        self.src,
                        start,
                    ))
                }
            }
        }
    }

    pub(crate) fn scan_double_quoted(
        &mut self,
        text: &mut String,
        expansions: &mut Vec<Expansion>,
    ) -> Result<(), ParseError> {
        let start = self.pos;
        text.push('"');
        self.bump();
        loop {
            match self.peek() {
                Some('"') => {
                    text.push('"');
                    self.bump();
                    return Ok(());
                }
                Some('\\') => {
                    text.push('\\');
                    self.bump();
                    if let Some(c) = self.bump() {
                        text.push(c);
                    }
                }
                Some('$') => self.scan_dollar(text, expansions)?,
                Some('`') => self.scan_backtick(text, expansions)?,
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
                None => {
                    return Err(ParseError::at_offset(
                        "unterminated double quote",
                        self.src,
                        start,
                    ))
                }
            }
        }
    }

    /// Scan a `$`-introduced expansion, appending its raw text and
    /// recording the expansion span.
    fn scan_dollar(
        &mut self,
        text: &mut String,
        expansions: &mut Vec<Expansion>,
    ) -> Result<(), ParseError> {
        let span_start = text.len();
        self.bump(); // $

        // $(( expr ))
        if self.starts_with("((") {
            self.pos += 2;
            let raw = self.scan_double_paren()?;
            let expression = super::arithmetic_parser::parse_arithmetic(&raw)
                .map_err(|e| self.error(e.message))?;
            text.push_str("$((");
            text.push_str(&raw);
            text.push_str("))");
            expansions.push(Expansion {
                kind: ExpansionKind::Arithmetic { expression },
                span: Span::new(span_start, text.len()),
                resolved: false,
            });
            return Ok(());
        }

        // $( script )
        if self.peek() == Some('(') {
            self.bump();
            let raw = self.scan_balanced_parens()?;
            let script = super::parse(&raw)?;
            text.push_str("$(");
            text.push_str(&raw);
            text.push(')');
            expansions.push(Expansion {
                kind: ExpansionKind::Command { script },
                span: Span::new(span_start, text.len()),
                resolved: false,
            });
            return Ok(());
        }

        // ${name}
        if self.peek() == Some('{') {
            let brace_start = self.pos;
            self.bump();
            let mut name = String::new();
            loop {
                match self.bump() {
                    Some('}') => break,
                    Some(c) => name.push(c),
                    None => {
                        return Err(ParseError::at_offset(
                            "unterminated `${'",
                            self.src,
                            brace_start,
                        ))
                    }
                }
            }
            text.push_str("${");
            text.push_str(&name);
            text.push('}');
            expansions.push(Expansion {
                kind: ExpansionKind::Parameter { name },
                span: Span::new(span_start, text.len()),
                resolved: false,
            });
            return Ok(());
        }

        // Special single-character parameters.
        if let Some(c) = self.peek() {
            if matches!(c, '?' | '#' | '@' | '*' | '$' | '!' | '-') || c.is_ascii_digit() {
                self.bump();
                text.push('$');
                text.push(c);
                expansions.push(Expansion {
                    kind: ExpansionKind::Parameter { name: c.to_string() },
                    span: Span::new(span_start, text.len()),
                    resolved: false,
                });
                return Ok(());
            }
        }

        // $name
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                if name.is_empty() && c.is_ascii_digit() {
                    break;
                }
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if name.is_empty() {
            // Bare `$` is literal.
            text.push('$');
            return Ok(());
        }
        text.push('$');
        text.push_str(&name);
        expansions.push(Expansion {
            kind: ExpansionKind::Parameter { name },
            span: Span::new(span_start, text.len()),
            resolved: false,
        });
        Ok(())
    }

    /// Legacy `` `script` `` command substitution.
    fn scan_backtick(
        &mut self,
        text: &mut String,
        expansions: &mut Vec<Expansion>,
    ) -> Result<(), ParseError> {
        let span_start = text.len();
        let start = self.pos;
        self.bump(); // `
        let mut raw = String::new();
        loop {
            match self.bump() {
                Some('\\') => {
                    // Inside backticks, \` is a literal backtick.
                    match self.bump() {
                        Some('`') => raw.push('`'),
                        Some(c) => {
                            raw.push('\\');
                            raw.push(c);
                        }
                        None => {
                            return Err(ParseError::at_offset(
                                "unterminated backquote",
                                self.src,
                                start,
                            ))
                        }
                    }
                }
                Some('`') => break,
                Some(c) => raw.push(c),
                None => {
                    return Err(ParseError::at_offset(
                        "unterminated backquote",
                        self.src,
                        start,
                    ))
                }
            }
        }
        let script = super::parse(&raw)?;
        text.push('`');
        text.push_str(&raw);
        text.push('`');
        expansions.push(Expansion {
            kind: ExpansionKind::Command { script },
            span: Span::new(span_start, text.len()),
            resolved: false,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_of(src: &str) -> Word {
        let mut p = Parser::new(src);
        p.parse_word().unwrap()
    }

    #[test]
    fn test_plain_word() {
        let w = word_of("hello");
        assert_eq!(w.text, "hello");
        assert!(w.expansions.is_empty());
    }

    #[test]
    fn test_single_quoted_kept_raw() {
        let w = word_of("'a b'");
        assert_eq!(w.text, "'a b'");
        assert!(w.expansions.is_empty());
    }

    #[test]
    fn test_parameter_span() {
        let w = word_of("pre$VAR post");
        assert_eq!(w.text, "pre$VAR");
        let e = &w.expansions[0];
        assert_eq!(&w.text[e.span.start..e.span.end], "$VAR");
    }

    #[test]
    fn test_braced_parameter() {
        let w = word_of("${HOME}x");
        assert_eq!(w.text, "${HOME}x");
        match &w.expansions[0].kind {
            ExpansionKind::Parameter { name } => assert_eq!(name, "HOME"),
            other => panic!("expected parameter, got {:?}", other),
        }
        assert_eq!(w.expansions[0].span, Span::new(0, 7));
    }

    #[test]
    fn test_special_parameters() {
        for (src, name) in [("$?", "?"), ("$#", "#"), ("$@", "@"), ("$1", "1")] {
            let w = word_of(src);
            match &w.expansions[0].kind {
                ExpansionKind::Parameter { name: n } => assert_eq!(n, name),
                other => panic!("expected parameter, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_expansion_inside_double_quotes() {
        let w = word_of("\"hi $USER!\"");
        assert_eq!(w.text, "\"hi $USER!\"");
        assert_eq!(w.expansions.len(), 1);
        let e = &w.expansions[0];
        assert_eq!(&w.text[e.span.start..e.span.end], "$USER");
    }

    #[test]
    fn test_command_substitution_word() {
        let w = word_of("$(echo hi)");
        assert!(matches!(w.expansions[0].kind, ExpansionKind::Command { .. }));
        assert_eq!(w.text, "$(echo hi)");
    }

    #[test]
    fn test_backtick_substitution() {
        let w = word_of("`echo hi`");
        assert!(matches!(w.expansions[0].kind, ExpansionKind::Command { .. }));
    }

    #[test]
    fn test_arithmetic_expansion_word() {
        let w = word_of("$((1+2))");
        assert!(matches!(w.expansions[0].kind, ExpansionKind::Arithmetic { .. }));
        assert_eq!(w.text, "$((1+2))");
    }

    #[test]
    fn test_glob_marker_recorded_once() {
        let w = word_of("*.t?t");
        let path_count = w
            .expansions
            .iter()
            .filter(|e| matches!(e.kind, ExpansionKind::Path { .. }))
            .count();
        assert_eq!(path_count, 1);
    }

    #[test]
    fn test_quoted_glob_not_recorded() {
        let w = word_of("\"*.txt\"");
        assert!(!w.has_path_expansion());
    }

    #[test]
    fn test_bare_dollar_is_literal() {
        let w = word_of("a$");
        assert_eq!(w.text, "a$");
        assert!(w.expansions.is_empty());
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        let mut p = Parser::new("'abc");
        assert!(p.parse_word().is_err());
    }
}
