//! Conditional Expression Parser
//!
//! Parses the body of `[[ ... ]]`: words with expansions, unary string and
//! file tests, binary string/pattern/regex/numeric/file operators, `!`,
//! `&&`, `||` and parenthesized grouping. Tokens must be whitespace
//! delimited, as in bash.

use crate::ast::types::{CondBinaryOp, CondExpr, CondUnaryOp, LogicalOp};

use super::parser::Parser;
use super::types::ParseError;

fn unary_op(token: &str) -> Option<CondUnaryOp> {
    let op = match token {
        "-z" => CondUnaryOp::StringEmpty,
        "-n" => CondUnaryOp::StringNonEmpty,
        "-v" => CondUnaryOp::VarSet,
        "-e" | "-a" => CondUnaryOp::Exists,
        "-f" => CondUnaryOp::RegularFile,
        "-d" => CondUnaryOp::Directory,
        "-r" => CondUnaryOp::Readable,
        "-w" => CondUnaryOp::Writable,
        "-x" => CondUnaryOp::Executable,
        "-s" => CondUnaryOp::NonEmpty,
        "-L" | "-h" => CondUnaryOp::Symlink,
        "-b" => CondUnaryOp::BlockDevice,
        "-c" => CondUnaryOp::CharDevice,
        "-p" => CondUnaryOp::NamedPipe,
        "-S" => CondUnaryOp::Socket,
        "-g" => CondUnaryOp::Setgid,
        "-u" => CondUnaryOp::Setuid,
        "-k" => CondUnaryOp::Sticky,
        "-O" => CondUnaryOp::OwnedByEuid,
        "-G" => CondUnaryOp::OwnedByEgid,
        "-N" => CondUnaryOp::ModifiedSinceRead,
        "-t" => CondUnaryOp::FdIsTerminal,
        _ => return None,
    };
    Some(op)
}

fn binary_op(token: &str) -> Option<CondBinaryOp> {
    let op = match token {
        "==" | "=" => CondBinaryOp::Match,
        "!=" => CondBinaryOp::NotMatch,
        "=~" => CondBinaryOp::Regex,
        "<" => CondBinaryOp::StringLt,
        ">" => CondBinaryOp::StringGt,
        "-eq" => CondBinaryOp::NumEq,
        "-ne" => CondBinaryOp::NumNe,
        "-lt" => CondBinaryOp::NumLt,
        "-le" => CondBinaryOp::NumLe,
        "-gt" => CondBinaryOp::NumGt,
        "-ge" => CondBinaryOp::NumGe,
        "-nt" => CondBinaryOp::NewerThan,
        "-ot" => CondBinaryOp::OlderThan,
        "-ef" => CondBinaryOp::SameFile,
        _ => return None,
    };
    Some(op)
}

impl<'a> Parser<'a> {
    /// Parse from just after `[[` through the closing `]]`.
    pub(crate) fn parse_conditional_expression(&mut self) -> Result<CondExpr, ParseError> {
        let expr = self.parse_cond_or()?;
        self.skip_cond_ws();
        if !self.eat_str("]]") {
            return Err(self.error("expected `]]'"));
        }
        Ok(expr)
    }

    fn skip_cond_ws(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\n') => {
                    self.bump();
                }
                Some('\\') if self.peek_at(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                _ => break,
            }
        }
    }

    /// Peek the raw whitespace-delimited token without consuming.
    fn peek_cond_token(&self) -> Option<String> {
        let rest = &self.src[self.pos..];
        let mut out = String::new();
        for c in rest.chars() {
            if matches!(c, ' ' | '\t' | '\n') {
                break;
            }
            out.push(c);
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    fn parse_cond_or(&mut self) -> Result<CondExpr, ParseError> {
        let mut left = self.parse_cond_and()?;
        loop {
            self.skip_cond_ws();
            if self.peek_cond_token().as_deref() == Some("||") {
                self.pos += 2;
                let right = self.parse_cond_and()?;
                left = CondExpr::Logical {
                    op: LogicalOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                };
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_cond_and(&mut self) -> Result<CondExpr, ParseError> {
        let mut left = self.parse_cond_term()?;
        loop {
            self.skip_cond_ws();
            if self.peek_cond_token().as_deref() == Some("&&") {
                self.pos += 2;
                let right = self.parse_cond_term()?;
                left = CondExpr::Logical {
                    op: LogicalOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                };
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_cond_term(&mut self) -> Result<CondExpr, ParseError> {
        self.skip_cond_ws();
        let token = self
            .peek_cond_token()
            .ok_or_else(|| self.error("expected expression in `[[ ]]'"))?;

        if token == "!" {
            self.pos += 1;
            let operand = self.parse_cond_term()?;
            return Ok(CondExpr::Negation(Box::new(operand)));
        }

        if token == "(" {
            self.pos += 1;
            let inner = self.parse_cond_or()?;
            self.skip_cond_ws();
            if self.peek_cond_token().as_deref() != Some(")") {
                return Err(self.error("expected `)' in `[[ ]]'"));
            }
            self.pos += 1;
            return Ok(inner);
        }

        if let Some(op) = unary_op(&token) {
            self.pos += token.len();
            self.skip_cond_ws();
            if self.peek_cond_token().as_deref() == Some("]]") {
                return Err(self.error(format!("expected operand after `{}'", token)));
            }
            let operand = self.parse_cond_word()?;
            return Ok(CondExpr::Unary { op, operand });
        }

        if token == "]]" {
            return Err(self.error("expected expression in `[[ ]]'"));
        }

        let left = self.parse_cond_word()?;
        self.skip_cond_ws();
        if let Some(next) = self.peek_cond_token() {
            if let Some(op) = binary_op(&next) {
                self.pos += next.len();
                self.skip_cond_ws();
                if self.peek_cond_token().as_deref() == Some("]]") {
                    return Err(self.error(format!("expected operand after `{}'", next)));
                }
                let right = self.parse_cond_word()?;
                return Ok(CondExpr::Binary { op, left, right });
            }
        }
        Ok(CondExpr::Word(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::ast::types::Node;

    fn cond_of(src: &str) -> CondExpr {
        let script = parse(src).unwrap();
        match script.commands.into_iter().next().unwrap() {
            Node::ConditionalCommand(c) => c.expression,
            other => panic!("expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_string_ops() {
        assert!(matches!(
            cond_of("[[ -z $x ]]"),
            CondExpr::Unary { op: CondUnaryOp::StringEmpty, .. }
        ));
        assert!(matches!(
            cond_of("[[ -n hello ]]"),
            CondExpr::Unary { op: CondUnaryOp::StringNonEmpty, .. }
        ));
    }

    #[test]
    fn test_file_test_ops() {
        assert!(matches!(
            cond_of("[[ -f /etc/passwd ]]"),
            CondExpr::Unary { op: CondUnaryOp::RegularFile, .. }
        ));
        assert!(matches!(
            cond_of("[[ -d /tmp ]]"),
            CondExpr::Unary { op: CondUnaryOp::Directory, .. }
        ));
    }

    #[test]
    fn test_binary_pattern_match() {
        match cond_of("[[ $x == a* ]]") {
            CondExpr::Binary { op: CondBinaryOp::Match, right, .. } => {
                assert_eq!(right.text, "a*");
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_regex_op() {
        match cond_of("[[ \"123\" =~ ^[0-9]+$ ]]") {
            CondExpr::Binary { op: CondBinaryOp::Regex, right, .. } => {
                assert_eq!(right.text, "^[0-9]+$");
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_numeric_ops() {
        assert!(matches!(
            cond_of("[[ 3 -lt 5 ]]"),
            CondExpr::Binary { op: CondBinaryOp::NumLt, .. }
        ));
    }

    #[test]
    fn test_logical_and_negation() {
        match cond_of("[[ -n $a && ! -z $b ]]") {
            CondExpr::Logical { op: LogicalOp::And, right, .. } => {
                assert!(matches!(*right, CondExpr::Negation(_)));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_grouping() {
        assert!(matches!(
            cond_of("[[ ( -n $a || -n $b ) && -n $c ]]"),
            CondExpr::Logical { op: LogicalOp::And, .. }
        ));
    }

    #[test]
    fn test_bare_word() {
        assert!(matches!(cond_of("[[ $x ]]"), CondExpr::Word(_)));
    }

    #[test]
    fn test_missing_close_is_error() {
        assert!(parse("[[ -n $x").is_err());
    }
}
