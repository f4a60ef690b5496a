//! Recursive Descent Parser for Bash Scripts
//!
//! Grammar entry points: script -> list -> and_or -> pipeline -> command.
//! Compound commands (if/while/until/for/case, subshells, brace groups,
//! `(( ))`, `[[ ]]`) and function definitions dispatch from
//! `parse_command`; everything else is a simple command.

use crate::ast::types::*;

use super::lexer::is_word_terminator;
use super::types::ParseError;

pub struct Parser<'a> {
    pub(crate) src: &'a str,
    pub(crate) pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub fn parse_script(&mut self) -> Result<Script, ParseError> {
        let commands = self.parse_list(&[])?;
        self.skip_list_separators();
        if !self.at_end() {
            let token = self.peek_word_raw().unwrap_or_else(|| {
                self.peek().map(|c| c.to_string()).unwrap_or_default()
            });
            return Err(self.error(format!("unexpected token `{}'", token)));
        }
        Ok(Script { commands })
    }

    /// Parse a command list until EOF, a stop keyword, `)` or `;;`.
    pub(crate) fn parse_list(&mut self, stops: &[&str]) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            self.skip_list_separators();
            if self.at_end() || self.peek() == Some(')') || self.starts_with(";;") {
                break;
            }
            if let Some(word) = self.peek_word_raw() {
                if stops.contains(&word.as_str()) {
                    break;
                }
            }
            let node = self.parse_and_or()?;
            nodes.push(node);

            self.skip_blanks();
            match self.peek() {
                Some(';') if !self.starts_with(";;") => {
                    self.bump();
                }
                Some('&') if !self.starts_with("&&") && !self.starts_with("&>") => {
                    self.bump();
                    if let Some(last) = nodes.last_mut() {
                        mark_async(last);
                    }
                }
                Some('\n') => {
                    self.bump();
                }
                _ => {}
            }
        }
        Ok(nodes)
    }

    fn parse_and_or(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_pipeline()?;
        loop {
            self.skip_blanks();
            let op = if self.starts_with("&&") {
                self.eat_str("&&");
                LogicalOp::And
            } else if self.starts_with("||") {
                self.eat_str("||");
                LogicalOp::Or
            } else {
                break;
            };
            self.skip_list_separators();
            let right = self.parse_pipeline()?;
            left = Node::Logical(Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_pipeline(&mut self) -> Result<Node, ParseError> {
        self.skip_blanks();
        let bang = if self.peek_reserved("!") {
            self.bump();
            true
        } else {
            false
        };

        let mut commands = vec![self.parse_command()?];
        loop {
            self.skip_blanks();
            if self.peek() == Some('|') && !self.starts_with("||") {
                self.bump();
                self.skip_list_separators();
                commands.push(self.parse_command()?);
            } else {
                break;
            }
        }

        if bang {
            // Negation applies to the pipeline's final status, which is the
            // last stage's.
            match commands.last_mut() {
                Some(Node::Command(cmd)) => cmd.bang = true,
                _ => return Err(self.error("`!' must precede a simple command")),
            }
        }

        if commands.len() == 1 {
            Ok(commands.pop().unwrap())
        } else {
            Ok(Node::Pipeline(Pipeline { commands }))
        }
    }

    fn parse_command(&mut self) -> Result<Node, ParseError> {
        self.skip_blanks();
        if self.starts_with("((") {
            return self.parse_arithmetic_command();
        }
        if self.peek() == Some('(') {
            return self.parse_subshell();
        }
        if let Some(word) = self.peek_word_raw() {
            match word.as_str() {
                "[[" => return self.parse_conditional_command(),
                "if" => return self.parse_if_command(),
                "while" => return self.parse_loop_command(true),
                "until" => return self.parse_loop_command(false),
                "for" => return self.parse_for_command(),
                "case" => return self.parse_case_command(),
                "function" => return self.parse_function_keyword(),
                "{" => return self.parse_brace_group(),
                "}" | "then" | "elif" | "else" | "fi" | "do" | "done" | "esac" | "in" => {
                    return Err(self.error(format!("unexpected token `{}'", word)));
                }
                _ => {}
            }
        }
        self.parse_simple_command()
    }

    // ------------------------------------------------------------------
    // Compound commands
    // ------------------------------------------------------------------

    fn parse_subshell(&mut self) -> Result<Node, ParseError> {
        self.bump(); // (
        let list = self.parse_list(&[])?;
        self.skip_list_separators();
        if self.peek() != Some(')') {
            return Err(self.error("expected `)'"));
        }
        self.bump();
        let redirections = self.parse_trailing_redirects()?;
        Ok(Node::Subshell(Subshell {
            list,
            redirections,
            asynchronous: false,
        }))
    }

    fn parse_brace_group(&mut self) -> Result<Node, ParseError> {
        self.pos += 1; // {
        let commands = self.parse_list(&["}"])?;
        self.expect_reserved("}")?;
        let redirections = self.parse_trailing_redirects()?;
        Ok(Node::CompoundList(CompoundList {
            commands,
            redirections,
        }))
    }

    fn parse_if_command(&mut self) -> Result<Node, ParseError> {
        self.pos += 2; // if
        let node = self.parse_if_tail()?;
        Ok(Node::If(node))
    }

    /// Parse from just after `if`/`elif` through the terminating `fi`.
    fn parse_if_tail(&mut self) -> Result<If, ParseError> {
        let clause = self.parse_list(&["then"])?;
        if clause.is_empty() {
            return Err(self.error("expected condition before `then'"));
        }
        self.expect_reserved("then")?;
        let then_part = self.parse_list(&["elif", "else", "fi"])?;
        self.skip_list_separators();

        if self.peek_reserved("elif") {
            self.pos += 4;
            let nested = self.parse_if_tail()?;
            return Ok(If {
                clause,
                then_part,
                else_part: Some(vec![Node::If(nested)]),
            });
        }

        let else_part = if self.peek_reserved("else") {
            self.pos += 4;
            let body = self.parse_list(&["fi"])?;
            Some(body)
        } else {
            None
        };
        self.expect_reserved("fi")?;
        Ok(If {
            clause,
            then_part,
            else_part,
        })
    }

    fn parse_loop_command(&mut self, is_while: bool) -> Result<Node, ParseError> {
        self.pos += 5; // while / until
        let clause = self.parse_list(&["do"])?;
        if clause.is_empty() {
            return Err(self.error("expected condition before `do'"));
        }
        self.expect_reserved("do")?;
        let body = self.parse_list(&["done"])?;
        self.expect_reserved("done")?;
        let node = Loop { clause, body };
        Ok(if is_while {
            Node::While(node)
        } else {
            Node::Until(node)
        })
    }

    fn parse_for_command(&mut self) -> Result<Node, ParseError> {
        self.pos += 3; // for
        self.skip_blanks();
        let name = self.take_word_raw()?;
        if !is_identifier(&name) {
            return Err(self.error(format!("`{}' is not a valid loop variable", name)));
        }

        self.skip_blanks();
        let wordlist = if self.peek_reserved("in") {
            self.pos += 2;
            let mut words = Vec::new();
            loop {
                self.skip_blanks();
                match self.peek() {
                    None | Some(';') | Some('\n') => break,
                    _ => words.push(self.parse_word()?),
                }
            }
            words
        } else {
            // No wordlist: iterate the positional parameters.
            vec![Word {
                text: "$@".to_string(),
                expansions: vec![Expansion {
                    kind: ExpansionKind::Parameter { name: "@".to_string() },
                    span: Span::new(0, 2),
                    resolved: false,
                }],
            }]
        };

        self.expect_reserved("do")?;
        let body = self.parse_list(&["done"])?;
        self.expect_reserved("done")?;
        Ok(Node::For(For {
            name,
            wordlist,
            body,
        }))
    }

    fn parse_case_command(&mut self) -> Result<Node, ParseError> {
        self.pos += 4; // case
        self.skip_blanks();
        let clause = self.parse_word()?;
        self.expect_reserved("in")?;

        let mut items = Vec::new();
        loop {
            self.skip_list_separators();
            if self.peek_reserved("esac") {
                self.pos += 4;
                break;
            }
            if self.at_end() {
                return Err(self.error("expected `esac'"));
            }
            if self.peek() == Some('(') {
                self.bump();
                self.skip_blanks();
            }
            let mut patterns = vec![self.parse_word()?];
            loop {
                self.skip_blanks();
                if self.peek() == Some('|') && !self.starts_with("||") {
                    self.bump();
                    self.skip_blanks();
                    patterns.push(self.parse_word()?);
                } else {
                    break;
                }
            }
            self.skip_blanks();
            if self.peek() != Some(')') {
                return Err(self.error("expected `)' after case pattern"));
            }
            self.bump();

            let body = self.parse_list(&["esac"])?;
            items.push(CaseItem { patterns, body });

            self.skip_blanks();
            if self.starts_with(";;") {
                self.pos += 2;
                // Accept the bash 4 terminators ;;& and ;& spellings.
                if self.peek() == Some('&') {
                    self.bump();
                }
            }
        }
        Ok(Node::Case(Case { clause, items }))
    }

    fn parse_arithmetic_command(&mut self) -> Result<Node, ParseError> {
        self.pos += 2; // ((
        let raw = self.scan_double_paren()?;
        let expression = super::arithmetic_parser::parse_arithmetic(&raw)
            .map_err(|e| self.error(e.message))?;
        Ok(Node::ArithmeticCommand(ArithmeticCommand {
            expression,
            raw,
        }))
    }

    fn parse_conditional_command(&mut self) -> Result<Node, ParseError> {
        self.pos += 2; // [[
        let expression = self.parse_conditional_expression()?;
        Ok(Node::ConditionalCommand(ConditionalCommand { expression }))
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn parse_function_keyword(&mut self) -> Result<Node, ParseError> {
        let start = self.pos;
        self.pos += 8; // function
        self.skip_blanks();
        let name = self.take_word_raw()?;
        self.skip_blanks();
        self.eat_str("()");
        self.parse_function_body(name, start)
    }

    fn parse_function_body(&mut self, name: String, start: usize) -> Result<Node, ParseError> {
        self.skip_list_separators();
        let body_node = self.parse_command()?;
        let body = match body_node {
            Node::CompoundList(list) => list,
            other => CompoundList {
                commands: vec![other],
                redirections: vec![],
            },
        };
        let redirections = self.parse_trailing_redirects()?;
        let raw = self.src[start..self.pos].trim().to_string();
        Ok(Node::Function(Function {
            name,
            body: Box::new(body),
            redirections,
            raw,
        }))
    }

    // ------------------------------------------------------------------
    // Simple commands
    // ------------------------------------------------------------------

    fn parse_simple_command(&mut self) -> Result<Node, ParseError> {
        let mut prefix: Vec<Word> = Vec::new();
        let mut name: Option<Word> = None;
        let mut suffix: Vec<Suffix> = Vec::new();
        let line = self.current_line();
        let start = self.pos;

        loop {
            self.skip_blanks();
            match self.peek() {
                None | Some('\n') | Some(';') | Some(')') | Some('|') => break,
                Some('&') if !self.starts_with("&>") => break,
                Some('<') | Some('>') => {
                    suffix.push(Suffix::Redirect(self.parse_redirect(None)?));
                }
                Some('&') => {
                    suffix.push(Suffix::Redirect(self.parse_redirect(None)?));
                }
                Some('(') => {
                    return Err(self.error("unexpected token `('"));
                }
                Some(c) if c.is_ascii_digit() && self.digits_then_redirect() => {
                    let fd = self.take_fd_digits();
                    suffix.push(Suffix::Redirect(self.parse_redirect(Some(fd))?));
                }
                Some(_) => {
                    let word = self.parse_word()?;
                    if name.is_none() && suffix.is_empty() && is_assignment_word(&word) {
                        prefix.push(word);
                    } else if name.is_none() {
                        // Function definition lookahead: NAME ()
                        if word.is_bare() && is_identifier(&word.text) {
                            self.skip_blanks();
                            if self.starts_with("()") {
                                self.pos += 2;
                                return self.parse_function_body(word.text, start);
                            }
                        }
                        name = Some(word);
                    } else {
                        suffix.push(Suffix::Word(word));
                    }
                }
            }
        }

        if name.is_none() && prefix.is_empty() && suffix.is_empty() {
            return Err(self.error("expected command"));
        }

        Ok(Node::Command(Command {
            name,
            prefix,
            suffix,
            asynchronous: false,
            bang: false,
            line: Some(line),
        }))
    }

    fn current_line(&self) -> usize {
        self.src[..self.pos].bytes().filter(|&b| b == b'\n').count() + 1
    }

    /// True when the cursor sits on digits directly followed by `<` or `>`.
    fn digits_then_redirect(&self) -> bool {
        let rest = &self.src[self.pos..];
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        digits > 0
            && matches!(
                rest.chars().nth(digits),
                Some('<') | Some('>')
            )
    }

    fn take_fd_digits(&mut self) -> i32 {
        let mut n = 0i32;
        while let Some(c) = self.peek() {
            if let Some(d) = c.to_digit(10) {
                n = n * 10 + d as i32;
                self.bump();
            } else {
                break;
            }
        }
        n
    }

    // ------------------------------------------------------------------
    // Redirections
    // ------------------------------------------------------------------

    fn parse_redirect(&mut self, fd: Option<i32>) -> Result<Redirect, ParseError> {
        if self.starts_with("<<") {
            return Err(self.error("here-documents are not supported"));
        }

        let op = if self.eat_str("&>>") {
            RedirectOp::AppendBoth
        } else if self.eat_str("&>") {
            RedirectOp::WriteBoth
        } else if self.eat_str(">>") {
            RedirectOp::Append
        } else if self.eat_str(">&") {
            RedirectOp::DupOut
        } else if self.eat_str(">|") {
            RedirectOp::Write
        } else if self.eat_str(">") {
            RedirectOp::Write
        } else if self.eat_str("<") {
            RedirectOp::Read
        } else {
            return Err(self.error("expected redirection operator"));
        };

        self.skip_blanks();
        if self.at_end() || matches!(self.peek(), Some(c) if is_word_terminator(c)) {
            return Err(self.error("expected redirection target"));
        }
        let target = self.parse_word()?;

        // `>& word` with a non-numeric target writes both streams to it.
        let op = if op == RedirectOp::DupOut
            && !(target.is_bare() && target.text.chars().all(|c| c.is_ascii_digit()))
        {
            RedirectOp::WriteBoth
        } else {
            op
        };

        Ok(Redirect { fd, op, target })
    }

    pub(crate) fn parse_trailing_redirects(&mut self) -> Result<Vec<Redirect>, ParseError> {
        let mut redirects = Vec::new();
        loop {
            self.skip_blanks();
            match self.peek() {
                Some('<') | Some('>') => redirects.push(self.parse_redirect(None)?),
                Some('&') if self.starts_with("&>") => {
                    redirects.push(self.parse_redirect(None)?)
                }
                Some(c) if c.is_ascii_digit() && self.digits_then_redirect() => {
                    let fd = self.take_fd_digits();
                    redirects.push(self.parse_redirect(Some(fd))?);
                }
                _ => break,
            }
        }
        Ok(redirects)
    }
}

fn mark_async(node: &mut Node) {
    match node {
        Node::Command(c) => c.asynchronous = true,
        Node::Subshell(s) => s.asynchronous = true,
        Node::Logical(l) => mark_async(&mut l.right),
        Node::Pipeline(p) => {
            if let Some(last) = p.commands.last_mut() {
                mark_async(last);
            }
        }
        _ => {}
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// NAME=... with a well-formed name before the first `=`.
fn is_assignment_word(word: &Word) -> bool {
    match word.text.find('=') {
        Some(pos) if pos > 0 => {
            // The `=` must come before any expansion starts. Whole-word
            // path markers do not disqualify an assignment.
            let blocked = word.expansions.iter().any(|e| {
                e.span.start < pos && !matches!(e.kind, ExpansionKind::Path { .. })
            });
            if blocked {
                return false;
            }
            is_identifier(&word.text[..pos])
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("foo"));
        assert!(is_identifier("_bar1"));
        assert!(!is_identifier("1foo"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_is_assignment_word() {
        assert!(is_assignment_word(&Word::literal("X=1")));
        assert!(is_assignment_word(&Word::literal("_a=")));
        assert!(!is_assignment_word(&Word::literal("=x")));
        assert!(!is_assignment_word(&Word::literal("1x=2")));
        assert!(!is_assignment_word(&Word::literal("noequals")));
    }
}
