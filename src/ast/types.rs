//! Abstract Syntax Tree (AST) Types for Bash
//!
//! The parser produces these nodes; the executor walks them. The AST is
//! immutable shared data after parsing - all runtime mutation lives in the
//! execution context.

use std::fmt;

// =============================================================================
// BASE TYPES
// =============================================================================

/// Position information for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Byte span into a word's raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

// =============================================================================
// SCRIPT & COMMANDS
// =============================================================================

/// Root node: a complete script.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub commands: Vec<Node>,
}

/// Union of all executable node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Command(Command),
    Function(Function),
    If(If),
    While(Loop),
    Until(Loop),
    For(For),
    Case(Case),
    Subshell(Subshell),
    Pipeline(Pipeline),
    Logical(Logical),
    CompoundList(CompoundList),
    ArithmeticCommand(ArithmeticCommand),
    ConditionalCommand(ConditionalCommand),
}

/// Simple command: optional name, assignment prefix, word/redirect suffix.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Command name word (None for assignment-only commands)
    pub name: Option<Word>,
    /// Assignment words before the command name: VAR=value cmd
    pub prefix: Vec<Word>,
    /// Argument words and redirections after the name
    pub suffix: Vec<Suffix>,
    /// Run asynchronously (trailing &)
    pub asynchronous: bool,
    /// Negate the exit status (! prefix)
    pub bang: bool,
    /// Source line, for diagnostics
    pub line: Option<usize>,
}

/// A suffix element of a simple command.
#[derive(Debug, Clone, PartialEq)]
pub enum Suffix {
    Word(Word),
    Redirect(Redirect),
}

/// Function definition: name plus unevaluated body.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub body: Box<CompoundList>,
    pub redirections: Vec<Redirect>,
    /// Source text of the whole definition, kept for `declare -f`.
    pub raw: String,
}

/// if/elif/else. elif chains are nested If nodes in `else_part`.
#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub clause: Vec<Node>,
    pub then_part: Vec<Node>,
    pub else_part: Option<Vec<Node>>,
}

/// while/until share a shape; the node kind carries the polarity.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub clause: Vec<Node>,
    pub body: Vec<Node>,
}

/// for NAME in WORDS; do ...; done
#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub name: String,
    pub wordlist: Vec<Word>,
    pub body: Vec<Node>,
}

/// case WORD in pattern) ... ;; esac
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub clause: Word,
    pub items: Vec<CaseItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseItem {
    pub patterns: Vec<Word>,
    pub body: Vec<Node>,
}

/// ( list ) - writes must not leak into the enclosing scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Subshell {
    pub list: Vec<Node>,
    pub redirections: Vec<Redirect>,
    pub asynchronous: bool,
}

/// cmd1 | cmd2 | cmd3
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub commands: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// left && right / left || right
#[derive(Debug, Clone, PartialEq)]
pub struct Logical {
    pub op: LogicalOp,
    pub left: Box<Node>,
    pub right: Box<Node>,
}

/// { list; } with optional redirections; also used for function bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundList {
    pub commands: Vec<Node>,
    pub redirections: Vec<Redirect>,
}

/// (( expr ))
#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticCommand {
    pub expression: ArithExpr,
    pub raw: String,
}

/// [[ expr ]]
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalCommand {
    pub expression: CondExpr,
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOp {
    /// <
    Read,
    /// > (and >| which behaves the same here)
    Write,
    /// >>
    Append,
    /// N>&M - duplicate endpoint M onto N
    DupOut,
    /// &> - both stdout and stderr
    WriteBoth,
    /// &>> - both, appending
    AppendBoth,
}

impl fmt::Display for RedirectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "<"),
            Self::Write => write!(f, ">"),
            Self::Append => write!(f, ">>"),
            Self::DupOut => write!(f, ">&"),
            Self::WriteBoth => write!(f, "&>"),
            Self::AppendBoth => write!(f, "&>>"),
        }
    }
}

/// I/O redirection descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    /// Explicit file descriptor (defaults depend on the operator)
    pub fd: Option<i32>,
    pub op: RedirectOp,
    /// Target path word, or for DupOut the source descriptor digit
    pub target: Word,
}

// =============================================================================
// WORDS
// =============================================================================

/// A word carries its raw text (quotes included) plus the expansions the
/// parser found, each tagged with a byte span into that text.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub expansions: Vec<Expansion>,
}

impl Word {
    pub fn literal(text: impl Into<String>) -> Self {
        Self { text: text.into(), expansions: Vec::new() }
    }

    /// True if the word is bare text with no expansions recorded.
    pub fn is_bare(&self) -> bool {
        self.expansions.is_empty()
    }

    pub fn has_path_expansion(&self) -> bool {
        self.expansions
            .iter()
            .any(|e| !e.resolved && matches!(e.kind, ExpansionKind::Path { .. }))
    }
}

/// One expansion marker inside a word.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub kind: ExpansionKind,
    /// Span into the word's raw text that this expansion replaces
    pub span: Span,
    /// Set by the parser for expansions that need no runtime resolution
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpansionKind {
    /// $name, ${name} and special parameters
    Parameter { name: String },
    /// $(script) or `script`
    Command { script: Script },
    /// $((expr))
    Arithmetic { expression: ArithExpr },
    /// Unquoted glob characters; resolution is deferred to the host
    Path { pattern: String },
}

// =============================================================================
// ARITHMETIC EXPRESSIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ArithExpr {
    Number(i64),
    Identifier(String),
    Unary {
        op: ArithUnaryOp,
        operand: Box<ArithExpr>,
    },
    Binary {
        op: ArithBinaryOp,
        left: Box<ArithExpr>,
        right: Box<ArithExpr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<ArithExpr>,
        right: Box<ArithExpr>,
    },
    Conditional {
        cond: Box<ArithExpr>,
        then: Box<ArithExpr>,
        otherwise: Box<ArithExpr>,
    },
    /// Comma-separated sequence; value is the last element's
    Sequence(Vec<ArithExpr>),
    Assignment {
        op: ArithAssignOp,
        name: String,
        value: Box<ArithExpr>,
    },
    /// ++x, x++, --x, x--
    Update {
        increment: bool,
        name: String,
        prefix: bool,
    },
    /// $(cmd) embedded in an arithmetic expression
    CommandSubstitution { script: Script },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithUnaryOp {
    Minus,
    Plus,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithAssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl fmt::Display for ArithBinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// CONDITIONAL EXPRESSIONS (for [[ ]])
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum CondExpr {
    Word(Word),
    Negation(Box<CondExpr>),
    Logical {
        op: LogicalOp,
        left: Box<CondExpr>,
        right: Box<CondExpr>,
    },
    Unary {
        op: CondUnaryOp,
        operand: Word,
    },
    Binary {
        op: CondBinaryOp,
        left: Word,
        right: Word,
    },
}

/// Unary operators inside [[ ]]. Most delegate to the host's path tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondUnaryOp {
    /// -z: string is empty
    StringEmpty,
    /// -n: string is non-empty
    StringNonEmpty,
    /// -v: variable is bound
    VarSet,
    /// -e / -a
    Exists,
    /// -f
    RegularFile,
    /// -d
    Directory,
    /// -r
    Readable,
    /// -w
    Writable,
    /// -x
    Executable,
    /// -s
    NonEmpty,
    /// -L / -h
    Symlink,
    /// -b
    BlockDevice,
    /// -c
    CharDevice,
    /// -p
    NamedPipe,
    /// -S
    Socket,
    /// -g
    Setgid,
    /// -u
    Setuid,
    /// -k
    Sticky,
    /// -O
    OwnedByEuid,
    /// -G
    OwnedByEgid,
    /// -N
    ModifiedSinceRead,
    /// -t
    FdIsTerminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondBinaryOp {
    /// == or = : glob pattern match, right side is the pattern
    Match,
    /// != : inverse pattern match
    NotMatch,
    /// =~ : POSIX extended regex match
    Regex,
    /// < : lexicographic
    StringLt,
    /// > : lexicographic
    StringGt,
    NumEq,
    NumNe,
    NumLt,
    NumLe,
    NumGt,
    NumGe,
    /// -nt
    NewerThan,
    /// -ot
    OlderThan,
    /// -ef
    SameFile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_literal() {
        let w = Word::literal("hello");
        assert_eq!(w.text, "hello");
        assert!(w.is_bare());
        assert!(!w.has_path_expansion());
    }

    #[test]
    fn test_word_path_expansion() {
        let w = Word {
            text: "*.txt".to_string(),
            expansions: vec![Expansion {
                kind: ExpansionKind::Path { pattern: "*.txt".to_string() },
                span: Span::new(0, 5),
                resolved: false,
            }],
        };
        assert!(w.has_path_expansion());
        assert!(!w.is_bare());
    }

    #[test]
    fn test_redirect_op_display() {
        assert_eq!(RedirectOp::Read.to_string(), "<");
        assert_eq!(RedirectOp::Append.to_string(), ">>");
        assert_eq!(RedirectOp::WriteBoth.to_string(), "&>");
    }
}
