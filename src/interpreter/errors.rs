//! Executor Errors & Control-Flow Signals
//!
//! Control flow (break, continue, return, exit) travels the same channel as
//! real errors: executor functions return `Result<i32, ExecError>` and the
//! designated frame (loop, function, script) unwraps its own signal.
//! Structural errors propagate to the top-level `execute` call untouched.

use thiserror::Error;

use crate::context::ContextError;
use crate::host::HostError;
use crate::parser::ParseError;

#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// break - exits the nearest enclosing loop
    #[error("break")]
    Break,

    /// continue - restarts the nearest enclosing loop clause
    #[error("continue")]
    Continue,

    /// return N - unwrapped by the enclosing function (or `source`)
    #[error("return {0}")]
    Return(i32),

    /// exit N - terminates the whole script
    #[error("exit {0}")]
    Exit(i32),

    /// Syntax error from the parser collaborator
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// Unknown AST node kind reached the dispatcher
    #[error("unsupported AST node kind `{kind}`")]
    UnsupportedNode { kind: String },

    /// Operator the evaluators do not implement
    #[error("unsupported operator `{token}`")]
    UnsupportedOperator { token: String },

    /// Arithmetic node kind the evaluator does not implement
    #[error("unsupported arithmetic expression `{token}`")]
    UnsupportedArithmetic { token: String },

    /// Context mutation failure (readonly rebind)
    #[error("{0}")]
    Context(#[from] ContextError),

    /// Infrastructure failure from the host facade
    #[error("{0}")]
    Host(#[from] HostError),
}

impl ExecError {
    /// True for the in-band control-flow signals, which are not errors.
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            ExecError::Break | ExecError::Continue | ExecError::Return(_) | ExecError::Exit(_)
        )
    }
}

/// Clamp an exit status to bash's modulo-256 convention.
/// `exit 256` becomes 0, `exit -1` becomes 255.
pub fn clamp_exit_code(code: i64) -> i32 {
    (code.rem_euclid(256)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_exit_code() {
        assert_eq!(clamp_exit_code(0), 0);
        assert_eq!(clamp_exit_code(42), 42);
        assert_eq!(clamp_exit_code(256), 0);
        assert_eq!(clamp_exit_code(257), 1);
        assert_eq!(clamp_exit_code(-1), 255);
        assert_eq!(clamp_exit_code(511), 255);
    }

    #[test]
    fn test_is_control_flow() {
        assert!(ExecError::Break.is_control_flow());
        assert!(ExecError::Exit(3).is_control_flow());
        assert!(!ExecError::UnsupportedNode { kind: "X".into() }.is_control_flow());
    }
}
