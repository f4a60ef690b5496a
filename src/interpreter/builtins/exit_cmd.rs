//! exit / return - Raise the terminating control-flow signals
//!
//! Both clamp their argument to bash's modulo-256 convention. With no
//! argument the last command's status is used. The signal travels the
//! status channel until its frame unwraps it: the script for exit, the
//! enclosing function (or sourced file) for return.

use crate::context::ExecContext;
use crate::interpreter::errors::{clamp_exit_code, ExecError};
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

fn resolve_code(ctx: &ExecContext, args: &[String]) -> Result<i32, String> {
    match args.first() {
        None => Ok(ctx
            .get_param("?")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)),
        Some(arg) => match arg.parse::<i64>() {
            Ok(n) => Ok(clamp_exit_code(n)),
            Err(_) => Err(arg.clone()),
        },
    }
}

pub(crate) async fn run_exit(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    match resolve_code(ctx, args) {
        Ok(code) => Err(ExecError::Exit(code)),
        Err(arg) => {
            // Bad operand still exits, with status 2.
            exec.emit(
                ctx,
                "",
                &format!("bash: exit: {}: numeric argument required\n", arg),
            )
            .await?;
            Err(ExecError::Exit(2))
        }
    }
}

pub(crate) async fn run_return(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    match resolve_code(ctx, args) {
        Ok(code) => Err(ExecError::Return(code)),
        Err(arg) => {
            exec.emit(
                ctx,
                "",
                &format!("bash: return: {}: numeric argument required\n", arg),
            )
            .await?;
            Err(ExecError::Return(2))
        }
    }
}
