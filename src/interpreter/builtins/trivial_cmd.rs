//! : / true / false - constant status builtins

use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

pub(crate) async fn run_colon(
    _exec: &Executor,
    _ctx: &ExecContext,
    _args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    Ok(BuiltinOutput::ok())
}

pub(crate) async fn run_true(
    _exec: &Executor,
    _ctx: &ExecContext,
    _args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    Ok(BuiltinOutput::ok())
}

pub(crate) async fn run_false(
    _exec: &Executor,
    _ctx: &ExecContext,
    _args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    Ok(BuiltinOutput::code(1))
}
