//! let - Evaluate arithmetic expressions
//!
//! Each argument is one expression. Assignments made by `let` land in the
//! exported environment (this builtin's historical variant of the
//! assignment target). Status is 0 iff the last expression is non-zero.

use crate::context::ExecContext;
use crate::interpreter::arithmetic::{self, AssignTarget};
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

pub(crate) async fn run(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    if args.is_empty() {
        return Ok(BuiltinOutput::usage("bash: let: expression expected\n"));
    }

    let mut last = 0i64;
    for arg in args {
        let expr = match crate::parser::parse_arithmetic(arg) {
            Ok(expr) => expr,
            Err(e) => {
                return Ok(BuiltinOutput::failure(format!("bash: let: {}: {}\n", arg, e)));
            }
        };
        last = arithmetic::evaluate(exec, ctx, &expr, AssignTarget::Env).await?;
    }

    Ok(BuiltinOutput::code(if last != 0 { 0 } else { 1 }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryShell;
    use std::rc::Rc;

    fn make() -> (Executor, ExecContext) {
        (
            Executor::new(Rc::new(MemoryShell::new())),
            ExecContext::new_root("/"),
        )
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_let_assigns_into_env() {
        let (exec, ctx) = make();
        let out = run(&exec, &ctx, &args(&["x=2+3"])).await.unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(ctx.get_env("x"), Some("5".to_string()));
    }

    #[tokio::test]
    async fn test_let_status_inverts_zero() {
        let (exec, ctx) = make();
        let out = run(&exec, &ctx, &args(&["0"])).await.unwrap();
        assert_eq!(out.code, 1);
        let out = run(&exec, &ctx, &args(&["7"])).await.unwrap();
        assert_eq!(out.code, 0);
    }

    #[tokio::test]
    async fn test_let_last_expression_wins() {
        let (exec, ctx) = make();
        let out = run(&exec, &ctx, &args(&["1", "0"])).await.unwrap();
        assert_eq!(out.code, 1);
    }

    #[tokio::test]
    async fn test_let_no_args_is_usage_error() {
        let (exec, ctx) = make();
        let out = run(&exec, &ctx, &[]).await.unwrap();
        assert_eq!(out.code, 2);
    }

    #[tokio::test]
    async fn test_let_bad_expression() {
        let (exec, ctx) = make();
        let out = run(&exec, &ctx, &args(&["1 +"])).await.unwrap();
        assert_eq!(out.code, 1);
        assert!(out.stderr.contains("let"));
    }
}
