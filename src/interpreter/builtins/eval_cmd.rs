//! eval - Re-run joined arguments as shell source
//!
//! Arguments are joined with spaces and fed back through the parser and
//! executor against the caller's context, so assignments and function
//! definitions made inside persist. Exit signals raised inside propagate.

use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

pub(crate) async fn run(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let source = args.join(" ");
    if source.trim().is_empty() {
        return Ok(BuiltinOutput::ok());
    }
    let script = match crate::parser::parse(&source) {
        Ok(script) => script,
        Err(e) => {
            return Ok(BuiltinOutput::usage(format!("bash: eval: {}\n", e)));
        }
    };
    let code = exec.run_nodes_script(ctx, &script.commands).await?;
    Ok(BuiltinOutput::code(code))
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
    async fn test_eval_assignment_persists() {
        let (exec, ctx) = make();
        let out = run(&exec, &ctx, &args(&["X=42"])).await.unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(ctx.get_param("X"), Some("42".to_string()));
    }

    #[tokio::test]
    async fn test_eval_joins_arguments() {
        let (exec, ctx) = make();
        run(&exec, &ctx, &args(&["Y=a", ";", "Z=b"])).await.unwrap();
        assert_eq!(ctx.get_param("Y"), Some("a".to_string()));
        assert_eq!(ctx.get_param("Z"), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_eval_empty_is_ok() {
        let (exec, ctx) = make();
        let out = run(&exec, &ctx, &[]).await.unwrap();
        assert_eq!(out.code, 0);
    }

    #[tokio::test]
    async fn test_eval_syntax_error() {
        let (exec, ctx) = make();
        let out = run(&exec, &ctx, &args(&["if", "then"])).await.unwrap();
        assert_eq!(out.code, 2);
        assert!(out.stderr.contains("syntax error"));
    }

    #[tokio::test]
    async fn test_eval_exit_propagates() {
        let (exec, ctx) = make();
        match run(&exec, &ctx, &args(&["exit", "9"])).await {
            Err(ExecError::Exit(9)) => {}
            other => panic!("unexpected: {:?}", other.err()),
        }
    }
}
