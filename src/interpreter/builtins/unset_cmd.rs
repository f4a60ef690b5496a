//! unset - Remove variables or functions
//!
//! `-v` (default) removes a variable from both params and env; `-f`
//! removes a function. Unsetting an unknown name is a no-op; readonly
//! variables refuse.

use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

pub(crate) async fn run(
    _exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let mut functions = false;
    let mut names: Vec<&String> = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-f" => functions = true,
            "-v" => functions = false,
            _ => names.push(arg),
        }
    }

    let mut stderr = String::new();
    let mut code = 0;
    for name in names {
        if functions {
            ctx.unset_function(name);
            continue;
        }
        if ctx.is_readonly(name) {
            stderr.push_str(&format!("bash: unset: {}: cannot unset: readonly variable\n", name));
            code = 1;
            continue;
        }
        let _ = ctx.set_param(name, None);
        let _ = ctx.set_env(name, None);
    }

    Ok(BuiltinOutput {
        code,
        stdout: String::new(),
        stderr,
    })
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
    async fn test_unset_variable() {
        let (exec, ctx) = make();
        ctx.set_param("X", Some("1".to_string())).unwrap();
        ctx.set_env("X", Some("1".to_string())).unwrap();
        let out = run(&exec, &ctx, &args(&["X"])).await.unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(ctx.get_var("X"), None);
    }

    #[tokio::test]
    async fn test_unset_unknown_is_noop() {
        let (exec, ctx) = make();
        let out = run(&exec, &ctx, &args(&["NOPE"])).await.unwrap();
        assert_eq!(out.code, 0);
        assert!(out.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_unset_readonly_fails() {
        let (exec, ctx) = make();
        ctx.set_param("R", Some("1".to_string())).unwrap();
        ctx.mark_readonly("R");
        let out = run(&exec, &ctx, &args(&["R"])).await.unwrap();
        assert_eq!(out.code, 1);
        assert_eq!(ctx.get_param("R"), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_unset_function() {
        let (exec, ctx) = make();
        let script = crate::parser::parse("f() { echo hi; }").unwrap();
        exec.run_nodes_script(&ctx, &script.commands).await.unwrap();
        assert!(ctx.get_function("f").is_some());
        run(&exec, &ctx, &args(&["-f", "f"])).await.unwrap();
        assert!(ctx.get_function("f").is_none());
    }
}
