//! alias / unalias - Manage command aliases

use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

pub(crate) async fn run_alias(
    _exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    if args.is_empty() {
        let mut entries: Vec<(String, String)> = ctx.aliases_all().into_iter().collect();
        entries.sort();
        let stdout: String = entries
            .iter()
            .map(|(name, value)| format!("alias {}='{}'\n", name, value))
            .collect();
        return Ok(BuiltinOutput::stdout(stdout));
    }

    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut code = 0;
    for arg in args {
        match arg.split_once('=') {
            Some((name, value)) => ctx.set_alias(name, value),
            None => match ctx.get_alias(arg) {
                Some(value) => stdout.push_str(&format!("alias {}='{}'\n", arg, value)),
                None => {
                    stderr.push_str(&format!("bash: alias: {}: not found\n", arg));
                    code = 1;
                }
            },
        }
    }

    Ok(BuiltinOutput {
        code,
        stdout,
        stderr,
    })
}

pub(crate) async fn run_unalias(
    _exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    if args.first().map(|s| s.as_str()) == Some("-a") {
        ctx.clear_aliases();
        return Ok(BuiltinOutput::ok());
    }

    let mut stderr = String::new();
    let mut code = 0;
    for name in args {
        if !ctx.unset_alias(name) {
            stderr.push_str(&format!("bash: unalias: {}: not found\n", name));
            code = 1;
        }
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
    async fn test_alias_define_and_print() {
        let (exec, ctx) = make();
        run_alias(&exec, &ctx, &args(&["ll=ls -l"])).await.unwrap();
        let out = run_alias(&exec, &ctx, &args(&["ll"])).await.unwrap();
        assert_eq!(out.stdout, "alias ll='ls -l'\n");
    }

    #[tokio::test]
    async fn test_alias_list_all_sorted() {
        let (exec, ctx) = make();
        run_alias(&exec, &ctx, &args(&["z=1", "a=2"])).await.unwrap();
        let out = run_alias(&exec, &ctx, &[]).await.unwrap();
        let a = out.stdout.find("alias a='2'").unwrap();
        let z = out.stdout.find("alias z='1'").unwrap();
        assert!(a < z);
    }

    #[tokio::test]
    async fn test_alias_unknown() {
        let (exec, ctx) = make();
        let out = run_alias(&exec, &ctx, &args(&["nope"])).await.unwrap();
        assert_eq!(out.code, 1);
    }

    #[tokio::test]
    async fn test_unalias() {
        let (exec, ctx) = make();
        run_alias(&exec, &ctx, &args(&["x=y"])).await.unwrap();
        let out = run_unalias(&exec, &ctx, &args(&["x"])).await.unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(ctx.get_alias("x"), None);
        let out = run_unalias(&exec, &ctx, &args(&["x"])).await.unwrap();
        assert_eq!(out.code, 1);
    }

    #[tokio::test]
    async fn test_unalias_all() {
        let (exec, ctx) = make();
        run_alias(&exec, &ctx, &args(&["a=1", "b=2"])).await.unwrap();
        run_unalias(&exec, &ctx, &args(&["-a"])).await.unwrap();
        assert!(ctx.aliases_all().is_empty());
    }
}
