//! cd - Change directory builtin
//!
//! Supports -L and -P (accepted; no symlink resolution happens in this
//! host model so they behave identically), `cd -` (previous directory,
//! printed), the HOME default and CDPATH-less relative resolution. PWD and
//! OLDPWD are maintained in the exported environment. Directory existence
//! is verified through the host facade.

use crate::context::ExecContext;
use crate::host::PathTest;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

/// Join and normalize a path against a base directory.
pub(crate) fn resolve_path(base: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", base, path)
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

pub(crate) async fn run(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let mut target: Option<&str> = None;
    let mut print_target = false;

    for arg in args {
        match arg.as_str() {
            "-L" | "-P" => {}
            "-" => {
                target = None;
                print_target = true;
            }
            other => {
                target = Some(other);
                print_target = false;
            }
        }
    }

    let dest = if print_target {
        match ctx.get_env("OLDPWD").or_else(|| ctx.get_var("OLDPWD")) {
            Some(dir) => dir,
            None => {
                return Ok(BuiltinOutput::failure("bash: cd: OLDPWD not set\n"));
            }
        }
    } else {
        match target {
            Some(dir) => dir.to_string(),
            None => match ctx.get_var("HOME") {
                Some(home) => home,
                None => return Ok(BuiltinOutput::failure("bash: cd: HOME not set\n")),
            },
        }
    };

    let resolved = resolve_path(&ctx.cwd(), &dest);
    if !exec
        .host()
        .test_path(ctx, PathTest::Directory, &resolved, None)
        .await
    {
        return Ok(BuiltinOutput::failure(format!(
            "bash: cd: {}: No such file or directory\n",
            dest
        )));
    }

    let old = ctx.cwd();
    ctx.set_cwd(resolved.clone());
    let _ = ctx.set_env("OLDPWD", Some(old));
    let _ = ctx.set_env("PWD", Some(resolved.clone()));

    if print_target {
        return Ok(BuiltinOutput::stdout(format!("{}\n", resolved)));
    }
    Ok(BuiltinOutput::ok())
}

pub(crate) async fn run_pwd(
    _exec: &Executor,
    ctx: &ExecContext,
    _args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    Ok(BuiltinOutput::stdout(format!("{}\n", ctx.cwd())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryShell;
    use std::rc::Rc;

    fn make() -> (Executor, ExecContext, Rc<MemoryShell>) {
        let shell = Rc::new(MemoryShell::new());
        let exec = Executor::new(shell.clone());
        let ctx = ExecContext::new_root("/home/user");
        ctx.set_env("HOME", Some("/home/user".to_string())).unwrap();
        (exec, ctx, shell)
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("/a/b", "c"), "/a/b/c");
        assert_eq!(resolve_path("/a/b", "../c"), "/a/c");
        assert_eq!(resolve_path("/a", "/x/y"), "/x/y");
        assert_eq!(resolve_path("/", ".."), "/");
        assert_eq!(resolve_path("/a/b", "./d/"), "/a/b/d");
    }

    #[tokio::test]
    async fn test_cd_to_directory() {
        let (exec, ctx, _shell) = make();
        let out = run(&exec, &ctx, &args(&["/tmp"])).await.unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(ctx.cwd(), "/tmp");
        assert_eq!(ctx.get_env("PWD"), Some("/tmp".to_string()));
        assert_eq!(ctx.get_env("OLDPWD"), Some("/home/user".to_string()));
    }

    #[tokio::test]
    async fn test_cd_missing_directory() {
        let (exec, ctx, _shell) = make();
        let out = run(&exec, &ctx, &args(&["/nope"])).await.unwrap();
        assert_eq!(out.code, 1);
        assert!(out.stderr.contains("No such file or directory"));
        assert_eq!(ctx.cwd(), "/home/user");
    }

    #[tokio::test]
    async fn test_cd_home_default() {
        let (exec, ctx, _shell) = make();
        ctx.set_cwd("/tmp");
        let out = run(&exec, &ctx, &[]).await.unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(ctx.cwd(), "/home/user");
    }

    #[tokio::test]
    async fn test_cd_dash_prints_and_returns() {
        let (exec, ctx, _shell) = make();
        run(&exec, &ctx, &args(&["/tmp"])).await.unwrap();
        let out = run(&exec, &ctx, &args(&["-"])).await.unwrap();
        assert_eq!(out.stdout, "/home/user\n");
        assert_eq!(ctx.cwd(), "/home/user");
    }

    #[tokio::test]
    async fn test_cd_relative() {
        let (exec, ctx, shell) = make();
        shell.add_dir("/home/user/sub");
        let out = run(&exec, &ctx, &args(&["sub"])).await.unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(ctx.cwd(), "/home/user/sub");
    }

    #[tokio::test]
    async fn test_pwd() {
        let (exec, ctx, _shell) = make();
        let out = run_pwd(&exec, &ctx, &[]).await.unwrap();
        assert_eq!(out.stdout, "/home/user\n");
    }
}
