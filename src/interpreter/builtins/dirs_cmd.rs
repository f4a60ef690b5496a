//! Directory Stack Builtins: pushd, popd, dirs
//!
//! The stack holds saved directories, index 0 on top; the current directory
//! is printed in front of it. pushd/popd change directory through the same
//! checks as cd and print the resulting stack, bash-style.

use crate::context::ExecContext;
use crate::host::PathTest;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::cd_cmd::resolve_path;
use super::BuiltinOutput;

fn render_stack(ctx: &ExecContext, one_per_line: bool, numbered: bool) -> String {
    let mut entries = vec![ctx.cwd()];
    entries.extend(ctx.dir_stack());
    if numbered {
        entries
            .iter()
            .enumerate()
            .map(|(i, d)| format!(" {}  {}\n", i, d))
            .collect()
    } else if one_per_line {
        entries
            .iter()
            .map(|d| format!("{}\n", d))
            .collect()
    } else {
        format!("{}\n", entries.join(" "))
    }
}

pub(crate) async fn run_dirs(
    _exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let mut one_per_line = false;
    let mut numbered = false;
    for arg in args {
        match arg.as_str() {
            "-c" => {
                ctx.dir_stack_clear();
                return Ok(BuiltinOutput::ok());
            }
            "-p" => one_per_line = true,
            "-v" => numbered = true,
            // -l would expand tildes; nothing is abbreviated here.
            "-l" => {}
            other => {
                return Ok(BuiltinOutput::usage(format!(
                    "bash: dirs: {}: invalid option\n",
                    other
                )))
            }
        }
    }
    Ok(BuiltinOutput::stdout(render_stack(ctx, one_per_line, numbered)))
}

/// Parse a +N / -N rotation argument.
fn rotation(arg: &str) -> Option<(bool, usize)> {
    let (from_top, digits) = if let Some(d) = arg.strip_prefix('+') {
        (true, d)
    } else if let Some(d) = arg.strip_prefix('-') {
        (false, d)
    } else {
        return None;
    };
    digits.parse::<usize>().ok().map(|n| (from_top, n))
}

pub(crate) async fn run_pushd(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let mut no_cd = false;
    let mut target: Option<String> = None;
    let mut rotate: Option<(bool, usize)> = None;

    for arg in args {
        if arg == "-n" {
            no_cd = true;
        } else if let Some(r) = rotation(arg) {
            rotate = Some(r);
        } else {
            target = Some(arg.clone());
        }
    }

    if let Some((from_top, n)) = rotate {
        // Rotate the cwd-plus-stack list so entry N becomes the top.
        let mut entries = vec![ctx.cwd()];
        entries.extend(ctx.dir_stack());
        let len = entries.len();
        let index = if from_top { n % len } else { (len - 1).saturating_sub(n % len) };
        entries.rotate_left(index);
        let new_cwd = entries.remove(0);
        ctx.dir_stack_clear();
        for dir in entries.iter().rev() {
            ctx.dir_stack_push(dir.clone());
        }
        if !no_cd {
            let old = ctx.cwd();
            ctx.set_cwd(new_cwd.clone());
            let _ = ctx.set_env("OLDPWD", Some(old));
            let _ = ctx.set_env("PWD", Some(new_cwd));
        }
        return Ok(BuiltinOutput::stdout(render_stack(ctx, false, false)));
    }

    let Some(target) = target else {
        // Bare pushd swaps cwd with the stack top.
        let Some(top) = ctx.dir_stack_pop() else {
            return Ok(BuiltinOutput::failure("bash: pushd: no other directory\n"));
        };
        let old = ctx.cwd();
        ctx.dir_stack_push(old.clone());
        ctx.set_cwd(top.clone());
        let _ = ctx.set_env("OLDPWD", Some(old));
        let _ = ctx.set_env("PWD", Some(top));
        return Ok(BuiltinOutput::stdout(render_stack(ctx, false, false)));
    };

    let resolved = resolve_path(&ctx.cwd(), &target);
    if !exec
        .host()
        .test_path(ctx, PathTest::Directory, &resolved, None)
        .await
    {
        return Ok(BuiltinOutput::failure(format!(
            "bash: pushd: {}: No such file or directory\n",
            target
        )));
    }

    if no_cd {
        ctx.dir_stack_push(resolved);
    } else {
        let old = ctx.cwd();
        ctx.dir_stack_push(old.clone());
        ctx.set_cwd(resolved.clone());
        let _ = ctx.set_env("OLDPWD", Some(old));
        let _ = ctx.set_env("PWD", Some(resolved));
    }
    Ok(BuiltinOutput::stdout(render_stack(ctx, false, false)))
}

pub(crate) async fn run_popd(
    _exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let mut no_cd = false;
    let mut rotate: Option<(bool, usize)> = None;
    for arg in args {
        if arg == "-n" {
            no_cd = true;
        } else if let Some(r) = rotation(arg) {
            rotate = Some(r);
        } else {
            return Ok(BuiltinOutput::usage(format!(
                "bash: popd: {}: invalid argument\n",
                arg
            )));
        }
    }

    if let Some((from_top, n)) = rotate {
        let stack = ctx.dir_stack();
        if stack.is_empty() {
            return Ok(BuiltinOutput::failure("bash: popd: directory stack empty\n"));
        }
        // +0 refers to the cwd entry; stack entries start at +1.
        let index = if from_top {
            if n == 0 {
                // Popping the current directory: same as a plain popd.
                let top = ctx.dir_stack_pop().unwrap();
                let old = ctx.cwd();
                ctx.set_cwd(top.clone());
                let _ = ctx.set_env("OLDPWD", Some(old));
                let _ = ctx.set_env("PWD", Some(top));
                return Ok(BuiltinOutput::stdout(render_stack(ctx, false, false)));
            }
            n - 1
        } else {
            stack.len().saturating_sub(n + 1)
        };
        if ctx.dir_stack_remove_at(index).is_none() {
            return Ok(BuiltinOutput::failure(
                "bash: popd: directory stack index out of range\n",
            ));
        }
        return Ok(BuiltinOutput::stdout(render_stack(ctx, false, false)));
    }

    let Some(top) = ctx.dir_stack_pop() else {
        return Ok(BuiltinOutput::failure("bash: popd: directory stack empty\n"));
    };
    if !no_cd {
        let old = ctx.cwd();
        ctx.set_cwd(top.clone());
        let _ = ctx.set_env("OLDPWD", Some(old));
        let _ = ctx.set_env("PWD", Some(top));
    }
    Ok(BuiltinOutput::stdout(render_stack(ctx, false, false)))
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
        (exec, ctx, shell)
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_pushd_popd_round_trip() {
        let (exec, ctx, shell) = make();
        shell.add_dir("/a");
        shell.add_dir("/b");

        run_pushd(&exec, &ctx, &args(&["/a"])).await.unwrap();
        run_pushd(&exec, &ctx, &args(&["/b"])).await.unwrap();
        assert_eq!(ctx.cwd(), "/b");
        assert_eq!(ctx.dir_stack().len(), 2);

        run_popd(&exec, &ctx, &[]).await.unwrap();
        run_popd(&exec, &ctx, &[]).await.unwrap();
        assert_eq!(ctx.cwd(), "/home/user");
        assert!(ctx.dir_stack().is_empty());
    }

    #[tokio::test]
    async fn test_pushd_missing_dir() {
        let (exec, ctx, _shell) = make();
        let out = run_pushd(&exec, &ctx, &args(&["/nope"])).await.unwrap();
        assert_eq!(out.code, 1);
        assert!(ctx.dir_stack().is_empty());
    }

    #[tokio::test]
    async fn test_pushd_swap_without_args() {
        let (exec, ctx, shell) = make();
        shell.add_dir("/a");
        run_pushd(&exec, &ctx, &args(&["/a"])).await.unwrap();
        let out = run_pushd(&exec, &ctx, &[]).await.unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(ctx.cwd(), "/home/user");
        assert_eq!(ctx.dir_stack(), vec!["/a".to_string()]);
    }

    #[tokio::test]
    async fn test_pushd_n_only_stacks() {
        let (exec, ctx, shell) = make();
        shell.add_dir("/a");
        run_pushd(&exec, &ctx, &args(&["-n", "/a"])).await.unwrap();
        assert_eq!(ctx.cwd(), "/home/user");
        assert_eq!(ctx.dir_stack(), vec!["/a".to_string()]);
    }

    #[tokio::test]
    async fn test_popd_empty_stack_fails() {
        let (exec, ctx, _shell) = make();
        let out = run_popd(&exec, &ctx, &[]).await.unwrap();
        assert_eq!(out.code, 1);
        assert!(out.stderr.contains("directory stack empty"));
    }

    #[tokio::test]
    async fn test_dirs_output() {
        let (exec, ctx, shell) = make();
        shell.add_dir("/a");
        run_pushd(&exec, &ctx, &args(&["/a"])).await.unwrap();
        let out = run_dirs(&exec, &ctx, &[]).await.unwrap();
        assert_eq!(out.stdout, "/a /home/user\n");

        let out = run_dirs(&exec, &ctx, &args(&["-v"])).await.unwrap();
        assert!(out.stdout.contains(" 0  /a"));
        assert!(out.stdout.contains(" 1  /home/user"));
    }

    #[tokio::test]
    async fn test_dirs_clear() {
        let (exec, ctx, shell) = make();
        shell.add_dir("/a");
        run_pushd(&exec, &ctx, &args(&["/a"])).await.unwrap();
        run_dirs(&exec, &ctx, &args(&["-c"])).await.unwrap();
        assert!(ctx.dir_stack().is_empty());
    }
}
