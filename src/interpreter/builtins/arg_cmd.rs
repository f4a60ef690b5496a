//! arg - Declarative argument parsing for scripts
//!
//! Successive calls declare positionals, typed options and flags;
//! `arg --export` consumes the script's positional parameters, exports
//! UPPERCASE_WITH_UNDERSCORES bindings and clears the registry. Parse
//! errors print per-error lines plus a --help hint and raise an exit
//! signal with code 1; -h/--help prints usage and exits 0.

use crate::context::ExecContext;
use crate::interpreter::argspec::{ArgMatch, ArgSpec, ArgType};
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

/// The registry belongs to the frame the script runs in, which is the
/// parent of this builtin invocation's own frame.
fn registry_key(ctx: &ExecContext) -> u64 {
    ctx.parent().map(|p| p.id()).unwrap_or_else(|| ctx.id())
}

fn script_name(ctx: &ExecContext) -> String {
    ctx.get_param("0").unwrap_or_else(|| "script".to_string())
}

fn positional_name(token: &str) -> Option<(String, bool)> {
    if let Some(inner) = token.strip_prefix("[<").and_then(|t| t.strip_suffix(">]")) {
        return Some((inner.to_string(), false));
    }
    if let Some(inner) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return Some((inner.to_string(), true));
    }
    None
}

pub(crate) async fn run(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    if args.is_empty() {
        return Ok(BuiltinOutput::usage("bash: arg: declaration expected\n"));
    }

    let key = registry_key(ctx);

    if args[0] == "--export" {
        // The registry's lifetime ends here, success or failure.
        let specs = exec
            .arg_registries
            .borrow_mut()
            .remove(&key)
            .unwrap_or_default();
        let script = script_name(ctx);
        match specs.evaluate(&ctx.positional_args()) {
            ArgMatch::Help => {
                exec.emit(ctx, &specs.usage(&script), "").await?;
                return Err(ExecError::Exit(0));
            }
            ArgMatch::Errors(errors) => {
                let mut stderr = String::new();
                for error in errors {
                    stderr.push_str(&error);
                    stderr.push('\n');
                }
                stderr.push_str(&format!(
                    "Try '{} --help' for more information.\n",
                    script
                ));
                exec.emit(ctx, "", &stderr).await?;
                return Err(ExecError::Exit(1));
            }
            ArgMatch::Bindings(bindings) => {
                for (name, value) in bindings {
                    if let Err(e) = ctx.set_env(&name, Some(value)) {
                        return Ok(BuiltinOutput::failure(format!("bash: arg: {}\n", e)));
                    }
                }
                return Ok(BuiltinOutput::ok());
            }
        }
    }

    if args[0] == "--desc" {
        let text = args.get(1).cloned().unwrap_or_default();
        exec.arg_registries
            .borrow_mut()
            .entry(key)
            .or_default()
            .description = Some(text);
        return Ok(BuiltinOutput::ok());
    }

    // Positional declaration: <name> TYPE "desc" or [<name>] TYPE = default "desc"
    if let Some((name, required)) = positional_name(&args[0]) {
        let Some(ty) = args.get(1).and_then(|t| ArgType::parse(t)) else {
            return Ok(BuiltinOutput::usage(format!(
                "bash: arg: {}: expected type (string|number|boolean)\n",
                args[0]
            )));
        };
        let (default, desc_index) = if args.get(2).map(|s| s.as_str()) == Some("=") {
            (args.get(3).cloned(), 4)
        } else {
            (None, 2)
        };
        if required && default.is_some() {
            return Ok(BuiltinOutput::usage(format!(
                "bash: arg: <{}>: required arguments cannot have defaults\n",
                name
            )));
        }
        let description = args.get(desc_index).cloned().unwrap_or_default();
        exec.arg_registries
            .borrow_mut()
            .entry(key)
            .or_default()
            .add(ArgSpec {
                long: None,
                short: None,
                positional: true,
                name,
                ty,
                required,
                default,
                description,
            });
        return Ok(BuiltinOutput::ok());
    }

    // Option declaration: [-s] --long [TYPE [= default]] "desc"
    let mut index = 0;
    let mut short: Option<char> = None;
    if args[index].len() == 2 && args[index].starts_with('-') && !args[index].starts_with("--") {
        short = args[index].chars().nth(1);
        index += 1;
    }
    let Some(long) = args.get(index).and_then(|a| a.strip_prefix("--")) else {
        return Ok(BuiltinOutput::usage(format!(
            "bash: arg: {}: expected an option or positional declaration\n",
            args[0]
        )));
    };
    let long = long.to_string();
    index += 1;

    let ty = args.get(index).and_then(|t| ArgType::parse(t));
    let (ty, default, description) = match ty {
        Some(ty) => {
            index += 1;
            let default = if args.get(index).map(|s| s.as_str()) == Some("=") {
                index += 2;
                args.get(index - 1).cloned()
            } else {
                None
            };
            (ty, default, args.get(index).cloned().unwrap_or_default())
        }
        // No type: a boolean flag.
        None => (
            ArgType::Flag,
            None,
            args.get(index).cloned().unwrap_or_default(),
        ),
    };

    exec.arg_registries
        .borrow_mut()
        .entry(key)
        .or_default()
        .add(ArgSpec {
            long: Some(long.clone()),
            short,
            positional: false,
            name: long,
            ty,
            required: false,
            default,
            description,
        });
    Ok(BuiltinOutput::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryShell;
    use std::rc::Rc;

    fn make() -> (Executor, ExecContext, ExecContext) {
        let exec = Executor::new(Rc::new(MemoryShell::new()));
        let script_ctx = ExecContext::new_root("/");
        let cmd_ctx = script_ctx.spawn_child();
        (exec, script_ctx, cmd_ctx)
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_declare_and_export() {
        let (exec, script_ctx, cmd_ctx) = make();
        script_ctx
            .replace_positional(&["in.txt".to_string(), "--verbose".to_string()])
            .unwrap();

        run(&exec, &cmd_ctx, &args(&["--desc", "A tool"])).await.unwrap();
        run(&exec, &cmd_ctx, &args(&["<file>", "string", "input file"]))
            .await
            .unwrap();
        run(&exec, &cmd_ctx, &args(&["-v", "--verbose", "noisy"]))
            .await
            .unwrap();

        let out = run(&exec, &cmd_ctx, &args(&["--export"])).await.unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(script_ctx.get_env("FILE"), Some("in.txt".to_string()));
        assert_eq!(script_ctx.get_env("VERBOSE"), Some("true".to_string()));
        // Registry is gone after export.
        assert!(exec.arg_registries.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_optional_positional_with_default() {
        let (exec, script_ctx, cmd_ctx) = make();
        script_ctx.replace_positional(&[]).unwrap();
        run(
            &exec,
            &cmd_ctx,
            &args(&["[<count>]", "number", "=", "10", "how many"]),
        )
        .await
        .unwrap();
        run(&exec, &cmd_ctx, &args(&["--export"])).await.unwrap();
        assert_eq!(script_ctx.get_env("COUNT"), Some("10".to_string()));
    }

    #[tokio::test]
    async fn test_missing_required_raises_exit_one() {
        let (exec, script_ctx, cmd_ctx) = make();
        script_ctx.replace_positional(&[]).unwrap();
        run(&exec, &cmd_ctx, &args(&["<file>", "string", "input"]))
            .await
            .unwrap();
        match run(&exec, &cmd_ctx, &args(&["--export"])).await {
            Err(ExecError::Exit(1)) => {}
            other => panic!("unexpected: {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_help_raises_exit_zero() {
        let (exec, script_ctx, cmd_ctx) = make();
        script_ctx
            .replace_positional(&["--help".to_string()])
            .unwrap();
        run(&exec, &cmd_ctx, &args(&["<file>", "string", "input"]))
            .await
            .unwrap();
        match run(&exec, &cmd_ctx, &args(&["--export"])).await {
            Err(ExecError::Exit(0)) => {}
            other => panic!("unexpected: {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_typed_option_with_default() {
        let (exec, script_ctx, cmd_ctx) = make();
        script_ctx.replace_positional(&[]).unwrap();
        run(
            &exec,
            &cmd_ctx,
            &args(&["--level", "number", "=", "3", "verbosity level"]),
        )
        .await
        .unwrap();
        run(&exec, &cmd_ctx, &args(&["--export"])).await.unwrap();
        assert_eq!(script_ctx.get_env("LEVEL"), Some("3".to_string()));
    }

    #[tokio::test]
    async fn test_bad_declaration_is_usage_error() {
        let (exec, _script_ctx, cmd_ctx) = make();
        let out = run(&exec, &cmd_ctx, &args(&["<file>", "bogus-type"]))
            .await
            .unwrap();
        assert_eq!(out.code, 2);
    }
}
