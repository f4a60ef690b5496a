//! type / command / builtin - Command introspection and dispatch control
//!
//! `type` reports what a name resolves to across the alias, function and
//! builtin namespaces (`-t` terse, `-a` all). `command` bypasses function
//! lookup (`-v`/`-V` query instead of running); `builtin` restricts
//! dispatch to the builtin table.

use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

fn classify(exec: &Executor, ctx: &ExecContext, name: &str) -> Vec<(&'static str, String)> {
    let mut kinds = Vec::new();
    if let Some(value) = ctx.get_alias(name) {
        kinds.push(("alias", value));
    }
    if ctx.get_function(name).is_some() {
        kinds.push(("function", String::new()));
    }
    if exec.builtins().contains(name) {
        kinds.push(("builtin", String::new()));
    }
    kinds
}

pub(crate) async fn run_type(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let mut terse = false;
    let mut all = false;
    let mut names: Vec<&String> = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-t" => terse = true,
            "-a" => all = true,
            _ => names.push(arg),
        }
    }

    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut code = 0;
    for name in names {
        let kinds = classify(exec, ctx, name);
        if kinds.is_empty() {
            if !terse {
                stderr.push_str(&format!("bash: type: {}: not found\n", name));
            }
            code = 1;
            continue;
        }
        let shown = if all { kinds.len() } else { 1 };
        for (kind, detail) in kinds.into_iter().take(shown) {
            if terse {
                stdout.push_str(&format!("{}\n", kind));
            } else {
                match kind {
                    "alias" => {
                        stdout.push_str(&format!("{} is aliased to `{}'\n", name, detail))
                    }
                    "function" => stdout.push_str(&format!("{} is a function\n", name)),
                    _ => stdout.push_str(&format!("{} is a shell builtin\n", name)),
                }
            }
        }
    }

    Ok(BuiltinOutput {
        code,
        stdout,
        stderr,
    })
}

pub(crate) async fn run_command(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let mut describe = false;
    let mut verbose = false;
    let mut rest: Vec<String> = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-v" => describe = true,
            "-V" => {
                describe = true;
                verbose = true;
            }
            // Default-PATH lookup is the host's concern either way.
            "-p" => {}
            _ => rest.push(arg.clone()),
        }
    }

    let Some(name) = rest.first().cloned() else {
        return Ok(BuiltinOutput::ok());
    };

    if describe {
        let kinds = classify(exec, ctx, &name);
        return match kinds.first() {
            Some((kind, detail)) => {
                let stdout = if verbose {
                    match *kind {
                        "alias" => format!("{} is aliased to `{}'\n", name, detail),
                        "function" => format!("{} is a function\n", name),
                        _ => format!("{} is a shell builtin\n", name),
                    }
                } else {
                    match *kind {
                        "alias" => format!("alias {}='{}'\n", name, detail),
                        _ => format!("{}\n", name),
                    }
                };
                Ok(BuiltinOutput::stdout(stdout))
            }
            None => Ok(BuiltinOutput::code(1)),
        };
    }

    // Run, skipping function lookup.
    let code = exec
        .dispatch(ctx, &name, &rest[1..], false, true)
        .await?;
    Ok(BuiltinOutput::code(code))
}

pub(crate) async fn run_builtin(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let Some(name) = args.first() else {
        return Ok(BuiltinOutput::ok());
    };
    if !exec.builtins().contains(name) {
        return Ok(BuiltinOutput::failure(format!(
            "bash: builtin: {}: not a shell builtin\n",
            name
        )));
    }
    let code = exec.dispatch(ctx, name, &args[1..], false, true).await?;
    Ok(BuiltinOutput::code(code))
}
