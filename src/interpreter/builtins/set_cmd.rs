//! set - Shell options and positional parameters
//!
//! Named options are recorded in the context and not enforced by the
//! executor (errexit included). `set --` replaces the positional
//! parameters; with no arguments the visible variables are printed
//! sorted, `name=value` per line.

use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

/// The recognized long option names.
const OPTIONS: &[&str] = &[
    "errexit", "nounset", "xtrace", "verbose", "noclobber", "noglob", "allexport", "notify",
    "ignoreeof", "monitor", "noexec", "pipefail",
];

fn short_option(c: char) -> Option<&'static str> {
    match c {
        'e' => Some("errexit"),
        'u' => Some("nounset"),
        'x' => Some("xtrace"),
        'v' => Some("verbose"),
        'C' => Some("noclobber"),
        'f' => Some("noglob"),
        'a' => Some("allexport"),
        'b' => Some("notify"),
        'm' => Some("monitor"),
        'n' => Some("noexec"),
        _ => None,
    }
}

pub(crate) async fn run(
    _exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    if args.is_empty() {
        let mut entries: Vec<(String, String)> = ctx.vars_all().into_iter().collect();
        entries.sort();
        let stdout: String = entries
            .iter()
            .map(|(k, v)| format!("{}={}\n", k, v))
            .collect();
        return Ok(BuiltinOutput::stdout(stdout));
    }

    let mut iter = args.iter().enumerate();
    while let Some((index, arg)) = iter.next() {
        match arg.as_str() {
            "--" => {
                let rest: Vec<String> = args[index + 1..].to_vec();
                if let Err(e) = ctx.replace_positional(&rest) {
                    return Ok(BuiltinOutput::failure(format!("bash: set: {}\n", e)));
                }
                return Ok(BuiltinOutput::ok());
            }
            "-o" | "+o" => {
                let enable = arg.starts_with('-');
                match iter.next() {
                    Some((_, name)) => {
                        if !OPTIONS.contains(&name.as_str()) {
                            return Ok(BuiltinOutput::usage(format!(
                                "bash: set: {}: invalid option name\n",
                                name
                            )));
                        }
                        if enable {
                            ctx.enable_option(name);
                        } else {
                            ctx.disable_option(name);
                        }
                    }
                    None => {
                        // `set -o` alone lists option states.
                        let stdout: String = OPTIONS
                            .iter()
                            .map(|name| {
                                let state = if ctx.option_enabled(name) { "on" } else { "off" };
                                format!("{:<15} {}\n", name, state)
                            })
                            .collect();
                        return Ok(BuiltinOutput::stdout(stdout));
                    }
                }
            }
            flag if flag.starts_with('-') || flag.starts_with('+') => {
                let enable = flag.starts_with('-');
                for c in flag[1..].chars() {
                    match short_option(c) {
                        Some(name) => {
                            if enable {
                                ctx.enable_option(name);
                            } else {
                                ctx.disable_option(name);
                            }
                        }
                        None => {
                            return Ok(BuiltinOutput::usage(format!(
                                "bash: set: {}{}: invalid option\n",
                                &flag[..1],
                                c
                            )))
                        }
                    }
                }
            }
            _ => {
                // Bare words replace the positional parameters from here on.
                let rest: Vec<String> = args[index..].to_vec();
                if let Err(e) = ctx.replace_positional(&rest) {
                    return Ok(BuiltinOutput::failure(format!("bash: set: {}\n", e)));
                }
                return Ok(BuiltinOutput::ok());
            }
        }
    }

    Ok(BuiltinOutput::ok())
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
    async fn test_set_records_short_options() {
        let (exec, ctx) = make();
        run(&exec, &ctx, &args(&["-e"])).await.unwrap();
        assert!(ctx.option_enabled("errexit"));
        run(&exec, &ctx, &args(&["+e"])).await.unwrap();
        assert!(!ctx.option_enabled("errexit"));
    }

    #[tokio::test]
    async fn test_set_o_longname() {
        let (exec, ctx) = make();
        run(&exec, &ctx, &args(&["-o", "pipefail"])).await.unwrap();
        assert!(ctx.option_enabled("pipefail"));
        run(&exec, &ctx, &args(&["+o", "pipefail"])).await.unwrap();
        assert!(!ctx.option_enabled("pipefail"));
    }

    #[tokio::test]
    async fn test_set_unknown_option_is_usage_error() {
        let (exec, ctx) = make();
        let out = run(&exec, &ctx, &args(&["-o", "bogus"])).await.unwrap();
        assert_eq!(out.code, 2);
    }

    #[tokio::test]
    async fn test_set_dashdash_replaces_positionals() {
        let (exec, ctx) = make();
        run(&exec, &ctx, &args(&["--", "a", "b", "c"])).await.unwrap();
        assert_eq!(ctx.positional_args(), vec!["a", "b", "c"]);
        run(&exec, &ctx, &args(&["--"])).await.unwrap();
        assert_eq!(ctx.positional_count(), 0);
    }

    #[tokio::test]
    async fn test_set_no_args_prints_vars() {
        let (exec, ctx) = make();
        ctx.set_param("ZVAR", Some("1".to_string())).unwrap();
        ctx.set_param("AVAR", Some("2".to_string())).unwrap();
        let out = run(&exec, &ctx, &[]).await.unwrap();
        let a = out.stdout.find("AVAR=2").unwrap();
        let z = out.stdout.find("ZVAR=1").unwrap();
        assert!(a < z);
    }

    #[tokio::test]
    async fn test_set_o_listing() {
        let (exec, ctx) = make();
        ctx.enable_option("errexit");
        let out = run(&exec, &ctx, &args(&["-o"])).await.unwrap();
        assert!(out.stdout.contains("errexit"));
        assert!(out.stdout.contains("on"));
    }
}
