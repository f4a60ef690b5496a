//! declare/typeset - Declare variables and manage their attributes
//!
//! Supported: -p (print), -r (readonly), -x (export), -i (integer), -a/-A
//! (array attributes accepted; values remain scalar strings), -f (print
//! function definitions), -F (function names only), and +r/+x/+i removal.
//! `readonly` is `declare -r`.

use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

#[derive(Default)]
struct DeclareFlags {
    print: bool,
    readonly: bool,
    export: bool,
    integer: bool,
    functions: bool,
    function_names: bool,
    clear_readonly: bool,
    clear_export: bool,
    clear_integer: bool,
}

fn parse_flags<'a>(args: &'a [String], flags: &mut DeclareFlags) -> Result<Vec<&'a String>, String> {
    let mut names = Vec::new();
    for arg in args {
        if let Some(rest) = arg.strip_prefix('+') {
            for c in rest.chars() {
                match c {
                    'r' => flags.clear_readonly = true,
                    'x' => flags.clear_export = true,
                    'i' => flags.clear_integer = true,
                    other => return Err(format!("+{}", other)),
                }
            }
        } else if arg.starts_with('-') && arg.len() > 1 && !arg.contains('=') {
            for c in arg[1..].chars() {
                match c {
                    'p' => flags.print = true,
                    'r' => flags.readonly = true,
                    'x' => flags.export = true,
                    'i' => flags.integer = true,
                    // Array attributes accepted; values stay scalar.
                    'a' | 'A' => {}
                    'f' => flags.functions = true,
                    'F' => flags.function_names = true,
                    'g' | 'l' | 'u' | 'n' | 't' => {}
                    other => return Err(format!("-{}", other)),
                }
            }
        } else {
            names.push(arg);
        }
    }
    Ok(names)
}

fn print_var(ctx: &ExecContext, name: &str) -> Option<String> {
    let value = ctx.get_var(name)?;
    let mut attrs = String::new();
    if ctx.is_integer_var(name) {
        attrs.push('i');
    }
    if ctx.is_readonly(name) {
        attrs.push('r');
    }
    if ctx.get_env(name).is_some() && ctx.get_param(name).is_none() {
        attrs.push('x');
    }
    let attrs = if attrs.is_empty() {
        "--".to_string()
    } else {
        format!("-{}", attrs)
    };
    Some(format!("declare {} {}=\"{}\"\n", attrs, name, value))
}

pub(crate) async fn run(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    run_impl(exec, ctx, args, false).await
}

pub(crate) async fn run_readonly(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    run_impl(exec, ctx, args, true).await
}

async fn run_impl(
    _exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
    force_readonly: bool,
) -> Result<BuiltinOutput, ExecError> {
    let mut flags = DeclareFlags {
        readonly: force_readonly,
        ..Default::default()
    };
    let names = match parse_flags(args, &mut flags) {
        Ok(names) => names,
        Err(flag) => {
            return Ok(BuiltinOutput::usage(format!(
                "bash: declare: {}: invalid option\n",
                flag
            )))
        }
    };

    // Function listing modes.
    if flags.functions || flags.function_names {
        let mut stdout = String::new();
        let all = ctx.function_names();
        let wanted: Vec<String> = if names.is_empty() {
            all
        } else {
            names.iter().map(|s| s.to_string()).collect()
        };
        let mut code = 0;
        for name in wanted {
            match ctx.get_function(&name) {
                Some(def) if flags.function_names => {
                    stdout.push_str(&format!("declare -f {}\n", def.name));
                }
                Some(def) => {
                    stdout.push_str(&def.raw);
                    stdout.push('\n');
                }
                None => code = 1,
            }
        }
        return Ok(BuiltinOutput {
            code,
            stdout,
            stderr: String::new(),
        });
    }

    // Print mode.
    if flags.print || (names.is_empty() && !flags.readonly && !flags.export && !flags.integer) {
        let mut stdout = String::new();
        if names.is_empty() {
            let mut all: Vec<String> = ctx.vars_all().into_keys().collect();
            all.sort();
            for name in all {
                if let Some(line) = print_var(ctx, &name) {
                    stdout.push_str(&line);
                }
            }
            return Ok(BuiltinOutput::stdout(stdout));
        }
        let mut code = 0;
        let mut stderr = String::new();
        for name in names {
            match print_var(ctx, name) {
                Some(line) => stdout.push_str(&line),
                None => {
                    stderr.push_str(&format!("bash: declare: {}: not found\n", name));
                    code = 1;
                }
            }
        }
        return Ok(BuiltinOutput {
            code,
            stdout,
            stderr,
        });
    }

    let mut stderr = String::new();
    let mut code = 0;
    for name_arg in names {
        let (name, value) = match name_arg.split_once('=') {
            Some((n, v)) => (n.to_string(), Some(v.to_string())),
            None => (name_arg.clone(), None),
        };

        if flags.clear_readonly {
            ctx.clear_readonly(&name);
        }
        if flags.clear_integer {
            ctx.clear_integer(&name);
        }
        if flags.clear_export {
            if let Some(value) = ctx.get_env(&name) {
                let _ = ctx.set_env(&name, None);
                let _ = ctx.set_param(&name, Some(value));
            }
        }

        if let Some(value) = value {
            let result = if flags.export {
                ctx.set_env(&name, Some(value))
            } else {
                ctx.set_param(&name, Some(value))
            };
            if let Err(e) = result {
                stderr.push_str(&format!("bash: declare: {}\n", e));
                code = 1;
                continue;
            }
        } else if flags.export {
            if let Some(value) = ctx.get_param(&name) {
                let _ = ctx.set_env(&name, Some(value));
                let _ = ctx.set_param(&name, None);
            }
        }

        // Attributes are applied after the value so `declare -r X=1` binds
        // before sealing.
        if flags.readonly {
            ctx.mark_readonly(&name);
        }
        if flags.integer {
            ctx.mark_integer(&name);
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
    async fn test_declare_assigns() {
        let (exec, ctx) = make();
        run(&exec, &ctx, &args(&["X=1"])).await.unwrap();
        assert_eq!(ctx.get_param("X"), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_declare_readonly_blocks_rebind() {
        let (exec, ctx) = make();
        run(&exec, &ctx, &args(&["-r", "C=1"])).await.unwrap();
        let out = run(&exec, &ctx, &args(&["C=2"])).await.unwrap();
        assert_eq!(out.code, 1);
        assert_eq!(ctx.get_param("C"), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_readonly_alias() {
        let (exec, ctx) = make();
        run_readonly(&exec, &ctx, &args(&["R=5"])).await.unwrap();
        assert!(ctx.is_readonly("R"));
    }

    #[tokio::test]
    async fn test_declare_integer_attribute() {
        let (exec, ctx) = make();
        run(&exec, &ctx, &args(&["-i", "N=3"])).await.unwrap();
        assert!(ctx.is_integer_var("N"));
        run(&exec, &ctx, &args(&["+i", "N"])).await.unwrap();
        assert!(!ctx.is_integer_var("N"));
    }

    #[tokio::test]
    async fn test_declare_x_exports() {
        let (exec, ctx) = make();
        run(&exec, &ctx, &args(&["-x", "E=v"])).await.unwrap();
        assert_eq!(ctx.get_env("E"), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_declare_p_prints_attributes() {
        let (exec, ctx) = make();
        run(&exec, &ctx, &args(&["-r", "C=1"])).await.unwrap();
        let out = run(&exec, &ctx, &args(&["-p", "C"])).await.unwrap();
        assert_eq!(out.stdout, "declare -r C=\"1\"\n");
    }

    #[tokio::test]
    async fn test_declare_p_unknown() {
        let (exec, ctx) = make();
        let out = run(&exec, &ctx, &args(&["-p", "NOPE"])).await.unwrap();
        assert_eq!(out.code, 1);
    }

    #[tokio::test]
    async fn test_declare_f_prints_definition() {
        let (exec, ctx) = make();
        let script = crate::parser::parse("greet() { echo hi; }").unwrap();
        exec.run_nodes_script(&ctx, &script.commands).await.unwrap();
        let out = run(&exec, &ctx, &args(&["-f", "greet"])).await.unwrap();
        assert!(out.stdout.contains("greet()"));
        let out = run(&exec, &ctx, &args(&["-F"])).await.unwrap();
        assert_eq!(out.stdout, "declare -f greet\n");
    }
}
