//! export - Promote variables into the exported environment
//!
//! `export NAME=value` binds in env so external commands inherit it;
//! `export NAME` promotes an existing parameter. `-n` demotes the binding
//! back to params; `-p` prints the exported set.

use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

pub(crate) async fn run(
    _exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let mut demote = false;
    let mut print = false;
    let mut names: Vec<&String> = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-n" => demote = true,
            "-p" => print = true,
            _ => names.push(arg),
        }
    }

    if print || (names.is_empty() && !demote) {
        let mut entries: Vec<(String, String)> = ctx.env_all().into_iter().collect();
        entries.sort();
        let stdout = entries
            .iter()
            .map(|(k, v)| format!("declare -x {}=\"{}\"\n", k, v))
            .collect::<String>();
        return Ok(BuiltinOutput::stdout(stdout));
    }

    let mut stderr = String::new();
    let mut code = 0;
    for name_arg in names {
        let (name, value) = match name_arg.split_once('=') {
            Some((n, v)) => (n.to_string(), Some(v.to_string())),
            None => (name_arg.clone(), None),
        };

        if demote {
            // Move the exported value back into params.
            if let Some(value) = ctx.get_env(&name) {
                let _ = ctx.set_env(&name, None);
                if let Err(e) = ctx.set_param(&name, Some(value)) {
                    stderr.push_str(&format!("bash: export: {}\n", e));
                    code = 1;
                }
            }
            continue;
        }

        // Promote: explicit value wins, otherwise the current parameter.
        let value = value.or_else(|| ctx.get_param(&name));
        match ctx.set_env(&name, Some(value.unwrap_or_default())) {
            Ok(()) => {
                let _ = ctx.set_param(&name, None);
            }
            Err(e) => {
                stderr.push_str(&format!("bash: export: {}\n", e));
                code = 1;
            }
        }
    }

    Ok(BuiltinOutput {
        code,
        stdout: String::new(),
        stderr,
    })
}
