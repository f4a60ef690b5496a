//! local - Bind variables in the current function frame
//!
//! The binding lands in the builtin's caller frame (the enclosing compound
//! list or function body), so it vanishes when that frame ends and never
//! leaks to the parent scope.

use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

pub(crate) async fn run(
    _exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    // The builtin runs in the command's own child frame; locals belong one
    // frame up, where the surrounding list executes.
    let frame = ctx.parent().unwrap_or_else(|| ctx.clone());

    let mut stderr = String::new();
    let mut code = 0;
    for arg in args {
        if arg.starts_with('-') {
            // Attribute flags are accepted and ignored (values stay scalar).
            continue;
        }
        match arg.split_once('=') {
            Some((name, value)) => {
                if frame.is_readonly(name) {
                    stderr.push_str(&format!("bash: local: {}: readonly variable\n", name));
                    code = 1;
                    continue;
                }
                frame.set_local_param(name, value);
            }
            None => frame.declare_local(arg),
        }
    }

    Ok(BuiltinOutput {
        code,
        stdout: String::new(),
        stderr,
    })
}
