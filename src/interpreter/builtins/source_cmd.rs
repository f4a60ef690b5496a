//! source / . - Execute a file's commands in the current environment
//!
//! The file is fetched through the host facade and re-run against the
//! caller's context. A `return` inside the sourced file stops it and
//! becomes its status; extra arguments temporarily become the positional
//! parameters while the file runs.

use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

pub(crate) async fn run(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let Some(path) = args.first() else {
        return Ok(BuiltinOutput::usage("bash: source: filename argument required\n"));
    };

    let source = match exec.host().read_file(ctx, path).await {
        Ok(content) => content,
        Err(e) => {
            return Ok(BuiltinOutput::failure(format!("bash: source: {}\n", e)));
        }
    };

    let script = match crate::parser::parse(&source) {
        Ok(script) => script,
        Err(e) => {
            return Ok(BuiltinOutput::usage(format!("bash: source: {}: {}\n", path, e)));
        }
    };

    // Extra arguments shadow the positional parameters for the duration.
    let run_ctx = if args.len() > 1 {
        let frame = ctx.spawn_child();
        frame.set_positional_local(&args[1..]);
        frame
    } else {
        ctx.clone()
    };

    match exec.run_nodes_script(&run_ctx, &script.commands).await {
        Ok(code) => Ok(BuiltinOutput::code(code)),
        Err(ExecError::Return(code)) => Ok(BuiltinOutput::code(code)),
        Err(e) => Err(e),
    }
}
