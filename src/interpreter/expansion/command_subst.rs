//! Command Substitution
//!
//! Runs `$( )` / backtick bodies in a child context whose stdout is a fresh
//! host pipe, drains the pipe concurrently with execution so large outputs
//! cannot deadlock on pipe capacity, strips trailing newlines per the POSIX
//! rule, and guarantees pipe teardown.

use crate::ast::types::Script;
use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

/// Execute a substitution body and capture its output.
/// Returns (value, status); a non-zero status aborts the whole expansion.
pub(crate) async fn run(
    exec: &Executor,
    ctx: &ExecContext,
    script: &Script,
) -> Result<(String, i32), ExecError> {
    let host = exec.host();
    let child = ctx.spawn_child();
    let pipe = host.pipe_open().await?;
    child.set_stdout(pipe.clone(), false);

    let run_fut = async {
        let status = match exec.run_nodes_script(&child, &script.commands).await {
            Ok(code) => Ok(code),
            // `exit` inside a substitution terminates only the substitution.
            Err(ExecError::Exit(code)) => Ok(code),
            Err(e) => Err(e),
        };
        // Unblock the reader whatever happened.
        let _ = host.pipe_write(&pipe, "").await;
        status
    };
    let drain_fut = async {
        let mut out = String::new();
        loop {
            match host.pipe_read(&pipe).await {
                Ok(chunk) if chunk.is_empty() => break,
                Ok(chunk) => out.push_str(&chunk),
                Err(_) => break,
            }
        }
        out
    };

    let (status, output) = futures_util::join!(run_fut, drain_fut);
    let _ = host.pipe_remove(&pipe).await;

    let status = status?;
    let value = output.trim_end_matches('\n').to_string();
    Ok((value, status))
}
