//! Pipeline Orchestration & File Bridging
//!
//! All stages of a pipeline start concurrently as independent futures; each
//! stage signals EOF on its outbound pipe when it completes, and every pipe
//! the orchestrator created is removed afterwards, on failure paths too.
//! The pipeline's status is the last stage's.
//!
//! File bridging: when a command's stdin/stdout/stderr endpoint is a
//! filesystem path, a bridge pipe is interposed and the host streams
//! file -> pipe or pipe -> file in the background while the command runs.

use futures_util::future::{join_all, LocalBoxFuture};
use futures_util::FutureExt;
use std::future::Future;

use crate::ast::types::Pipeline;
use crate::context::ExecContext;
use crate::host::HostError;

use super::errors::ExecError;
use super::executor::Executor;

impl Executor {
    /// Write data to a symbolic endpoint. Pipes are written directly; a
    /// filesystem endpoint gets a one-shot bridge pipe so the host performs
    /// the actual file I/O.
    pub(crate) async fn write_endpoint(
        &self,
        ctx: &ExecContext,
        endpoint: &str,
        append: bool,
        data: &str,
    ) -> Result<(), ExecError> {
        if data.is_empty() {
            return Ok(());
        }
        let host = self.host();
        if host.is_pipe(endpoint) {
            host.pipe_write(endpoint, data).await?;
            return Ok(());
        }
        let pipe = host.pipe_open().await?;
        let write_fut = async {
            let result = host.pipe_write(&pipe, data).await;
            let _ = host.pipe_write(&pipe, "").await;
            result
        };
        let bridge_fut = host.pipe_to_file(ctx, &pipe, endpoint, append);
        let (write_result, bridge_result) = futures_util::join!(write_fut, bridge_fut);
        let _ = host.pipe_remove(&pipe).await;
        write_result?;
        bridge_result?;
        Ok(())
    }

    /// Write a builtin's stdout/stderr to the context's endpoints.
    pub(crate) async fn emit(
        &self,
        ctx: &ExecContext,
        stdout: &str,
        stderr: &str,
    ) -> Result<(), ExecError> {
        let (out_ep, out_append) = ctx.stdout();
        self.write_endpoint(ctx, &out_ep, out_append, stdout).await?;
        let (err_ep, err_append) = ctx.stderr();
        self.write_endpoint(ctx, &err_ep, err_append, stderr).await?;
        Ok(())
    }

    /// Drain a pipe until EOF.
    pub(crate) async fn drain_pipe(&self, name: &str) -> String {
        let mut out = String::new();
        loop {
            match self.host().pipe_read(name).await {
                Ok(chunk) if chunk.is_empty() => break,
                Ok(chunk) => out.push_str(&chunk),
                Err(_) => break,
            }
        }
        out
    }

    /// Read one delimiter-terminated record from the context's stdin.
    /// Pipe input keeps its unconsumed remainder buffered for the next
    /// read; file input reads the file's first record.
    pub(crate) async fn read_stdin_record(
        &self,
        ctx: &ExecContext,
        delim: char,
    ) -> Result<Option<String>, ExecError> {
        let endpoint = ctx.stdin();
        let host = self.host();
        if host.is_pipe(&endpoint) {
            let mut buf = self
                .stdin_rest
                .borrow_mut()
                .remove(&endpoint)
                .unwrap_or_default();
            loop {
                if let Some(idx) = buf.find(delim) {
                    let rest = buf.split_off(idx + delim.len_utf8());
                    buf.truncate(idx);
                    if !rest.is_empty() {
                        self.stdin_rest.borrow_mut().insert(endpoint, rest);
                    }
                    return Ok(Some(buf));
                }
                let chunk = host.pipe_read(&endpoint).await?;
                if chunk.is_empty() {
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(buf));
                }
                buf.push_str(&chunk);
            }
        }

        // File endpoint: bridge it through a pipe and take the first record.
        let pipe = host.pipe_open().await?;
        let bridge_fut = async {
            let _ = host.pipe_from_file(ctx, &endpoint, &pipe).await;
        };
        let drain_fut = self.drain_pipe(&pipe);
        let ((), content) = futures_util::join!(bridge_fut, drain_fut);
        let _ = host.pipe_remove(&pipe).await;
        if content.is_empty() {
            return Ok(None);
        }
        match content.find(delim) {
            Some(idx) => Ok(Some(content[..idx].to_string())),
            None => Ok(Some(content)),
        }
    }

    /// Run a command body with bridge pipes interposed for any filesystem
    /// endpoints, awaiting the bridges and releasing every pipe afterwards.
    pub(crate) async fn run_bridged<Fut>(
        &self,
        ctx: &ExecContext,
        run: Fut,
    ) -> Result<i32, ExecError>
    where
        Fut: Future<Output = Result<i32, ExecError>>,
    {
        let host = self.host();
        let mut bridge_futs: Vec<LocalBoxFuture<'_, Result<(), HostError>>> = Vec::new();
        let mut out_pipes: Vec<String> = Vec::new();
        let mut stdin_pipe: Option<String> = None;
        let mut created: Vec<String> = Vec::new();

        let stdin_ep = ctx.stdin();
        if !host.is_pipe(&stdin_ep) {
            let pipe = host.pipe_open().await?;
            created.push(pipe.clone());
            stdin_pipe = Some(pipe.clone());
            ctx.set_stdin(pipe.clone());
            let c = ctx.clone();
            bridge_futs.push(
                async move { host.pipe_from_file(&c, &stdin_ep, &pipe).await }.boxed_local(),
            );
        }

        let (stdout_ep, stdout_append) = ctx.stdout();
        if !host.is_pipe(&stdout_ep) {
            let pipe = host.pipe_open().await?;
            created.push(pipe.clone());
            out_pipes.push(pipe.clone());
            ctx.set_stdout(pipe.clone(), false);
            let c = ctx.clone();
            bridge_futs.push(
                async move { host.pipe_to_file(&c, &pipe, &stdout_ep, stdout_append).await }
                    .boxed_local(),
            );
        }

        let (stderr_ep, stderr_append) = ctx.stderr();
        if !host.is_pipe(&stderr_ep) {
            let pipe = host.pipe_open().await?;
            created.push(pipe.clone());
            out_pipes.push(pipe.clone());
            ctx.set_stderr(pipe.clone(), false);
            let c = ctx.clone();
            bridge_futs.push(
                async move { host.pipe_to_file(&c, &pipe, &stderr_ep, stderr_append).await }
                    .boxed_local(),
            );
        }

        if bridge_futs.is_empty() {
            return run.await;
        }

        let run_fut = async {
            let result = run.await;
            // Close outbound bridge pipes so the file bridges see EOF, and
            // tear down the stdin bridge in case its writer is still
            // blocked on an unread file.
            for pipe in &out_pipes {
                let _ = host.pipe_close(pipe).await;
            }
            if let Some(pipe) = &stdin_pipe {
                let _ = host.pipe_remove(pipe).await;
            }
            result
        };

        let (result, _bridge_results) = futures_util::join!(run_fut, join_all(bridge_futs));
        for pipe in &created {
            let _ = host.pipe_remove(pipe).await;
        }
        result
    }

    /// Execute a pipeline of N stages concurrently (spec'd orchestration:
    /// N-1 connecting pipes, EOF on completion, teardown guaranteed, last
    /// stage's status wins).
    pub(crate) async fn exec_pipeline(
        &self,
        ctx: &ExecContext,
        pipeline: &Pipeline,
    ) -> Result<i32, ExecError> {
        let n = pipeline.commands.len();
        if n == 0 {
            return Ok(0);
        }
        if n == 1 {
            return self.exec_node(ctx.spawn_child(), &pipeline.commands[0]).await;
        }

        let host = self.host();
        let mut pipes: Vec<String> = Vec::with_capacity(n - 1);
        for _ in 1..n {
            pipes.push(host.pipe_open().await?);
        }

        let mut stage_futs: Vec<LocalBoxFuture<'_, Result<i32, ExecError>>> = Vec::new();
        for (i, node) in pipeline.commands.iter().enumerate() {
            let stage_ctx = ctx.spawn_child();
            if i > 0 {
                stage_ctx.set_stdin(pipes[i - 1].clone());
            }
            let out_pipe = if i < n - 1 {
                stage_ctx.set_stdout(pipes[i].clone(), false);
                Some(pipes[i].clone())
            } else {
                None
            };
            stage_futs.push(
                async move {
                    let result = self.exec_node(stage_ctx, node).await;
                    if let Some(pipe) = out_pipe {
                        let _ = host.pipe_write(&pipe, "").await;
                    }
                    result
                }
                .boxed_local(),
            );
        }

        let mut results = join_all(stage_futs).await;
        for pipe in &pipes {
            let _ = host.pipe_remove(pipe).await;
        }

        let last = results.pop().expect("pipeline has stages");
        match last {
            Err(e) => Err(e),
            Ok(code) => {
                // An exit or return raised in an earlier stage still
                // terminates the surrounding frame.
                for result in results {
                    if let Err(e) = result {
                        if e.is_control_flow() {
                            return Err(e);
                        }
                    }
                }
                Ok(code)
            }
        }
    }
}
