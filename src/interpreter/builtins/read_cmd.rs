//! read - Read a record from stdin into variables
//!
//! Options: -p prompt (written to stderr), -d delimiter, -r (raw, keep
//! backslashes), -s (silent; no echo happens here anyway), -n nchars.
//! The record splits on IFS across the named variables, the last variable
//! taking the remainder; with no names everything lands in REPLY.

use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

pub(crate) async fn run(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let mut delim = '\n';
    let mut raw = false;
    let mut nchars: Option<usize> = None;
    let mut prompt = String::new();
    let mut names: Vec<String> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-r" => raw = true,
            "-s" => {}
            "-p" => {
                prompt = iter.next().cloned().unwrap_or_default();
            }
            "-d" => {
                let d = iter.next().cloned().unwrap_or_default();
                delim = d.chars().next().unwrap_or('\0');
            }
            "-n" => match iter.next().and_then(|v| v.parse::<usize>().ok()) {
                Some(n) => nchars = Some(n),
                None => {
                    return Ok(BuiltinOutput::usage(
                        "bash: read: -n: numeric argument required\n",
                    ))
                }
            },
            _ => names.push(arg.clone()),
        }
    }

    let record = exec.read_stdin_record(ctx, delim).await?;
    let Some(mut record) = record else {
        // EOF with nothing read.
        return Ok(BuiltinOutput {
            code: 1,
            stdout: String::new(),
            stderr: prompt,
        });
    };
    if let Some(n) = nchars {
        record = record.chars().take(n).collect();
    }
    if !raw {
        record = strip_backslashes(&record);
    }

    let mut stderr_out = prompt;
    let mut code = 0;

    if names.is_empty() {
        if let Err(e) = ctx.set_param("REPLY", Some(record)) {
            stderr_out.push_str(&format!("bash: read: {}\n", e));
            code = 1;
        }
        return Ok(BuiltinOutput {
            code,
            stdout: String::new(),
            stderr: stderr_out,
        });
    }

    let fields = split_record(&record, &ctx.ifs(), names.len());
    for (i, name) in names.iter().enumerate() {
        let value = fields.get(i).cloned().unwrap_or_default();
        if let Err(e) = ctx.set_param(name, Some(value)) {
            stderr_out.push_str(&format!("bash: read: {}\n", e));
            code = 1;
        }
    }

    Ok(BuiltinOutput {
        code,
        stdout: String::new(),
        stderr: stderr_out,
    })
}

/// Remove backslash escapes (non-raw mode).
fn strip_backslashes(s: &str) -> String {
    let mut out = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// IFS split with the last variable receiving the remainder.
fn split_record(record: &str, ifs: &str, nvars: usize) -> Vec<String> {
    if ifs.is_empty() || nvars <= 1 {
        return vec![record.trim_matches(|c: char| ifs.contains(c)).to_string()];
    }
    let is_ifs = |c: char| ifs.contains(c);
    let trimmed = record.trim_matches(is_ifs);
    let mut fields: Vec<String> = Vec::new();
    let mut rest = trimmed;
    while fields.len() < nvars - 1 {
        match rest.find(is_ifs) {
            Some(idx) => {
                fields.push(rest[..idx].to_string());
                rest = rest[idx..].trim_start_matches(is_ifs);
            }
            None => break,
        }
    }
    fields.push(rest.to_string());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryShell, ShellHost};
    use std::rc::Rc;

    async fn make_with_stdin(input: &str) -> (Executor, ExecContext) {
        let shell = Rc::new(MemoryShell::new());
        let pipe = shell.pipe_open().await.unwrap();
        shell.pipe_write(&pipe, input).await.unwrap();
        shell.pipe_write(&pipe, "").await.unwrap();
        let exec = Executor::new(shell);
        let ctx = ExecContext::new_root("/");
        ctx.set_stdin(pipe);
        (exec, ctx)
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_record() {
        assert_eq!(split_record("a b c", " \t\n", 2), vec!["a", "b c"]);
        assert_eq!(split_record("a b c", " \t\n", 3), vec!["a", "b", "c"]);
        assert_eq!(split_record("  a  ", " \t\n", 1), vec!["a"]);
    }

    #[test]
    fn test_strip_backslashes() {
        assert_eq!(strip_backslashes("a\\ b"), "a b");
        assert_eq!(strip_backslashes("plain"), "plain");
    }

    #[tokio::test]
    async fn test_read_into_reply() {
        let (exec, ctx) = make_with_stdin("hello world\n").await;
        let out = run(&exec, &ctx, &[]).await.unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(ctx.get_param("REPLY"), Some("hello world".to_string()));
    }

    #[tokio::test]
    async fn test_read_multiple_vars() {
        let (exec, ctx) = make_with_stdin("one two three four\n").await;
        run(&exec, &ctx, &args(&["a", "b"])).await.unwrap();
        assert_eq!(ctx.get_param("a"), Some("one".to_string()));
        assert_eq!(ctx.get_param("b"), Some("two three four".to_string()));
    }

    #[tokio::test]
    async fn test_read_consecutive_lines() {
        let (exec, ctx) = make_with_stdin("first\nsecond\n").await;
        run(&exec, &ctx, &args(&["x"])).await.unwrap();
        assert_eq!(ctx.get_param("x"), Some("first".to_string()));
        run(&exec, &ctx, &args(&["x"])).await.unwrap();
        assert_eq!(ctx.get_param("x"), Some("second".to_string()));
    }

    #[tokio::test]
    async fn test_read_eof_returns_one() {
        let (exec, ctx) = make_with_stdin("").await;
        let out = run(&exec, &ctx, &args(&["x"])).await.unwrap();
        assert_eq!(out.code, 1);
    }

    #[tokio::test]
    async fn test_read_custom_delimiter() {
        let (exec, ctx) = make_with_stdin("a:b\n").await;
        run(&exec, &ctx, &args(&["-d", ":", "x"])).await.unwrap();
        assert_eq!(ctx.get_param("x"), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_read_nchars() {
        let (exec, ctx) = make_with_stdin("abcdef\n").await;
        run(&exec, &ctx, &args(&["-n", "3", "x"])).await.unwrap();
        assert_eq!(ctx.get_param("x"), Some("abc".to_string()));
    }

    #[tokio::test]
    async fn test_read_prompt_goes_to_stderr() {
        let (exec, ctx) = make_with_stdin("v\n").await;
        let out = run(&exec, &ctx, &args(&["-p", "? ", "x"])).await.unwrap();
        assert_eq!(out.stderr, "? ");
    }
}
