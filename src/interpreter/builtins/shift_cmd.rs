//! shift - Shift positional parameters left
//!
//! shift [n]: $n+1 becomes $1 and $# drops by n (default 1). A count
//! larger than $# fails without mutating anything.

use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

pub(crate) async fn run(
    _exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let n: i64 = match args.first() {
        None => 1,
        Some(arg) => match arg.parse::<i64>() {
            Ok(n) if n >= 0 => n,
            _ => {
                return Ok(BuiltinOutput::failure(format!(
                    "bash: shift: {}: numeric argument required\n",
                    arg
                )))
            }
        },
    };

    let current = ctx.positional_args();
    if n as usize > current.len() {
        return Ok(BuiltinOutput::failure("bash: shift: shift count out of range\n"));
    }
    if n == 0 {
        return Ok(BuiltinOutput::ok());
    }

    let remaining: Vec<String> = current.into_iter().skip(n as usize).collect();
    if let Err(e) = ctx.replace_positional(&remaining) {
        return Ok(BuiltinOutput::failure(format!("bash: shift: {}\n", e)));
    }
    Ok(BuiltinOutput::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryShell;
    use std::rc::Rc;

    fn make_with_params(params: &[&str]) -> (Executor, ExecContext) {
        let exec = Executor::new(Rc::new(MemoryShell::new()));
        let ctx = ExecContext::new_root("/");
        let args: Vec<String> = params.iter().map(|s| s.to_string()).collect();
        ctx.replace_positional(&args).unwrap();
        (exec, ctx)
    }

    #[tokio::test]
    async fn test_shift_default() {
        let (exec, ctx) = make_with_params(&["a", "b", "c"]);
        let out = run(&exec, &ctx, &[]).await.unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(ctx.get_param("1"), Some("b".to_string()));
        assert_eq!(ctx.get_param("#"), Some("2".to_string()));
        assert_eq!(ctx.get_param("3"), None);
    }

    #[tokio::test]
    async fn test_shift_by_n() {
        let (exec, ctx) = make_with_params(&["a", "b", "c", "d"]);
        run(&exec, &ctx, &["2".to_string()]).await.unwrap();
        assert_eq!(ctx.get_param("1"), Some("c".to_string()));
        assert_eq!(ctx.get_param("#"), Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_shift_all_leaves_none() {
        let (exec, ctx) = make_with_params(&["a", "b", "c"]);
        run(&exec, &ctx, &["3".to_string()]).await.unwrap();
        assert_eq!(ctx.get_param("#"), Some("0".to_string()));
        assert_eq!(ctx.get_param("1"), None);
    }

    #[tokio::test]
    async fn test_shift_out_of_range() {
        let (exec, ctx) = make_with_params(&["a"]);
        let out = run(&exec, &ctx, &["5".to_string()]).await.unwrap();
        assert_eq!(out.code, 1);
        assert_eq!(ctx.get_param("1"), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_shift_invalid_count() {
        let (exec, ctx) = make_with_params(&["a"]);
        let out = run(&exec, &ctx, &["x".to_string()]).await.unwrap();
        assert_eq!(out.code, 1);
        assert!(out.stderr.contains("numeric argument required"));
    }
}
