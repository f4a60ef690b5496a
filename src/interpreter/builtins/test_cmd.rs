//! test / [ - POSIX conditional evaluator over argv
//!
//! Full operator set: unary string and file tests, binary string equality
//! (exact, no patterns - unlike [[ ]]), numeric comparisons, file
//! comparisons, `!`, parenthesized grouping, and -a/-o with lower
//! precedence than the unary/binary operators. `[` requires a closing `]`.

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;

use crate::context::ExecContext;
use crate::host::PathTest;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

#[derive(Debug, Clone)]
enum TestExpr {
    Or(Box<TestExpr>, Box<TestExpr>),
    And(Box<TestExpr>, Box<TestExpr>),
    Not(Box<TestExpr>),
    Unary(String, String),
    Binary(String, String, String),
    Word(String),
}

pub(crate) async fn run_test(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    run(exec, ctx, args, false).await
}

pub(crate) async fn run_bracket(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    run(exec, ctx, args, true).await
}

pub(crate) async fn run(
    exec: &Executor,
    ctx: &ExecContext,
    args: &[String],
    bracket: bool,
) -> Result<BuiltinOutput, ExecError> {
    let mut args: Vec<String> = args.to_vec();
    if bracket {
        match args.pop() {
            Some(last) if last == "]" => {}
            _ => {
                return Ok(BuiltinOutput::usage("bash: [: missing `]'\n"));
            }
        }
    }

    // No expression is false, a single word tests non-emptiness.
    if args.is_empty() {
        return Ok(BuiltinOutput::code(1));
    }

    let mut pos = 0usize;
    let expr = match parse_or(&args, &mut pos) {
        Some(expr) if pos == args.len() => expr,
        _ => {
            return Ok(BuiltinOutput::usage(format!(
                "bash: test: {}: syntax error\n",
                args.get(pos).map(|s| s.as_str()).unwrap_or("(end)")
            )));
        }
    };

    let truth = eval(exec, ctx, &expr).await;
    Ok(BuiltinOutput::code(if truth { 0 } else { 1 }))
}

fn parse_or(args: &[String], pos: &mut usize) -> Option<TestExpr> {
    let mut left = parse_and(args, pos)?;
    while args.get(*pos).map(|s| s.as_str()) == Some("-o") {
        *pos += 1;
        let right = parse_and(args, pos)?;
        left = TestExpr::Or(Box::new(left), Box::new(right));
    }
    Some(left)
}

fn parse_and(args: &[String], pos: &mut usize) -> Option<TestExpr> {
    let mut left = parse_not(args, pos)?;
    while args.get(*pos).map(|s| s.as_str()) == Some("-a") {
        *pos += 1;
        let right = parse_not(args, pos)?;
        left = TestExpr::And(Box::new(left), Box::new(right));
    }
    Some(left)
}

fn parse_not(args: &[String], pos: &mut usize) -> Option<TestExpr> {
    if args.get(*pos).map(|s| s.as_str()) == Some("!") {
        *pos += 1;
        let inner = parse_not(args, pos)?;
        return Some(TestExpr::Not(Box::new(inner)));
    }
    parse_primary(args, pos)
}

fn is_unary_op(s: &str) -> bool {
    matches!(
        s,
        "-z" | "-n"
            | "-e" | "-f" | "-d" | "-r" | "-w" | "-x" | "-s" | "-L" | "-h" | "-b" | "-c" | "-p"
            | "-S" | "-g" | "-u" | "-k" | "-O" | "-G" | "-N" | "-t" | "-v"
    )
}

fn is_binary_op(s: &str) -> bool {
    matches!(
        s,
        "=" | "==" | "!=" | "<" | ">" | "-eq" | "-ne" | "-lt" | "-le" | "-gt" | "-ge" | "-nt"
            | "-ot" | "-ef"
    )
}

fn parse_primary(args: &[String], pos: &mut usize) -> Option<TestExpr> {
    let token = args.get(*pos)?.clone();

    if token == "(" {
        *pos += 1;
        let inner = parse_or(args, pos)?;
        if args.get(*pos).map(|s| s.as_str()) != Some(")") {
            return None;
        }
        *pos += 1;
        return Some(inner);
    }

    // Binary form wins when an operator follows (POSIX three-argument rule).
    if let Some(op) = args.get(*pos + 1) {
        if is_binary_op(op) && args.get(*pos + 2).is_some() {
            let left = token;
            let op = op.clone();
            let right = args[*pos + 2].clone();
            *pos += 3;
            return Some(TestExpr::Binary(op, left, right));
        }
    }

    if is_unary_op(&token) {
        if let Some(operand) = args.get(*pos + 1) {
            let operand = operand.clone();
            *pos += 2;
            return Some(TestExpr::Unary(token, operand));
        }
    }

    *pos += 1;
    Some(TestExpr::Word(token))
}

fn eval<'a>(
    exec: &'a Executor,
    ctx: &'a ExecContext,
    expr: &'a TestExpr,
) -> LocalBoxFuture<'a, bool> {
    async move {
        match expr {
            TestExpr::Or(l, r) => eval(exec, ctx, l).await || eval(exec, ctx, r).await,
            TestExpr::And(l, r) => eval(exec, ctx, l).await && eval(exec, ctx, r).await,
            TestExpr::Not(inner) => !eval(exec, ctx, inner).await,
            TestExpr::Word(s) => !s.is_empty(),
            TestExpr::Unary(op, operand) => match op.as_str() {
                "-z" => operand.is_empty(),
                "-n" => !operand.is_empty(),
                "-v" => ctx.get_var(operand).is_some(),
                file_op => {
                    let test = match file_op {
                        "-e" => PathTest::Exists,
                        "-f" => PathTest::RegularFile,
                        "-d" => PathTest::Directory,
                        "-r" => PathTest::Readable,
                        "-w" => PathTest::Writable,
                        "-x" => PathTest::Executable,
                        "-s" => PathTest::NonEmpty,
                        "-L" | "-h" => PathTest::Symlink,
                        "-b" => PathTest::BlockDevice,
                        "-c" => PathTest::CharDevice,
                        "-p" => PathTest::NamedPipe,
                        "-S" => PathTest::Socket,
                        "-g" => PathTest::Setgid,
                        "-u" => PathTest::Setuid,
                        "-k" => PathTest::Sticky,
                        "-O" => PathTest::OwnedByEuid,
                        "-G" => PathTest::OwnedByEgid,
                        "-N" => PathTest::ModifiedSinceLastRead,
                        "-t" => PathTest::FdIsTerminal,
                        _ => return false,
                    };
                    exec.host().test_path(ctx, test, operand, None).await
                }
            },
            TestExpr::Binary(op, left, right) => match op.as_str() {
                "=" | "==" => left == right,
                "!=" => left != right,
                "<" => left < right,
                ">" => left > right,
                "-eq" => num(left) == num(right),
                "-ne" => num(left) != num(right),
                "-lt" => num(left) < num(right),
                "-le" => num(left) <= num(right),
                "-gt" => num(left) > num(right),
                "-ge" => num(left) >= num(right),
                "-nt" => exec.host().test_path(ctx, PathTest::NewerThan, left, Some(right)).await,
                "-ot" => exec.host().test_path(ctx, PathTest::OlderThan, left, Some(right)).await,
                "-ef" => {
                    exec.host()
                        .test_path(ctx, PathTest::SameDeviceAndInode, left, Some(right))
                        .await
                }
                _ => false,
            },
        }
    }
    .boxed_local()
}

fn num(s: &str) -> i64 {
    s.trim().parse::<i64>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryShell;
    use std::rc::Rc;

    fn make() -> (Executor, ExecContext, Rc<MemoryShell>) {
        let shell = Rc::new(MemoryShell::new());
        let exec = Executor::new(shell.clone());
        let ctx = ExecContext::new_root("/home/user");
        (exec, ctx, shell)
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn check(items: &[&str]) -> i32 {
        let (exec, ctx, shell) = make();
        shell.add_file("/home/user/f.txt", "data");
        run(&exec, &ctx, &args(items), false).await.unwrap().code
    }

    #[tokio::test]
    async fn test_string_tests() {
        assert_eq!(check(&["-z", ""]).await, 0);
        assert_eq!(check(&["-z", "x"]).await, 1);
        assert_eq!(check(&["-n", "x"]).await, 0);
        assert_eq!(check(&["abc", "=", "abc"]).await, 0);
        assert_eq!(check(&["abc", "!=", "abc"]).await, 1);
        assert_eq!(check(&["a", "<", "b"]).await, 0);
    }

    #[tokio::test]
    async fn test_equality_is_exact_not_glob() {
        assert_eq!(check(&["file.txt", "=", "*.txt"]).await, 1);
    }

    #[tokio::test]
    async fn test_numeric_tests() {
        assert_eq!(check(&["3", "-eq", "3"]).await, 0);
        assert_eq!(check(&["3", "-lt", "5"]).await, 0);
        assert_eq!(check(&["5", "-le", "4"]).await, 1);
        assert_eq!(check(&["junk", "-eq", "0"]).await, 0);
    }

    #[tokio::test]
    async fn test_file_tests() {
        assert_eq!(check(&["-f", "f.txt"]).await, 0);
        assert_eq!(check(&["-d", "/tmp"]).await, 0);
        assert_eq!(check(&["-e", "missing"]).await, 1);
        assert_eq!(check(&["-s", "f.txt"]).await, 0);
    }

    #[tokio::test]
    async fn test_single_word() {
        assert_eq!(check(&["nonempty"]).await, 0);
        assert_eq!(check(&[""]).await, 1);
    }

    #[tokio::test]
    async fn test_negation_and_connectives() {
        assert_eq!(check(&["!", "-z", "x"]).await, 0);
        assert_eq!(check(&["-n", "x", "-a", "-z", ""]).await, 0);
        assert_eq!(check(&["-z", "x", "-o", "-n", "y"]).await, 0);
        assert_eq!(check(&["-z", "x", "-a", "-n", "y"]).await, 1);
    }

    #[tokio::test]
    async fn test_parens_grouping() {
        assert_eq!(check(&["(", "-z", "", "-o", "-z", "x", ")", "-a", "-n", "y"]).await, 0);
    }

    #[tokio::test]
    async fn test_empty_is_false() {
        let (exec, ctx, _shell) = make();
        let out = run(&exec, &ctx, &[], false).await.unwrap();
        assert_eq!(out.code, 1);
    }

    #[tokio::test]
    async fn test_bracket_requires_close() {
        let (exec, ctx, _shell) = make();
        let out = run(&exec, &ctx, &args(&["-n", "x"]), true).await.unwrap();
        assert_eq!(out.code, 2);
        let out = run(&exec, &ctx, &args(&["-n", "x", "]"]), true).await.unwrap();
        assert_eq!(out.code, 0);
    }

    #[tokio::test]
    async fn test_var_set() {
        let (exec, ctx, _shell) = make();
        ctx.set_param("SET_VAR", Some("1".to_string())).unwrap();
        let out = run(&exec, &ctx, &args(&["-v", "SET_VAR"]), false).await.unwrap();
        assert_eq!(out.code, 0);
        let out = run(&exec, &ctx, &args(&["-v", "UNSET_VAR"]), false).await.unwrap();
        assert_eq!(out.code, 1);
    }
}
