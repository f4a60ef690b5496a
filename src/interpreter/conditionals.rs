//! Conditional Expression Evaluation
//!
//! Evaluates `[[ ]]` expressions. Unlike regular word contexts this does no
//! word splitting and no path expansion: every operand expands to a single
//! scalar. File tests delegate to the host facade; `==`/`!=` treat the
//! right side as a glob pattern; `=~` compiles the right side as a regex
//! and an invalid regex is simply false.

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use regex_lite::Regex;

use crate::ast::types::{CondBinaryOp, CondExpr, CondUnaryOp, LogicalOp, Word};
use crate::context::ExecContext;
use crate::host::PathTest;

use super::errors::ExecError;
use super::executor::Executor;
use super::expansion;
use super::pattern::glob_match;

pub(crate) async fn evaluate(
    exec: &Executor,
    ctx: &ExecContext,
    expr: &CondExpr,
) -> Result<bool, ExecError> {
    eval(exec, ctx, expr).await
}

fn eval<'a>(
    exec: &'a Executor,
    ctx: &'a ExecContext,
    expr: &'a CondExpr,
) -> LocalBoxFuture<'a, Result<bool, ExecError>> {
    async move {
        match expr {
            CondExpr::Word(word) => {
                let value = scalar(exec, ctx, word).await?;
                Ok(!value.is_empty())
            }
            CondExpr::Negation(inner) => Ok(!eval(exec, ctx, inner).await?),
            CondExpr::Logical { op, left, right } => match op {
                LogicalOp::And => {
                    if !eval(exec, ctx, left).await? {
                        return Ok(false);
                    }
                    eval(exec, ctx, right).await
                }
                LogicalOp::Or => {
                    if eval(exec, ctx, left).await? {
                        return Ok(true);
                    }
                    eval(exec, ctx, right).await
                }
            },
            CondExpr::Unary { op, operand } => eval_unary(exec, ctx, *op, operand).await,
            CondExpr::Binary { op, left, right } => eval_binary(exec, ctx, *op, left, right).await,
        }
    }
    .boxed_local()
}

async fn scalar(exec: &Executor, ctx: &ExecContext, word: &Word) -> Result<String, ExecError> {
    let (value, _status) = expansion::expand_scalar(exec, ctx, word).await?;
    Ok(value)
}

async fn eval_unary(
    exec: &Executor,
    ctx: &ExecContext,
    op: CondUnaryOp,
    operand: &Word,
) -> Result<bool, ExecError> {
    let value = scalar(exec, ctx, operand).await?;
    let result = match op {
        CondUnaryOp::StringEmpty => value.is_empty(),
        CondUnaryOp::StringNonEmpty => !value.is_empty(),
        CondUnaryOp::VarSet => ctx.get_var(&value).is_some(),
        file_test => {
            let op = path_test_for(file_test);
            exec.host().test_path(ctx, op, &value, None).await
        }
    };
    Ok(result)
}

fn path_test_for(op: CondUnaryOp) -> PathTest {
    match op {
        CondUnaryOp::Exists => PathTest::Exists,
        CondUnaryOp::RegularFile => PathTest::RegularFile,
        CondUnaryOp::Directory => PathTest::Directory,
        CondUnaryOp::Readable => PathTest::Readable,
        CondUnaryOp::Writable => PathTest::Writable,
        CondUnaryOp::Executable => PathTest::Executable,
        CondUnaryOp::NonEmpty => PathTest::NonEmpty,
        CondUnaryOp::Symlink => PathTest::Symlink,
        CondUnaryOp::BlockDevice => PathTest::BlockDevice,
        CondUnaryOp::CharDevice => PathTest::CharDevice,
        CondUnaryOp::NamedPipe => PathTest::NamedPipe,
        CondUnaryOp::Socket => PathTest::Socket,
        CondUnaryOp::Setgid => PathTest::Setgid,
        CondUnaryOp::Setuid => PathTest::Setuid,
        CondUnaryOp::Sticky => PathTest::Sticky,
        CondUnaryOp::OwnedByEuid => PathTest::OwnedByEuid,
        CondUnaryOp::OwnedByEgid => PathTest::OwnedByEgid,
        CondUnaryOp::ModifiedSinceRead => PathTest::ModifiedSinceLastRead,
        CondUnaryOp::FdIsTerminal => PathTest::FdIsTerminal,
        CondUnaryOp::StringEmpty | CondUnaryOp::StringNonEmpty | CondUnaryOp::VarSet => {
            PathTest::Exists
        }
    }
}

async fn eval_binary(
    exec: &Executor,
    ctx: &ExecContext,
    op: CondBinaryOp,
    left: &Word,
    right: &Word,
) -> Result<bool, ExecError> {
    let l = scalar(exec, ctx, left).await?;
    let r = scalar(exec, ctx, right).await?;
    let result = match op {
        CondBinaryOp::Match => glob_match(&l, &r),
        CondBinaryOp::NotMatch => !glob_match(&l, &r),
        CondBinaryOp::Regex => match Regex::new(&r) {
            Ok(re) => re.is_match(&l),
            // Invalid regex is false, not an error.
            Err(_) => false,
        },
        CondBinaryOp::StringLt => l < r,
        CondBinaryOp::StringGt => l > r,
        CondBinaryOp::NumEq => to_num(&l) == to_num(&r),
        CondBinaryOp::NumNe => to_num(&l) != to_num(&r),
        CondBinaryOp::NumLt => to_num(&l) < to_num(&r),
        CondBinaryOp::NumLe => to_num(&l) <= to_num(&r),
        CondBinaryOp::NumGt => to_num(&l) > to_num(&r),
        CondBinaryOp::NumGe => to_num(&l) >= to_num(&r),
        CondBinaryOp::NewerThan => {
            exec.host().test_path(ctx, PathTest::NewerThan, &l, Some(&r)).await
        }
        CondBinaryOp::OlderThan => {
            exec.host().test_path(ctx, PathTest::OlderThan, &l, Some(&r)).await
        }
        CondBinaryOp::SameFile => {
            exec.host()
                .test_path(ctx, PathTest::SameDeviceAndInode, &l, Some(&r))
                .await
        }
    };
    Ok(result)
}

/// Base-10 parse with missing or malformed values reading as 0.
fn to_num(s: &str) -> i64 {
    s.trim().parse::<i64>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_num() {
        assert_eq!(to_num("5"), 5);
        assert_eq!(to_num(" -3"), -3);
        assert_eq!(to_num("junk"), 0);
        assert_eq!(to_num(""), 0);
    }

    #[test]
    fn test_path_test_mapping() {
        assert_eq!(path_test_for(CondUnaryOp::RegularFile), PathTest::RegularFile);
        assert_eq!(path_test_for(CondUnaryOp::Symlink), PathTest::Symlink);
        assert_eq!(path_test_for(CondUnaryOp::FdIsTerminal), PathTest::FdIsTerminal);
    }
}
