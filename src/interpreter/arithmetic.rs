//! Arithmetic Evaluation
//!
//! Integer-only semantics over the arithmetic AST. Identifiers read from
//! the params-over-env view and parse base-10, defaulting to 0 when missing
//! or malformed. Division and modulo by zero yield 0 rather than an error.
//! Assignments write to params (executor call sites) or env (the `let`
//! builtin), selected by the caller.

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;

use crate::ast::types::{ArithAssignOp, ArithBinaryOp, ArithExpr, ArithUnaryOp, LogicalOp};
use crate::context::ExecContext;

use super::errors::ExecError;
use super::executor::Executor;
use super::expansion::command_subst;

/// Where arithmetic assignments land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignTarget {
    Params,
    Env,
}

/// Parse a shell value as a base-10 integer, defaulting to 0.
pub fn parse_int_or_zero(value: &str) -> i64 {
    value.trim().parse::<i64>().unwrap_or(0)
}

pub(crate) async fn evaluate(
    exec: &Executor,
    ctx: &ExecContext,
    expr: &ArithExpr,
    target: AssignTarget,
) -> Result<i64, ExecError> {
    eval(exec, ctx, expr, target).await
}

fn eval<'a>(
    exec: &'a Executor,
    ctx: &'a ExecContext,
    expr: &'a ArithExpr,
    target: AssignTarget,
) -> LocalBoxFuture<'a, Result<i64, ExecError>> {
    async move {
        match expr {
            ArithExpr::Number(n) => Ok(*n),
            ArithExpr::Identifier(name) => Ok(read_var(ctx, name)),
            ArithExpr::Unary { op, operand } => {
                let v = eval(exec, ctx, operand, target).await?;
                Ok(match op {
                    ArithUnaryOp::Minus => v.wrapping_neg(),
                    ArithUnaryOp::Plus => v,
                    ArithUnaryOp::Not => (v == 0) as i64,
                    ArithUnaryOp::BitNot => !v,
                })
            }
            ArithExpr::Binary { op, left, right } => {
                let l = eval(exec, ctx, left, target).await?;
                let r = eval(exec, ctx, right, target).await?;
                Ok(apply_binary(*op, l, r))
            }
            ArithExpr::Logical { op, left, right } => {
                let l = eval(exec, ctx, left, target).await?;
                match op {
                    LogicalOp::And => {
                        if l == 0 {
                            return Ok(0);
                        }
                        let r = eval(exec, ctx, right, target).await?;
                        Ok((r != 0) as i64)
                    }
                    LogicalOp::Or => {
                        if l != 0 {
                            return Ok(1);
                        }
                        let r = eval(exec, ctx, right, target).await?;
                        Ok((r != 0) as i64)
                    }
                }
            }
            ArithExpr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                let c = eval(exec, ctx, cond, target).await?;
                if c != 0 {
                    eval(exec, ctx, then, target).await
                } else {
                    eval(exec, ctx, otherwise, target).await
                }
            }
            ArithExpr::Sequence(items) => {
                let mut last = 0;
                for item in items {
                    last = eval(exec, ctx, item, target).await?;
                }
                Ok(last)
            }
            ArithExpr::Assignment { op, name, value } => {
                let rhs = eval(exec, ctx, value, target).await?;
                let result = match op {
                    ArithAssignOp::Assign => rhs,
                    ArithAssignOp::Add => read_var(ctx, name).wrapping_add(rhs),
                    ArithAssignOp::Sub => read_var(ctx, name).wrapping_sub(rhs),
                    ArithAssignOp::Mul => read_var(ctx, name).wrapping_mul(rhs),
                    ArithAssignOp::Div => safe_div(read_var(ctx, name), rhs),
                    ArithAssignOp::Mod => safe_mod(read_var(ctx, name), rhs),
                    ArithAssignOp::BitAnd => read_var(ctx, name) & rhs,
                    ArithAssignOp::BitOr => read_var(ctx, name) | rhs,
                    ArithAssignOp::BitXor => read_var(ctx, name) ^ rhs,
                    ArithAssignOp::Shl => shift_left(read_var(ctx, name), rhs),
                    ArithAssignOp::Shr => shift_right(read_var(ctx, name), rhs),
                };
                write_var(ctx, name, result, target)?;
                Ok(result)
            }
            ArithExpr::Update {
                increment,
                name,
                prefix,
            } => {
                let old = read_var(ctx, name);
                let new = if *increment {
                    old.wrapping_add(1)
                } else {
                    old.wrapping_sub(1)
                };
                write_var(ctx, name, new, target)?;
                Ok(if *prefix { new } else { old })
            }
            ArithExpr::CommandSubstitution { script } => {
                let (output, _status) = command_subst::run(exec, ctx, script).await?;
                Ok(parse_int_or_zero(&output))
            }
        }
    }
    .boxed_local()
}

fn read_var(ctx: &ExecContext, name: &str) -> i64 {
    ctx.get_var(name)
        .map(|v| parse_int_or_zero(&v))
        .unwrap_or(0)
}

fn write_var(
    ctx: &ExecContext,
    name: &str,
    value: i64,
    target: AssignTarget,
) -> Result<(), ExecError> {
    match target {
        AssignTarget::Params => ctx.set_param(name, Some(value.to_string()))?,
        AssignTarget::Env => ctx.set_env(name, Some(value.to_string()))?,
    }
    Ok(())
}

fn apply_binary(op: ArithBinaryOp, l: i64, r: i64) -> i64 {
    match op {
        ArithBinaryOp::Add => l.wrapping_add(r),
        ArithBinaryOp::Sub => l.wrapping_sub(r),
        ArithBinaryOp::Mul => l.wrapping_mul(r),
        ArithBinaryOp::Div => safe_div(l, r),
        ArithBinaryOp::Mod => safe_mod(l, r),
        ArithBinaryOp::Pow => int_pow(l, r),
        ArithBinaryOp::BitAnd => l & r,
        ArithBinaryOp::BitOr => l | r,
        ArithBinaryOp::BitXor => l ^ r,
        ArithBinaryOp::Shl => shift_left(l, r),
        ArithBinaryOp::Shr => shift_right(l, r),
        ArithBinaryOp::Lt => (l < r) as i64,
        ArithBinaryOp::Gt => (l > r) as i64,
        ArithBinaryOp::Le => (l <= r) as i64,
        ArithBinaryOp::Ge => (l >= r) as i64,
        ArithBinaryOp::Eq => (l == r) as i64,
        ArithBinaryOp::Ne => (l != r) as i64,
    }
}

/// Division by zero yields 0, not an error.
fn safe_div(l: i64, r: i64) -> i64 {
    if r == 0 {
        0
    } else {
        l.wrapping_div(r)
    }
}

fn safe_mod(l: i64, r: i64) -> i64 {
    if r == 0 {
        0
    } else {
        l.wrapping_rem(r)
    }
}

/// Integer exponentiation; negative exponents yield 0.
fn int_pow(base: i64, exp: i64) -> i64 {
    if exp < 0 {
        return 0;
    }
    let mut result: i64 = 1;
    let mut base = base;
    let mut exp = exp as u64;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    result
}

fn shift_left(l: i64, r: i64) -> i64 {
    l.wrapping_shl((r & 63) as u32)
}

fn shift_right(l: i64, r: i64) -> i64 {
    l.wrapping_shr((r & 63) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_or_zero() {
        assert_eq!(parse_int_or_zero("42"), 42);
        assert_eq!(parse_int_or_zero(" -7 "), -7);
        assert_eq!(parse_int_or_zero("abc"), 0);
        assert_eq!(parse_int_or_zero(""), 0);
        assert_eq!(parse_int_or_zero("0x10"), 0);
    }

    #[test]
    fn test_safe_div_mod() {
        assert_eq!(safe_div(10, 3), 3);
        assert_eq!(safe_div(10, 0), 0);
        assert_eq!(safe_mod(10, 3), 1);
        assert_eq!(safe_mod(10, 0), 0);
    }

    #[test]
    fn test_int_pow() {
        assert_eq!(int_pow(2, 10), 1024);
        assert_eq!(int_pow(3, 0), 1);
        assert_eq!(int_pow(2, -1), 0);
        assert_eq!(int_pow(-2, 3), -8);
    }

    #[test]
    fn test_comparisons_yield_bool_ints() {
        assert_eq!(apply_binary(ArithBinaryOp::Lt, 1, 2), 1);
        assert_eq!(apply_binary(ArithBinaryOp::Ge, 1, 2), 0);
        assert_eq!(apply_binary(ArithBinaryOp::Eq, 5, 5), 1);
    }

    #[test]
    fn test_shifts() {
        assert_eq!(apply_binary(ArithBinaryOp::Shl, 1, 4), 16);
        assert_eq!(apply_binary(ArithBinaryOp::Shr, 16, 4), 1);
    }
}
