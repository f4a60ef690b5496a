//! Expansion Engine
//!
//! Turns a word into its final field list: expansions are spliced into the
//! raw text by original byte span, tilde is resolved through the host,
//! the result is unquoted and IFS-split, and path expansion is delegated
//! to the host last.

pub mod command_subst;
pub mod replace;
pub mod unquote;

use crate::ast::types::{ExpansionKind, Word};
use crate::context::ExecContext;
use crate::interpreter::arithmetic::{self, AssignTarget};
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;
use crate::interpreter::pattern::has_glob_chars;

use replace::ReplaceString;

/// Field list plus the status code of the expansion. A non-zero status
/// comes from a failed command substitution and aborts the caller.
#[derive(Debug, Clone)]
pub struct ExpansionResult {
    pub fields: Vec<String>,
    pub status: i32,
}

impl ExpansionResult {
    fn failed(status: i32) -> Self {
        Self {
            fields: Vec::new(),
            status,
        }
    }
}

/// Full expansion for command arguments: splice, tilde, split, glob.
pub(crate) async fn expand_word(
    exec: &Executor,
    ctx: &ExecContext,
    word: &Word,
) -> Result<ExpansionResult, ExecError> {
    expand(exec, ctx, word).await
}

/// Scalar expansion: no word splitting, no path expansion. Used by `[[ ]]`
/// operands, assignment values, redirection targets and case clauses.
pub(crate) async fn expand_scalar(
    exec: &Executor,
    ctx: &ExecContext,
    word: &Word,
) -> Result<(String, i32), ExecError> {
    let (spliced, status) = splice(exec, ctx, word).await?;
    if status != 0 {
        return Ok((String::new(), status));
    }
    let spliced = apply_tilde(exec, ctx, word, spliced).await;
    Ok((unquote::unquote(&spliced), 0))
}

async fn expand(
    exec: &Executor,
    ctx: &ExecContext,
    word: &Word,
) -> Result<ExpansionResult, ExecError> {
    let (spliced, status) = splice(exec, ctx, word).await?;
    if status != 0 {
        return Ok(ExpansionResult::failed(status));
    }
    let spliced = apply_tilde(exec, ctx, word, spliced).await;
    let fields = unquote::unquote_and_split(&spliced, &ctx.ifs());

    if !word.has_path_expansion() {
        return Ok(ExpansionResult { fields, status: 0 });
    }

    // Path expansion multiplies fields by the host's matches; a host
    // without the capability leaves the pattern in place.
    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        if has_glob_chars(&field) {
            match exec.host().resolve_path(ctx, &field).await {
                Some(matches) => out.extend(matches),
                None => out.push(field),
            }
        } else {
            out.push(field);
        }
    }
    Ok(ExpansionResult {
        fields: out,
        status: 0,
    })
}

/// Splice every resolved expansion value into the raw text by span.
async fn splice(
    exec: &Executor,
    ctx: &ExecContext,
    word: &Word,
) -> Result<(String, i32), ExecError> {
    let mut buffer = ReplaceString::new(&word.text);
    for expansion in &word.expansions {
        if expansion.resolved {
            continue;
        }
        match &expansion.kind {
            ExpansionKind::Parameter { name } => {
                // Unknown names expand to the empty string.
                let value = ctx.get_var(name).unwrap_or_default();
                buffer.replace(expansion.span, value);
            }
            ExpansionKind::Command { script } => {
                let (value, status) = command_subst::run(exec, ctx, script).await?;
                if status != 0 {
                    return Ok((String::new(), status));
                }
                buffer.replace(expansion.span, value);
            }
            ExpansionKind::Arithmetic { expression } => {
                let value =
                    arithmetic::evaluate(exec, ctx, expression, AssignTarget::Params).await?;
                buffer.replace(expansion.span, value.to_string());
            }
            // Deferred until after text-level expansion.
            ExpansionKind::Path { .. } => {}
        }
    }
    Ok((buffer.apply(), 0))
}

/// Tilde expansion through the host, applied to words that start with an
/// unquoted `~`.
async fn apply_tilde(exec: &Executor, ctx: &ExecContext, word: &Word, spliced: String) -> String {
    if !word.text.starts_with('~') {
        return spliced;
    }
    let rest = &spliced[1..];
    let (user, tail) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    let user_opt = if user.is_empty() { None } else { Some(user) };
    let home = exec.host().resolve_home_user(ctx, user_opt).await;
    if home.is_empty() {
        // Unknown user: keep the original text.
        spliced
    } else {
        format!("{}{}", home, tail)
    }
}
