//! echo - Write arguments to stdout
//!
//! Supports -n (no trailing newline), -e (interpret C escapes) and -E
//! (disable escape interpretation, the default). Flags may be combined
//! (`-ne`); the first argument that is not a recognized flag cluster ends
//! flag parsing, as in bash.

use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::BuiltinOutput;

pub(crate) async fn run(
    _exec: &Executor,
    _ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let mut newline = true;
    let mut escapes = false;
    let mut index = 0;

    while index < args.len() {
        let arg = &args[index];
        if arg.len() < 2 || !arg.starts_with('-') {
            break;
        }
        if !arg[1..].chars().all(|c| matches!(c, 'n' | 'e' | 'E')) {
            break;
        }
        for c in arg[1..].chars() {
            match c {
                'n' => newline = false,
                'e' => escapes = true,
                'E' => escapes = false,
                _ => unreachable!(),
            }
        }
        index += 1;
    }

    let joined = args[index..].join(" ");
    let (mut text, suppress_newline) = if escapes {
        interpret_escapes(&joined)
    } else {
        (joined, false)
    };
    if newline && !suppress_newline {
        text.push('\n');
    }
    Ok(BuiltinOutput::stdout(text))
}

/// Interpret C-style escapes. Returns the text and whether `\c` suppressed
/// the rest of the output including the newline.
pub(crate) fn interpret_escapes(input: &str) -> (String, bool) {
    let mut out = String::new();
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('c') => return (out, true),
            Some('e') | Some('E') => out.push('\x1b'),
            Some('f') => out.push('\x0c'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\x0b'),
            Some('\\') => out.push('\\'),
            Some('0') => {
                let mut value = 0u32;
                for _ in 0..3 {
                    match chars.peek() {
                        Some(d) if ('0'..='7').contains(d) => {
                            value = value * 8 + d.to_digit(8).unwrap();
                            chars.next();
                        }
                        _ => break,
                    }
                }
                if let Some(c) = char::from_u32(value) {
                    out.push(c);
                }
            }
            Some('x') => {
                let mut value = 0u32;
                let mut seen = 0;
                for _ in 0..2 {
                    match chars.peek() {
                        Some(d) if d.is_ascii_hexdigit() => {
                            value = value * 16 + d.to_digit(16).unwrap();
                            chars.next();
                            seen += 1;
                        }
                        _ => break,
                    }
                }
                if seen == 0 {
                    out.push_str("\\x");
                } else if let Some(c) = char::from_u32(value) {
                    out.push(c);
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    (out, false)
}
