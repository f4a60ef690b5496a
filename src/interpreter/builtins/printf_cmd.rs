//! printf - Formatted output
//!
//! POSIX format specifiers (%s %d %i %u %x %X %o %c %% %q %b) with flags,
//! width and precision. Escape sequences in the format are always
//! processed; the format string cycles until all arguments are consumed.

use crate::context::ExecContext;
use crate::interpreter::errors::ExecError;
use crate::interpreter::executor::Executor;

use super::echo_cmd::interpret_escapes;
use super::BuiltinOutput;

pub(crate) async fn run(
    _exec: &Executor,
    _ctx: &ExecContext,
    args: &[String],
) -> Result<BuiltinOutput, ExecError> {
    let Some(format) = args.first() else {
        return Ok(BuiltinOutput::usage("bash: printf: usage: printf format [arguments]\n"));
    };
    let mut rest: &[String] = &args[1..];
    let mut out = String::new();
    let mut stderr = String::new();
    let mut code = 0;

    loop {
        let consumed = render_once(format, rest, &mut out, &mut stderr, &mut code);
        if consumed == 0 || consumed >= rest.len() {
            break;
        }
        rest = &rest[consumed..];
    }

    Ok(BuiltinOutput {
        code,
        stdout: out,
        stderr,
    })
}

/// Render the format once, returning how many arguments were consumed.
fn render_once(
    format: &str,
    args: &[String],
    out: &mut String,
    stderr: &mut String,
    code: &mut i32,
) -> usize {
    let (format, _) = interpret_escapes(format);
    let mut consumed = 0usize;
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        // flags
        let mut left_align = false;
        let mut zero_pad = false;
        let mut plus_sign = false;
        while let Some(&f) = chars.peek() {
            match f {
                '-' => left_align = true,
                '0' => zero_pad = true,
                '+' => plus_sign = true,
                ' ' | '#' => {}
                _ => break,
            }
            chars.next();
        }
        // width
        let mut width = String::new();
        while let Some(&d) = chars.peek() {
            if d.is_ascii_digit() {
                width.push(d);
                chars.next();
            } else {
                break;
            }
        }
        let width: usize = width.parse().unwrap_or(0);
        // precision
        let mut precision: Option<usize> = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut p = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() {
                    p.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            precision = Some(p.parse().unwrap_or(0));
        }

        let Some(conv) = chars.next() else {
            out.push('%');
            break;
        };
        let arg = args.get(consumed).map(|s| s.as_str()).unwrap_or("");
        if args.get(consumed).is_some() {
            consumed += 1;
        }

        let rendered = match conv {
            's' => {
                let mut s = arg.to_string();
                if let Some(p) = precision {
                    s.truncate(p);
                }
                s
            }
            'b' => interpret_escapes(arg).0,
            'q' => shell_quote(arg),
            'c' => arg.chars().next().map(String::from).unwrap_or_default(),
            'd' | 'i' => {
                let n = parse_printf_int(arg, stderr, code);
                if plus_sign && n >= 0 {
                    format!("+{}", n)
                } else {
                    n.to_string()
                }
            }
            'u' => {
                let n = parse_printf_int(arg, stderr, code);
                (n as u64).to_string()
            }
            'x' => format!("{:x}", parse_printf_int(arg, stderr, code)),
            'X' => format!("{:X}", parse_printf_int(arg, stderr, code)),
            'o' => format!("{:o}", parse_printf_int(arg, stderr, code)),
            other => {
                stderr.push_str(&format!("bash: printf: `{}': invalid format character\n", other));
                *code = 1;
                String::new()
            }
        };

        out.push_str(&pad(&rendered, width, left_align, zero_pad));
    }

    consumed
}

fn pad(s: &str, width: usize, left_align: bool, zero_pad: bool) -> String {
    if s.len() >= width {
        return s.to_string();
    }
    let fill = width - s.len();
    if left_align {
        format!("{}{}", s, " ".repeat(fill))
    } else if zero_pad && s.chars().all(|c| c.is_ascii_digit() || c == '-') {
        if let Some(stripped) = s.strip_prefix('-') {
            format!("-{}{}", "0".repeat(fill), stripped)
        } else {
            format!("{}{}", "0".repeat(fill), s)
        }
    } else {
        format!("{}{}", " ".repeat(fill), s)
    }
}

fn parse_printf_int(arg: &str, stderr: &mut String, code: &mut i32) -> i64 {
    let trimmed = arg.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let parsed = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()
    } else {
        trimmed.parse::<i64>().ok()
    };
    match parsed {
        Some(n) => n,
        None => {
            stderr.push_str(&format!("bash: printf: {}: invalid number\n", arg));
            *code = 1;
            0
        }
    }
}

/// Quote a value so the shell would read it back verbatim.
fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | '+'))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}
