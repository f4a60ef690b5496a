//! Unquoting and Word Splitting
//!
//! Consumes the spliced word text: quoted segments stay joined, unquoted
//! runs split on IFS, quotes are removed and escapes resolved, all in one
//! pass. IFS whitespace runs collapse into one delimiter; non-whitespace
//! IFS characters each delimit a field, producing empties between
//! consecutive occurrences.

use std::collections::HashSet;

fn categorize_ifs(ifs: &str) -> (HashSet<char>, HashSet<char>) {
    let mut whitespace = HashSet::new();
    let mut other = HashSet::new();
    for c in ifs.chars() {
        if matches!(c, ' ' | '\t' | '\n') {
            whitespace.insert(c);
        } else {
            other.insert(c);
        }
    }
    (whitespace, other)
}

/// Unquote and split into fields.
pub fn unquote_and_split(s: &str, ifs: &str) -> Vec<String> {
    split_impl(s, ifs, true)
}

/// Unquote without splitting (conditional words, assignment values,
/// redirection targets).
pub fn unquote(s: &str) -> String {
    split_impl(s, "", false).into_iter().next().unwrap_or_default()
}

fn split_impl(s: &str, ifs: &str, split: bool) -> Vec<String> {
    let (ws, nws) = categorize_ifs(ifs);
    let mut fields: Vec<String> = Vec::new();
    let mut current = String::new();
    // Set when the field saw a quoted region, so "" still yields a field.
    let mut has_content = false;

    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                has_content = true;
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    current.push(q);
                }
            }
            '"' => {
                has_content = true;
                while let Some(q) = chars.next() {
                    match q {
                        '"' => break,
                        '\\' => match chars.peek() {
                            // Inside double quotes, backslash only escapes
                            // these.
                            Some('$') | Some('`') | Some('"') | Some('\\') => {
                                current.push(chars.next().unwrap());
                            }
                            _ => current.push('\\'),
                        },
                        q => current.push(q),
                    }
                }
            }
            '\\' => match chars.next() {
                Some(escaped) => {
                    current.push(escaped);
                    has_content = true;
                }
                None => current.push('\\'),
            },
            c if split && nws.contains(&c) => {
                fields.push(std::mem::take(&mut current));
                has_content = false;
            }
            c if split && ws.contains(&c) => {
                if has_content || !current.is_empty() {
                    fields.push(std::mem::take(&mut current));
                    has_content = false;
                }
            }
            c => current.push(c),
        }
    }

    if has_content || !current.is_empty() {
        fields.push(current);
    } else if !split && fields.is_empty() {
        fields.push(current);
    }
    fields
}
