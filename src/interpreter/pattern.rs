//! Pattern Matching
//!
//! Shell glob patterns compile to regexes for case statements, `==` inside
//! [[ ]] and glob resolution. Compilation is memoized by pattern string
//! since case arms and loop bodies re-test the same patterns repeatedly.
//!
//! Translation: `*` -> `.*`, `?` -> `.`, `[set]` is preserved verbatim,
//! regex metacharacters are escaped, the result is anchored with `^...$`.
//! A pattern whose translation fails to compile falls back to exact string
//! equality.

use std::collections::HashMap;
use std::sync::Mutex;

use regex_lite::Regex;

lazy_static::lazy_static! {
    static ref GLOB_CACHE: Mutex<HashMap<String, Option<Regex>>> = Mutex::new(HashMap::new());
}

/// Characters that must be escaped so they reach the regex engine literally.
fn is_regex_special(c: char) -> bool {
    matches!(c, '\\' | '^' | '$' | '.' | '+' | '(' | ')' | '{' | '}' | '|')
}

/// Translate a glob pattern into an anchored regex string.
pub fn glob_to_regex_str(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut regex = String::from("^");
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '[' => {
                // Preserve the whole character class verbatim.
                match find_class_end(&chars, i) {
                    Some(end) => {
                        let class: String = chars[i..=end].iter().collect();
                        regex.push_str(&class);
                        i = end + 1;
                        continue;
                    }
                    None => {
                        // Unclosed class: literal bracket.
                        regex.push_str("\\[");
                    }
                }
            }
            '\\' => {
                // Shell escape: next character is literal.
                if i + 1 < chars.len() {
                    let next = chars[i + 1];
                    if is_regex_special(next) || matches!(next, '*' | '?' | '[' | ']') {
                        regex.push('\\');
                    }
                    regex.push(next);
                    i += 2;
                    continue;
                }
                regex.push_str("\\\\");
            }
            c if is_regex_special(c) => {
                regex.push('\\');
                regex.push(c);
            }
            c => regex.push(c),
        }
        i += 1;
    }

    regex.push('$');
    regex
}

/// Find the closing `]` of a character class starting at `[`.
fn find_class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if i < chars.len() && (chars[i] == '!' || chars[i] == '^') {
        i += 1;
    }
    // A `]` immediately after `[` or `[^` is literal.
    if i < chars.len() && chars[i] == ']' {
        i += 1;
    }
    while i < chars.len() {
        if chars[i] == ']' {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Compile a glob pattern, memoized. `None` means the translation is not a
/// valid regex and the caller should fall back to literal comparison.
pub fn compile_glob(pattern: &str) -> Option<Regex> {
    let mut cache = GLOB_CACHE.lock().unwrap();
    if let Some(entry) = cache.get(pattern) {
        return entry.clone();
    }
    let compiled = Regex::new(&glob_to_regex_str(pattern)).ok();
    cache.insert(pattern.to_string(), compiled.clone());
    compiled
}

/// Match a value against a glob pattern with the fallback rule applied.
pub fn glob_match(value: &str, pattern: &str) -> bool {
    match compile_glob(pattern) {
        Some(re) => re.is_match(value),
        None => value == pattern,
    }
}

/// True if the string contains unquoted glob metacharacters.
pub fn has_glob_chars(s: &str) -> bool {
    s.chars().any(|c| matches!(c, '*' | '?' | '['))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_and_question() {
        assert!(glob_match("file.txt", "*.txt"));
        assert!(glob_match("file.txt", "f???.txt"));
        assert!(!glob_match("file.txt", "*.sh"));
        assert!(glob_match("anything", "*"));
    }

    #[test]
    fn test_char_class_preserved() {
        assert!(glob_match("a1", "a[0-9]"));
        assert!(!glob_match("ax", "a[0-9]"));
        assert!(glob_match("a-", "a[-x]"));
    }

    #[test]
    fn test_metachars_escaped() {
        assert!(glob_match("a.b", "a.b"));
        assert!(!glob_match("axb", "a.b"));
        assert!(glob_match("a+b", "a+b"));
        assert!(glob_match("a(b)", "a(b)"));
        assert!(glob_match("a|b", "a|b"));
    }

    #[test]
    fn test_anchoring() {
        assert!(!glob_match("xfile.txt.bak", "*.txt"));
        assert!(!glob_match("prefix-a", "a*"));
    }

    #[test]
    fn test_invalid_falls_back_to_equality() {
        // `[z-a]` is an invalid range for the regex engine.
        assert!(!glob_match("b", "[z-a]"));
        assert!(glob_match("[z-a]", "[z-a]"));
    }

    #[test]
    fn test_escaped_glob_chars() {
        assert!(glob_match("a*b", "a\\*b"));
        assert!(!glob_match("axxb", "a\\*b"));
    }

    #[test]
    fn test_has_glob_chars() {
        assert!(has_glob_chars("*.txt"));
        assert!(has_glob_chars("a?b"));
        assert!(!has_glob_chars("plain"));
    }
}
