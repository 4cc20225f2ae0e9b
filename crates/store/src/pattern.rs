//! Graphite-style path globs.
//!
//! Supported syntax: `*` (any run of characters within one segment), `?` (one
//! character within a segment), `{a,b}` (alternation) and `[a-z]` / `[!a]`
//! (character classes). Globs compile to an anchored RE2-compatible regex so
//! the same expression works in ClickHouse `match()` and in memory.

use gc_core::{Error, Result};
use regex::Regex;

/// A compiled path glob.
#[derive(Debug, Clone)]
pub struct PathPattern {
    expr: String,
    regex: Regex,
}

impl PathPattern {
    /// Compiles `pattern`.
    ///
    /// With `limit_depth` only paths of the pattern's own depth match;
    /// otherwise every descendant of a matching path matches too.
    pub fn compile(pattern: &str, limit_depth: bool) -> Result<Self> {
        let body = translate(pattern)?;
        let expr = if limit_depth {
            format!("^{}$", body)
        } else {
            format!(r"^{}(?:\..*)?$", body)
        };

        let regex = Regex::new(&expr)
            .map_err(|e| Error::invalid_pattern(format!("'{}': {}", pattern, e)))?;

        Ok(Self {
            expr,
            regex,
        })
    }

    /// The regex handed to the store.
    pub fn as_regex(&self) -> &str {
        &self.expr
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

fn translate(pattern: &str) -> Result<String> {
    if pattern.trim().is_empty() {
        return Err(Error::invalid_pattern("empty pattern"));
    }

    let mut out = String::with_capacity(pattern.len() * 2);
    let mut braces = 0usize;
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^.]*"),
            '?' => out.push_str("[^.]"),
            '.' => out.push_str(r"\."),
            '{' => {
                braces += 1;
                out.push_str("(?:");
            }
            '}' => {
                if braces == 0 {
                    return Err(Error::invalid_pattern(format!("unbalanced '}}' in '{}'", pattern)));
                }
                braces -= 1;
                out.push(')');
            }
            ',' if braces > 0 => out.push('|'),
            '[' => {
                out.push('[');
                let negated = chars.peek() == Some(&'!');
                if negated {
                    chars.next();
                    out.push('^');
                }
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    if c == '\\' || c == '[' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                if !closed {
                    return Err(Error::invalid_pattern(format!("unclosed '[' in '{}'", pattern)));
                }
                // Negated classes must not cross the segment separator.
                if negated {
                    out.push_str(r"\.");
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    if braces != 0 {
        return Err(Error::invalid_pattern(format!("unclosed '{{' in '{}'", pattern)));
    }

    Ok(out)
}
