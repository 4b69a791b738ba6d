//! Locating `@directive(args)` occurrences in raw text.

use regex::Regex;
use std::sync::LazyLock;

static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid regex pattern"));

static DOMAIN_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]*\.[A-Za-z0-9]").expect("Invalid regex pattern"));

/// Whether a directive takes a parenthesized argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Args {
    None,
    Optional,
    Required,
}

/// One directive occurrence. `start..end` covers the name and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub start: usize,
    pub end: usize,
    pub name: String,
    pub args: Option<String>,
}

/// A directive whose arguments could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub offset: usize,
    pub message: String,
}

/// Find every directive in `text` for which `args_of` returns a mode.
///
/// Directives may follow other text directly (`A@endif`). Only an `@` that
/// sits inside something shaped like an e-mail address (`me@if.com`) is
/// left literal.
pub fn find_directives<F>(text: &str, args_of: F) -> Result<Vec<Found>, ScanError>
where
    F: Fn(&str) -> Option<Args>,
{
    let mut found = Vec::new();
    let mut resume = 0;

    for caps in DIRECTIVE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let start = whole.start();
        if start < resume {
            continue;
        }
        let name = &caps[1];
        let Some(mode) = args_of(name) else { continue };

        if looks_like_email(text, start, whole.end()) {
            continue;
        }

        let mut end = whole.end();
        let mut args = None;
        if mode != Args::None {
            let open = skip_blanks(text, end);
            if text[open..].starts_with('(') {
                let close = matching_paren(text, open).ok_or_else(|| ScanError {
                    offset: start,
                    message: format!("unbalanced parentheses after @{}", name),
                })?;
                args = Some(text[open + 1..close].to_string());
                end = close + 1;
            } else if mode == Args::Required {
                return Err(ScanError {
                    offset: start,
                    message: format!("@{} requires arguments", name),
                });
            }
        }

        resume = end;
        found.push(Found {
            start,
            end,
            name: name.to_string(),
            args,
        });
    }

    Ok(found)
}

fn looks_like_email(text: &str, at: usize, name_end: usize) -> bool {
    let local_part = text[..at]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '+' | '-'));
    local_part && DOMAIN_TAIL.is_match(&text[name_end..])
}

fn skip_blanks(text: &str, from: usize) -> usize {
    text[from..]
        .find(|c: char| c != ' ' && c != '\t')
        .map(|i| from + i)
        .unwrap_or(text.len())
}

/// Index of the `)` matching the `(` at `open`, skipping quoted text.
pub fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// 1-based line of byte `offset` in `text`, given the line `text` starts on.
pub fn line_at(text: &str, start_line: usize, offset: usize) -> usize {
    start_line + text[..offset].matches('\n').count()
}
