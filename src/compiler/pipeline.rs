//! `{{ value | filter(args) | ... }}` compilation.
//!
//! String literals are swapped for placeholders before the expression is
//! split on pipes, so `'a|b'` never splits. Splitting only happens at depth
//! zero, and `||` is always the logical-or operator.

use regex::Regex;
use std::sync::LazyLock;

use super::ir::Node;
use super::{compile_error, Site};
use crate::error::{Result, ViewError};
use crate::expr::{parse_args, parse_expr, Expr};
use crate::registry::Registry;

const PLACEHOLDER_OPEN: char = '\u{E010}';
const PLACEHOLDER_CLOSE: char = '\u{E011}';

static SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^([A-Za-z_][A-Za-z0-9_]*)\s*(?:\((.*)\))?$").expect("Invalid regex pattern")
});

/// Compile an escaped echo.
pub fn compile_echo(source: &str, registry: &Registry, site: &Site<'_>) -> Result<Node> {
    let (expr, last_filter) = compile_pipeline(source, registry, site)?;
    let escape = !last_filter.is_some_and(|name| registry.is_safe_filter(&name));
    Ok(Node::Echo { expr, escape })
}

/// Compile a pipeline to a nested filter expression. Also returns the name
/// of the last filter applied.
pub fn compile_pipeline(
    source: &str,
    registry: &Registry,
    site: &Site<'_>,
) -> Result<(Expr, Option<String>)> {
    let (protected, strings) = protect_strings(source);

    if !has_pipe(&protected) {
        let expr = parse_expr(source.trim()).map_err(|e| compile_error(site, e.message))?;
        return Ok((expr, None));
    }

    let mut segments = split_pipes(&protected).into_iter();
    let head = segments.next().unwrap_or_default();
    let mut expr = parse_expr(restore_strings(&head, &strings).trim())
        .map_err(|e| compile_error(site, e.message))?;
    let mut last = None;

    for segment in segments {
        let segment = segment.trim();
        let caps = SEGMENT
            .captures(segment)
            .ok_or_else(|| compile_error(site, format!("malformed filter '{}'", restore_strings(segment, &strings))))?;
        let name = caps[1].to_string();

        if !registry.has_filter(&name) {
            return Err(ViewError::UnregisteredFilter {
                template: site.template.to_string(),
                name,
                line: site.line,
            });
        }

        let args = match caps.get(2) {
            Some(args) => parse_args(&restore_strings(args.as_str(), &strings))
                .map_err(|e| compile_error(site, e.message))?,
            None => Vec::new(),
        };

        expr = Expr::Filter {
            name: name.clone(),
            value: Box::new(expr),
            args,
        };
        last = Some(name);
    }

    Ok((expr, last))
}

/// Replace every quoted string with a numbered placeholder.
fn protect_strings(source: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(source.len());
    let mut strings = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if !matches!(c, '\'' | '"' | '`') {
            out.push(c);
            continue;
        }
        let mut end = source.len();
        let mut escaped = false;
        for (i, d) in chars.by_ref() {
            if escaped {
                escaped = false;
            } else if d == '\\' {
                escaped = true;
            } else if d == c {
                end = i + d.len_utf8();
                break;
            }
        }
        out.push(PLACEHOLDER_OPEN);
        out.push_str(&strings.len().to_string());
        out.push(PLACEHOLDER_CLOSE);
        strings.push(source[start..end].to_string());
    }

    (out, strings)
}

fn restore_strings(text: &str, strings: &[String]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find(PLACEHOLDER_OPEN) {
        out.push_str(&rest[..open]);
        let after = &rest[open + PLACEHOLDER_OPEN.len_utf8()..];
        let Some(close) = after.find(PLACEHOLDER_CLOSE) else {
            out.push_str(&rest[open..]);
            return out;
        };
        let index: usize = after[..close].parse().unwrap_or(usize::MAX);
        if let Some(s) = strings.get(index) {
            out.push_str(s);
        }
        rest = &after[close + PLACEHOLDER_CLOSE.len_utf8()..];
    }
    out.push_str(rest);
    out
}

fn has_pipe(text: &str) -> bool {
    split_pipes(text).len() > 1
}

/// Split on single `|` at bracket depth zero.
fn split_pipes(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '|' if depth == 0 => {
                let doubled = chars.get(i + 1) == Some(&'|') || (i > 0 && chars[i - 1] == '|');
                if !doubled {
                    parts.push(std::mem::take(&mut current));
                    continue;
                }
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Site<'static> {
        Site {
            template: "page",
            line: 3,
            excerpt: "{{ x }}",
        }
    }

    fn compile(source: &str) -> Result<Node> {
        compile_echo(source, &Registry::with_builtins(), &site())
    }

    #[test]
    fn plain_expression_is_escaped() {
        let node = compile("user.name").unwrap();
        assert_eq!(
            node,
            Node::Echo {
                expr: parse_expr("user.name").unwrap(),
                escape: true
            }
        );
    }

    #[test]
    fn pipe_inside_string_is_not_a_split() {
        let node = compile("'a|b' | upper").unwrap();
        let Node::Echo { expr, escape } = node else {
            panic!("expected echo");
        };
        assert!(escape);
        assert_eq!(
            expr,
            Expr::Filter {
                name: "upper".into(),
                value: Box::new(Expr::string("a|b")),
                args: vec![],
            }
        );
    }

    #[test]
    fn logical_or_is_not_a_split() {
        let node = compile("a || b").unwrap();
        assert!(matches!(node, Node::Echo { expr: Expr::Binary { .. }, .. }));
    }

    #[test]
    fn filters_apply_left_to_right_with_arguments() {
        let (expr, last) = compile_pipeline(
            "name | trim | default('n/a')",
            &Registry::with_builtins(),
            &site(),
        )
        .unwrap();
        assert_eq!(last.as_deref(), Some("default"));
        let Expr::Filter { name, value, args } = expr else {
            panic!("expected filter");
        };
        assert_eq!(name, "default");
        assert_eq!(args, vec![Expr::string("n/a")]);
        assert!(matches!(*value, Expr::Filter { ref name, .. } if name == "trim"));
    }

    #[test]
    fn pipes_inside_arguments_are_kept() {
        let (expr, _) = compile_pipeline(
            "items | join(a || b ? ', ' : '|')",
            &Registry::with_builtins(),
            &site(),
        )
        .unwrap();
        assert!(matches!(expr, Expr::Filter { ref name, .. } if name == "join"));
    }

    #[test]
    fn safe_last_filter_disables_escaping() {
        assert!(matches!(compile("body | raw").unwrap(), Node::Echo { escape: false, .. }));
        assert!(matches!(compile("body | raw | upper").unwrap(), Node::Echo { escape: true, .. }));
    }

    #[test]
    fn unregistered_filter_is_reported() {
        let err = compile("name | shout").unwrap_err();
        assert!(matches!(
            err,
            ViewError::UnregisteredFilter { ref name, line: 3, .. } if name == "shout"
        ));
    }

    #[test]
    fn malformed_expression_is_a_compile_error() {
        let err = compile("a +").unwrap_err();
        assert!(matches!(err, ViewError::CompileError { line: 3, .. }));
    }

    #[test]
    fn restores_escaped_quotes() {
        let (text, strings) = protect_strings(r#"'it\'s|x' | upper"#);
        assert_eq!(strings.len(), 1);
        assert_eq!(restore_strings(&text, &strings), r#"'it\'s|x' | upper"#);
    }
}
