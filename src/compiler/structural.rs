//! Line-oriented handling of layout inheritance: `@extends`, `@section`,
//! `@endsection` and `@show`.
//!
//! Every line this pass consumes still occupies one line of output, so a
//! template without any of these directives comes out unchanged.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use super::ir::Node;
use super::scan::{find_directives, Args};
use super::{compile_error, excerpt, Site};
use crate::error::{Result, ViewError};
use crate::expr::parse_args;

static END_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@endsection\s*(?:#.*)?$").expect("Invalid regex pattern"));

static SHOW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@show\s*(?:#.*)?$").expect("Invalid regex pattern"));

/// A piece of the template after the structural pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    /// Text still to be compiled by the fragment passes.
    Text { text: String, line: usize },
    /// A fully lowered structural directive.
    Directive {
        node: Node,
        line: usize,
        excerpt: String,
    },
    /// A captured section whose body still needs compiling.
    Section {
        name: String,
        body: String,
        body_line: usize,
        show: bool,
        line: usize,
        excerpt: String,
    },
}

struct OpenSection {
    name: String,
    body: String,
    body_line: usize,
    line: usize,
    excerpt: String,
}

/// Split `source` into text chunks, structural directives and sections.
pub fn split_structure(source: &str, template: &str) -> Result<Vec<Chunk>> {
    let lines: Vec<&str> = source.split('\n').collect();
    let last = lines.len().saturating_sub(1);
    let mut chunks = Vec::new();
    let mut open: Option<OpenSection> = None;

    for (index, raw) in lines.iter().enumerate() {
        let number = index + 1;
        let newline = if index < last { "\n" } else { "" };
        let trimmed = raw.trim();

        let show = SHOW.is_match(trimmed);
        if show || END_SECTION.is_match(trimmed) {
            match open.take() {
                Some(section) => chunks.push(Chunk::Section {
                    name: section.name,
                    body: section.body,
                    body_line: section.body_line,
                    show,
                    line: section.line,
                    excerpt: section.excerpt,
                }),
                None => warn!(
                    template = %template,
                    line = number,
                    "Ignoring {} without an open section",
                    trimmed
                ),
            }
            append(&mut chunks, &mut open, newline, number);
            continue;
        }

        let found = find_directives(raw, |name| {
            matches!(name, "extends" | "section").then_some(Args::Required)
        })
        .map_err(|e| {
            let site = Site {
                template,
                line: number,
                excerpt: &raw[e.offset..],
            };
            compile_error(&site, e.message)
        })?;

        let mut cursor = 0;
        let mut opened_here = false;
        for directive in found {
            append(&mut chunks, &mut open, &raw[cursor..directive.start], number);
            let site = Site {
                template,
                line: number,
                excerpt: &raw[directive.start..directive.end],
            };
            let mut args = parse_args(directive.args.as_deref().unwrap_or(""))
                .map_err(|e| compile_error(&site, e.message))?;
            let name = args
                .first()
                .and_then(|a| a.as_str_literal())
                .map(str::to_string)
                .ok_or_else(|| {
                    compile_error(
                        &site,
                        format!("@{} expects a quoted name as first argument", directive.name),
                    )
                })?;

            if directive.name == "extends" {
                chunks.push(Chunk::Directive {
                    node: Node::Extends(name),
                    line: number,
                    excerpt: excerpt(site.excerpt),
                });
                // The rest of an @extends line is dropped.
                cursor = raw.len();
                break;
            }

            if let Some(section) = &open {
                return Err(ViewError::NestedSection {
                    template: template.to_string(),
                    open: section.name.clone(),
                    nested: name,
                    line: number,
                });
            }

            match args.len() {
                1 => {
                    open = Some(OpenSection {
                        name,
                        body: String::new(),
                        body_line: number,
                        line: number,
                        excerpt: excerpt(site.excerpt),
                    });
                    opened_here = true;
                }
                2 => {
                    let value = args.pop().ok_or_else(|| compile_error(&site, "missing section value"))?;
                    chunks.push(Chunk::Directive {
                        node: Node::SectionInline { name, value },
                        line: number,
                        excerpt: excerpt(site.excerpt),
                    });
                }
                n => {
                    return Err(compile_error(
                        &site,
                        format!("@section takes one or two arguments, got {}", n),
                    ))
                }
            }
            cursor = directive.end;
        }

        let rest = &raw[cursor..];
        if opened_here && rest.trim().is_empty() {
            if let Some(section) = open.as_mut() {
                section.body_line = number + 1;
            }
            continue;
        }
        append(&mut chunks, &mut open, rest, number);
        append(&mut chunks, &mut open, newline, number);
    }

    if let Some(section) = open {
        return Err(ViewError::UnterminatedSection {
            template: template.to_string(),
            section: section.name,
        });
    }

    Ok(chunks)
}

/// Append text to the open section body, or to the trailing text chunk.
fn append(chunks: &mut Vec<Chunk>, open: &mut Option<OpenSection>, text: &str, line: usize) {
    if text.is_empty() {
        return;
    }
    if let Some(section) = open {
        section.body.push_str(text);
        return;
    }
    match chunks.last_mut() {
        Some(Chunk::Text { text: existing, .. }) => existing.push_str(text),
        _ => chunks.push(Chunk::Text {
            text: text.to_string(),
            line,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[Chunk]) -> String {
        chunks
            .iter()
            .filter_map(|c| match c {
                Chunk::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn text_without_directives_is_one_chunk() {
        let source = "<h1>Title</h1>\n<p>body</p>\n";
        let chunks = split_structure(source, "page").unwrap();
        assert_eq!(
            chunks,
            vec![Chunk::Text {
                text: source.into(),
                line: 1
            }]
        );
    }

    #[test]
    fn captures_section_body() {
        let source = "@extends('layouts.app')\n@section('content')\n<p>Hi</p>\n@endsection\n";
        let chunks = split_structure(source, "page").unwrap();
        assert!(matches!(&chunks[0], Chunk::Directive { node: Node::Extends(name), .. } if name == "layouts.app"));
        let Some(Chunk::Section { name, body, body_line, show, .. }) =
            chunks.iter().find(|c| matches!(c, Chunk::Section { .. }))
        else {
            panic!("expected a section");
        };
        assert_eq!(name, "content");
        assert_eq!(body, "<p>Hi</p>\n");
        assert_eq!(*body_line, 3);
        assert!(!show);
    }

    #[test]
    fn text_after_opening_directive_starts_body() {
        let chunks = split_structure("@section('title') Home\n@endsection", "page").unwrap();
        assert!(matches!(&chunks[0], Chunk::Section { body, body_line: 1, .. } if body == " Home\n"));
    }

    #[test]
    fn inline_section_keeps_surrounding_text() {
        let chunks = split_structure("a @section('title', 'Home') b", "page").unwrap();
        assert!(matches!(&chunks[1], Chunk::Directive { node: Node::SectionInline { .. }, .. }));
        assert_eq!(texts(&chunks), "a  b");
    }

    #[test]
    fn show_closes_and_marks_section() {
        let chunks = split_structure("@section('sidebar')\nnav\n@show\n", "layout").unwrap();
        assert!(matches!(&chunks[0], Chunk::Section { show: true, .. }));
    }

    #[test]
    fn endsection_allows_trailing_comment() {
        let chunks = split_structure("@section('a')\nx\n@endsection # a\n", "page").unwrap();
        assert!(matches!(&chunks[0], Chunk::Section { .. }));
    }

    #[test]
    fn nested_section_names_both() {
        let err = split_structure("@section('content')\n@section('sidebar')\n", "page").unwrap_err();
        match err {
            ViewError::NestedSection { open, nested, line, .. } => {
                assert_eq!(open, "content");
                assert_eq!(nested, "sidebar");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unterminated_section_is_an_error() {
        let err = split_structure("@section('content')\nbody", "page").unwrap_err();
        assert!(matches!(err, ViewError::UnterminatedSection { ref section, .. } if section == "content"));
    }

    #[test]
    fn orphan_endsection_is_ignored() {
        let chunks = split_structure("a\n@endsection\nb", "page").unwrap();
        assert_eq!(texts(&chunks), "a\n\nb");
    }

    #[test]
    fn extends_drops_rest_of_line_but_keeps_newline() {
        let chunks = split_structure("@extends('app') junk\nbody", "page").unwrap();
        assert_eq!(texts(&chunks), "\nbody");
    }
}
