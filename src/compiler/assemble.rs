//! Tree assembly of block directives.

use std::mem;

use super::fragment::{Fragment, Item, Located, Open};
use super::ir::{Branch, Node};
use super::markers::Markers;
use super::{compile_error, Site};
use crate::error::Result;
use crate::expr::Expr;

struct Frame {
    open: Open,
    line: usize,
    excerpt: String,
    branches: Vec<Branch>,
    /// Condition of the arm currently being collected.
    condition: Option<Expr>,
    in_else: bool,
    body: Vec<Node>,
}

impl Frame {
    fn new(open: Open, located: &Located) -> Self {
        let condition = match &open {
            Open::Conditional { condition, .. } => Some(condition.clone()),
            _ => None,
        };
        Self {
            open,
            line: located.line,
            excerpt: located.excerpt.clone(),
            branches: Vec::new(),
            condition,
            in_else: false,
            body: Vec::new(),
        }
    }

    fn finish_arm(&mut self) {
        if let Some(condition) = self.condition.take() {
            self.branches.push(Branch {
                condition,
                body: mem::take(&mut self.body),
            });
        }
    }

    fn into_node(mut self) -> Node {
        match self.open {
            Open::Conditional { .. } => {
                let otherwise = if self.in_else {
                    Some(mem::take(&mut self.body))
                } else {
                    self.finish_arm();
                    None
                };
                Node::If {
                    branches: self.branches,
                    otherwise,
                }
            }
            Open::Foreach(header) => Node::Foreach {
                iterable: header.iterable,
                key: header.key,
                value: header.value,
                body: self.body,
            },
            Open::For(header) => Node::For {
                init: header.init,
                condition: header.condition,
                step: header.step,
                body: self.body,
            },
            Open::While(condition) => Node::While {
                condition,
                body: self.body,
            },
        }
    }
}

/// Build the node tree of one compiled chunk.
pub fn assemble(fragments: Vec<Fragment>, template: &str, markers: &Markers) -> Result<Vec<Node>> {
    let mut root = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for fragment in fragments {
        let located = match fragment {
            Fragment::Source { text, .. } => {
                let body = stack.last_mut().map(|f| &mut f.body).unwrap_or(&mut root);
                push_text(body, markers.restore(&text));
                continue;
            }
            Fragment::Item(located) => located,
        };
        let site = Site {
            template,
            line: located.line,
            excerpt: &located.excerpt,
        };

        match located.item {
            Item::Node(node) => {
                if matches!(node, Node::Break(_) | Node::Continue(_))
                    && !stack.iter().any(|f| f.open.block().is_loop())
                {
                    return Err(compile_error(&site, "loop control used outside of a loop"));
                }
                let body = stack.last_mut().map(|f| &mut f.body).unwrap_or(&mut root);
                push_node(body, node);
            }
            Item::Open(ref open) => {
                let frame = Frame::new(open.clone(), &located);
                stack.push(frame);
            }
            Item::ElseIf(condition) => {
                let frame = conditional_frame(&mut stack, "@elseif", &site)?;
                frame.finish_arm();
                frame.condition = Some(condition);
            }
            Item::Else => {
                let frame = conditional_frame(&mut stack, "@else", &site)?;
                frame.finish_arm();
                frame.in_else = true;
            }
            Item::Close(block) => {
                let Some(frame) = stack.pop() else {
                    return Err(compile_error(
                        &site,
                        format!("{} without a matching {}", block.closer(), block.opener()),
                    ));
                };
                let open = frame.open.block();
                if open != block {
                    return Err(compile_error(
                        &site,
                        format!(
                            "{} does not close {} opened at line {}",
                            block.closer(),
                            open.opener(),
                            frame.line
                        ),
                    ));
                }
                let node = frame.into_node();
                let body = stack.last_mut().map(|f| &mut f.body).unwrap_or(&mut root);
                push_node(body, node);
            }
        }
    }

    if let Some(frame) = stack.pop() {
        let site = Site {
            template,
            line: frame.line,
            excerpt: &frame.excerpt,
        };
        let block = frame.open.block();
        return Err(compile_error(
            &site,
            format!("{} is never closed with {}", block.opener(), block.closer()),
        ));
    }

    Ok(root)
}

fn conditional_frame<'f>(
    stack: &'f mut [Frame],
    directive: &str,
    site: &Site<'_>,
) -> Result<&'f mut Frame> {
    match stack.last_mut() {
        Some(frame) if matches!(frame.open, Open::Conditional { .. }) && !frame.in_else => Ok(frame),
        Some(frame) if frame.in_else => Err(compile_error(
            site,
            format!("{} after @else in block opened at line {}", directive, frame.line),
        )),
        _ => Err(compile_error(site, format!("{} outside of a conditional block", directive))),
    }
}

fn push_text(body: &mut Vec<Node>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last)) = body.last_mut() {
        last.push_str(&text);
    } else {
        body.push(Node::Text(text));
    }
}

fn push_node(body: &mut Vec<Node>, node: Node) {
    match node {
        Node::Text(text) => push_text(body, text),
        node => body.push(node),
    }
}
