//! Directive passes over a fragment list.
//!
//! A chunk of template text starts as a single [`Fragment::Source`]. Each
//! pass looks only at the source fragments left by earlier passes and
//! splits them around the constructs it recognizes, replacing those with
//! located [`Item`]s. Whatever source text survives every pass is literal.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::ir::Node;
use super::pipeline::{compile_echo, compile_pipeline};
use super::scan::{find_directives, line_at, Args, Found};
use super::{compile_error, Site};
use crate::error::{Result, ViewError};
use crate::expr::{
    parse_args, parse_expr, parse_for, parse_foreach, parse_statements, Check, Expr,
    ForHeader, ForeachHeader,
};
use crate::registry::{Expansion, Registry};

static ECHO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{\s*(.+?)\s*\}\}").expect("Invalid regex pattern"));

static RAW_ECHO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{!!\s*(.+?)\s*!!\}").expect("Invalid regex pattern"));

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Source { text: String, line: usize },
    Item(Located),
}

/// An item with the position it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub item: Item,
    pub line: usize,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Node(Node),
    Open(Open),
    ElseIf(Expr),
    Else,
    Close(Block),
}

/// Kinds of block directives that are assembled into a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    If,
    Auth,
    Guest,
    Can,
    Cannot,
    HasSlot,
    Foreach,
    For,
    While,
}

impl Block {
    pub fn opener(self) -> &'static str {
        match self {
            Self::If => "@if",
            Self::Auth => "@auth",
            Self::Guest => "@guest",
            Self::Can => "@can",
            Self::Cannot => "@cannot",
            Self::HasSlot => "@hasComponentSlot",
            Self::Foreach => "@foreach",
            Self::For => "@for",
            Self::While => "@while",
        }
    }

    pub fn closer(self) -> &'static str {
        match self {
            Self::If => "@endif",
            Self::Auth => "@endauth",
            Self::Guest => "@endguest",
            Self::Can => "@endcan",
            Self::Cannot => "@endcannot",
            Self::HasSlot => "@endHasComponentSlot",
            Self::Foreach => "@endforeach",
            Self::For => "@endfor",
            Self::While => "@endwhile",
        }
    }

    pub fn is_loop(self) -> bool {
        matches!(self, Self::Foreach | Self::For | Self::While)
    }
}

/// Data carried by an opening block directive.
#[derive(Debug, Clone, PartialEq)]
pub enum Open {
    /// Any conditional block; `block` tells which closer ends it.
    Conditional { block: Block, condition: Expr },
    Foreach(ForeachHeader),
    For(ForHeader),
    While(Expr),
}

impl Open {
    pub fn block(&self) -> Block {
        match self {
            Self::Conditional { block, .. } => *block,
            Self::Foreach(_) => Block::Foreach,
            Self::For(_) => Block::For,
            Self::While(_) => Block::While,
        }
    }
}

/// Shared state of the passes over one template.
pub struct Passes<'a> {
    pub template: &'a str,
    pub registry: &'a Registry,
    /// Include targets discovered so far, in order of appearance.
    pub includes: Vec<String>,
}

impl<'a> Passes<'a> {
    pub fn new(template: &'a str, registry: &'a Registry) -> Self {
        Self {
            template,
            registry,
            includes: Vec::new(),
        }
    }

    /// Run every pass over `text`, which starts on `line`.
    pub fn run(&mut self, text: &str, line: usize) -> Result<Vec<Fragment>> {
        let mut fragments = vec![Fragment::Source {
            text: text.to_string(),
            line,
        }];

        fragments = self.directive_pass(fragments, yield_args, lower_yield)?;

        if !self.registry.directive_names().is_empty() {
            let registry = self.registry;
            fragments = self.directive_pass(
                fragments,
                |name| registry.has_directive(name).then_some(Args::Optional),
                |found, site| expand_custom(registry, found, site),
            )?;
        }

        fragments = self.directive_pass(
            fragments,
            |name| (name == "csrf").then_some(Args::None),
            |_, _| Ok(Item::Node(Node::Csrf)),
        )?;

        let registry = self.registry;
        fragments = self.regex_pass(fragments, &ECHO, |caps, site| {
            Ok(Item::Node(compile_echo(&caps[1], registry, site)?))
        })?;
        fragments = self.regex_pass(fragments, &RAW_ECHO, |caps, site| {
            let (expr, _) = compile_pipeline(&caps[1], registry, site)?;
            Ok(Item::Node(Node::Echo {
                expr,
                escape: false,
            }))
        })?;

        fragments = self.directive_pass(fragments, json_args, lower_json)?;
        fragments = self.directive_pass(fragments, control_args, lower_control)?;
        fragments = self.directive_pass(fragments, auth_args, lower_auth)?;
        fragments = self.directive_pass(
            fragments,
            |name| (name == "parent").then_some(Args::None),
            |_, _| Ok(Item::Node(Node::Parent)),
        )?;
        fragments = self.directive_pass(fragments, policy_args, lower_policy)?;
        fragments = self.directive_pass(fragments, component_args, lower_component)?;
        fragments = self.directive_pass(fragments, component_slot_args, lower_component_slot)?;

        let mut includes = Vec::new();
        fragments = self.directive_pass(
            fragments,
            |name| (name == "include").then_some(Args::Required),
            |found, site| {
                let item = lower_include(found, site)?;
                if let Item::Node(Node::Include { name, .. }) = &item {
                    includes.push(name.clone());
                }
                Ok(item)
            },
        )?;
        self.includes.extend(includes);

        fragments = self.directive_pass(fragments, push_args, lower_push)?;
        self.code_pass(fragments)
    }

    fn directive_pass<A, H>(
        &self,
        fragments: Vec<Fragment>,
        args_of: A,
        mut handle: H,
    ) -> Result<Vec<Fragment>>
    where
        A: Fn(&str) -> Option<Args>,
        H: FnMut(&Found, &Site<'_>) -> Result<Item>,
    {
        each_source(fragments, |text, line| {
            let found = find_directives(text, &args_of).map_err(|e| {
                let site = Site {
                    template: self.template,
                    line: line_at(text, line, e.offset),
                    excerpt: &text[e.offset..],
                };
                compile_error(&site, e.message)
            })?;

            let spans = found.iter().map(|f| (f.start, f.end));
            split_around(self.template, text, line, spans, |i, site| handle(&found[i], site))
        })
    }

    fn regex_pass<H>(&self, fragments: Vec<Fragment>, regex: &Regex, mut handle: H) -> Result<Vec<Fragment>>
    where
        H: FnMut(&Captures<'_>, &Site<'_>) -> Result<Item>,
    {
        each_source(fragments, |text, line| {
            let captures: Vec<Captures<'_>> = regex.captures_iter(text).collect();
            let spans = captures
                .iter()
                .filter_map(|c| c.get(0))
                .map(|m| (m.start(), m.end()));
            split_around(self.template, text, line, spans, |i, site| handle(&captures[i], site))
        })
    }

    /// `@php ... @endphp` blocks and the inline `@php(statements)` form.
    fn code_pass(&self, fragments: Vec<Fragment>) -> Result<Vec<Fragment>> {
        each_source(fragments, |text, line| {
            let found = find_directives(text, |name| (name == "php").then_some(Args::Optional))
                .map_err(|e| {
                    let site = Site {
                        template: self.template,
                        line: line_at(text, line, e.offset),
                        excerpt: &text[e.offset..],
                    };
                    compile_error(&site, e.message)
                })?;

            let mut spans = Vec::new();
            let mut bodies = Vec::new();
            let mut resume = 0;
            for found in found {
                if found.start < resume {
                    continue;
                }
                if let Some(args) = found.args {
                    spans.push((found.start, found.end));
                    bodies.push(args);
                    resume = found.end;
                    continue;
                }
                let Some(close) = text[found.end..].find("@endphp") else {
                    let site = Site {
                        template: self.template,
                        line: line_at(text, line, found.start),
                        excerpt: &text[found.start..],
                    };
                    return Err(compile_error(&site, "@php block is never closed with @endphp"));
                };
                let end = found.end + close + "@endphp".len();
                spans.push((found.start, end));
                bodies.push(text[found.end..found.end + close].to_string());
                resume = end;
            }

            split_around(self.template, text, line, spans.into_iter(), |i, site| {
                let stmts =
                    parse_statements(&bodies[i]).map_err(|e| compile_error(site, e.message))?;
                Ok(Item::Node(Node::Code(stmts)))
            })
        })
    }
}

fn each_source<F>(fragments: Vec<Fragment>, mut f: F) -> Result<Vec<Fragment>>
where
    F: FnMut(&str, usize) -> Result<Vec<Fragment>>,
{
    let mut out = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        match fragment {
            Fragment::Source { text, line } => out.extend(f(&text, line)?),
            item => out.push(item),
        }
    }
    Ok(out)
}

/// Split `text` around non-overlapping, ordered `spans`, lowering each span
/// with `lower(index, site)`.
fn split_around<I, L>(
    template: &str,
    text: &str,
    line: usize,
    spans: I,
    mut lower: L,
) -> Result<Vec<Fragment>>
where
    I: Iterator<Item = (usize, usize)>,
    L: FnMut(usize, &Site<'_>) -> Result<Item>,
{
    let mut out = Vec::new();
    let mut cursor = 0;

    for (i, (start, end)) in spans.enumerate() {
        if start > cursor {
            out.push(Fragment::Source {
                text: text[cursor..start].to_string(),
                line: line_at(text, line, cursor),
            });
        }
        let site = Site {
            template,
            line: line_at(text, line, start),
            excerpt: &text[start..end],
        };
        let item = lower(i, &site)?;
        out.push(Fragment::Item(Located {
            item,
            line: site.line,
            excerpt: super::excerpt(site.excerpt),
        }));
        cursor = end;
    }

    if cursor < text.len() {
        out.push(Fragment::Source {
            text: text[cursor..].to_string(),
            line: line_at(text, line, cursor),
        });
    }
    Ok(out)
}

fn args_list(found: &Found, site: &Site<'_>) -> Result<Vec<Expr>> {
    parse_args(found.args.as_deref().unwrap_or("")).map_err(|e| compile_error(site, e.message))
}

/// First argument as a quoted name.
fn name_arg(args: &[Expr], found: &Found, site: &Site<'_>) -> Result<String> {
    args.first()
        .and_then(Expr::as_str_literal)
        .map(str::to_string)
        .ok_or_else(|| compile_error(site, format!("@{} expects a quoted name as first argument", found.name)))
}

fn arg_count(args: &[Expr], max: usize, found: &Found, site: &Site<'_>) -> Result<()> {
    if args.len() > max {
        return Err(compile_error(
            site,
            format!("@{} takes at most {} arguments, got {}", found.name, max, args.len()),
        ));
    }
    Ok(())
}

fn optional_condition(found: &Found, site: &Site<'_>) -> Result<Option<Expr>> {
    match found.args.as_deref() {
        Some(src) if !src.trim().is_empty() => {
            Ok(Some(parse_expr(src).map_err(|e| compile_error(site, e.message))?))
        }
        _ => Ok(None),
    }
}

fn yield_args(name: &str) -> Option<Args> {
    (name == "yield").then_some(Args::Required)
}

fn lower_yield(found: &Found, site: &Site<'_>) -> Result<Item> {
    let mut args = args_list(found, site)?;
    arg_count(&args, 2, found, site)?;
    let name = name_arg(&args, found, site)?;
    let default = if args.len() == 2 { args.pop() } else { None };
    Ok(Item::Node(Node::Yield { name, default }))
}

fn expand_custom(registry: &Registry, found: &Found, site: &Site<'_>) -> Result<Item> {
    let failure = |message: String| ViewError::DirectiveExpansionFailure {
        template: site.template.to_string(),
        directive: found.name.clone(),
        line: site.line,
        message,
    };

    let handler = registry
        .directive(&found.name)
        .ok_or_else(|| failure("directive is not registered".to_string()))?;
    let expansion = handler(found.args.as_deref().unwrap_or("")).map_err(|e| failure(format!("{:#}", e)))?;

    let node = match expansion {
        Expansion::Text(text) => Node::Text(text),
        Expansion::Echo(src) => compile_echo(&src, registry, site)?,
        Expansion::Raw(src) => Node::Echo {
            expr: parse_expr(&src).map_err(|e| failure(e.message))?,
            escape: false,
        },
        Expansion::Statements(src) => Node::Code(parse_statements(&src).map_err(|e| failure(e.message))?),
    };
    Ok(Item::Node(node))
}

fn json_args(name: &str) -> Option<Args> {
    (name == "json").then_some(Args::Required)
}

fn lower_json(found: &Found, site: &Site<'_>) -> Result<Item> {
    let mut args = args_list(found, site)?;
    arg_count(&args, 2, found, site)?;
    let pretty = if args.len() == 2 { args.pop() } else { None };
    let expr = args
        .pop()
        .ok_or_else(|| compile_error(site, "@json expects an expression"))?;
    Ok(Item::Node(Node::Json { expr, pretty }))
}

fn control_args(name: &str) -> Option<Args> {
    match name {
        "if" | "elseif" | "foreach" | "for" | "while" => Some(Args::Required),
        "break" | "continue" => Some(Args::Optional),
        "else" | "endif" | "endforeach" | "endfor" | "endwhile" => Some(Args::None),
        _ => None,
    }
}

fn lower_control(found: &Found, site: &Site<'_>) -> Result<Item> {
    let src = found.args.as_deref().unwrap_or("");
    let expr = |src: &str| parse_expr(src).map_err(|e| compile_error(site, e.message));

    let item = match found.name.as_str() {
        "if" => Item::Open(Open::Conditional {
            block: Block::If,
            condition: expr(src)?,
        }),
        "elseif" => Item::ElseIf(expr(src)?),
        "else" => Item::Else,
        "endif" => Item::Close(Block::If),
        "foreach" => Item::Open(Open::Foreach(
            parse_foreach(src).map_err(|e| compile_error(site, e.message))?,
        )),
        "endforeach" => Item::Close(Block::Foreach),
        "for" => Item::Open(Open::For(
            parse_for(src).map_err(|e| compile_error(site, e.message))?,
        )),
        "endfor" => Item::Close(Block::For),
        "while" => Item::Open(Open::While(expr(src)?)),
        "endwhile" => Item::Close(Block::While),
        "break" => Item::Node(Node::Break(optional_condition(found, site)?)),
        "continue" => Item::Node(Node::Continue(optional_condition(found, site)?)),
        other => return Err(compile_error(site, format!("unknown control directive @{}", other))),
    };
    Ok(item)
}

fn auth_args(name: &str) -> Option<Args> {
    matches!(name, "auth" | "endauth" | "guest" | "endguest").then_some(Args::None)
}

fn lower_auth(found: &Found, _site: &Site<'_>) -> Result<Item> {
    Ok(match found.name.as_str() {
        "auth" => Item::Open(Open::Conditional {
            block: Block::Auth,
            condition: Expr::Check(Check::Authenticated),
        }),
        "guest" => Item::Open(Open::Conditional {
            block: Block::Guest,
            condition: Expr::Check(Check::Guest),
        }),
        "endauth" => Item::Close(Block::Auth),
        _ => Item::Close(Block::Guest),
    })
}

fn policy_args(name: &str) -> Option<Args> {
    match name {
        "can" | "cannot" => Some(Args::Required),
        "endcan" | "endcannot" => Some(Args::None),
        _ => None,
    }
}

fn lower_policy(found: &Found, site: &Site<'_>) -> Result<Item> {
    match found.name.as_str() {
        "endcan" => return Ok(Item::Close(Block::Can)),
        "endcannot" => return Ok(Item::Close(Block::Cannot)),
        _ => {}
    }

    let mut args = args_list(found, site)?;
    let ability = name_arg(&args, found, site)?;
    args.remove(0);

    let (block, check) = if found.name == "can" {
        (Block::Can, Check::Allows { ability, args })
    } else {
        (Block::Cannot, Check::Denies { ability, args })
    };
    Ok(Item::Open(Open::Conditional {
        block,
        condition: Expr::Check(check),
    }))
}

fn component_args(name: &str) -> Option<Args> {
    match name {
        "component" | "slot" => Some(Args::Required),
        "endcomponent" | "endslot" => Some(Args::None),
        _ => None,
    }
}

fn lower_component(found: &Found, site: &Site<'_>) -> Result<Item> {
    let node = match found.name.as_str() {
        "endcomponent" => Node::ComponentEnd,
        "endslot" => Node::SlotEnd,
        "slot" => {
            let args = args_list(found, site)?;
            arg_count(&args, 1, found, site)?;
            Node::SlotStart(name_arg(&args, found, site)?)
        }
        _ => {
            let mut args = args_list(found, site)?;
            arg_count(&args, 2, found, site)?;
            let name = name_arg(&args, found, site)?;
            let data = if args.len() == 2 { args.pop() } else { None };
            Node::ComponentStart { name, data }
        }
    };
    Ok(Item::Node(node))
}

fn component_slot_args(name: &str) -> Option<Args> {
    match name {
        "componentSlot" | "hasComponentSlot" => Some(Args::Required),
        "endHasComponentSlot" => Some(Args::None),
        _ => None,
    }
}

fn lower_component_slot(found: &Found, site: &Site<'_>) -> Result<Item> {
    if found.name == "endHasComponentSlot" {
        return Ok(Item::Close(Block::HasSlot));
    }

    let args = args_list(found, site)?;
    let name = name_arg(&args, found, site)?;

    if found.name == "hasComponentSlot" {
        arg_count(&args, 1, found, site)?;
        return Ok(Item::Open(Open::Conditional {
            block: Block::HasSlot,
            condition: Expr::Check(Check::HasSlot(name)),
        }));
    }

    arg_count(&args, 2, found, site)?;
    let default = match args.get(1) {
        None => String::new(),
        Some(expr) => expr
            .as_str_literal()
            .map(str::to_string)
            .ok_or_else(|| compile_error(site, "@componentSlot default must be a quoted string"))?,
    };
    Ok(Item::Node(Node::ComponentSlot { name, default }))
}

fn lower_include(found: &Found, site: &Site<'_>) -> Result<Item> {
    let mut args = args_list(found, site)?;
    arg_count(&args, 2, found, site)?;
    let name = name_arg(&args, found, site)?;
    let data = if args.len() == 2 { args.pop() } else { None };
    Ok(Item::Node(Node::Include { name, data }))
}

fn push_args(name: &str) -> Option<Args> {
    match name {
        "push" | "stack" => Some(Args::Required),
        "endpush" => Some(Args::None),
        _ => None,
    }
}

fn lower_push(found: &Found, site: &Site<'_>) -> Result<Item> {
    if found.name == "endpush" {
        return Ok(Item::Node(Node::PushEnd));
    }
    let mut args = args_list(found, site)?;
    if found.name == "push" {
        arg_count(&args, 1, found, site)?;
        return Ok(Item::Node(Node::PushStart(name_arg(&args, found, site)?)));
    }
    arg_count(&args, 2, found, site)?;
    let name = name_arg(&args, found, site)?;
    let default = if args.len() == 2 { args.pop() } else { None };
    Ok(Item::Node(Node::Stack { name, default }))
}
