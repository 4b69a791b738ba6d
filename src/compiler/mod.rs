//! Template compiler.
//!
//! Turns template source into a [`Program`] plus the list of templates it
//! depends on. Compilation runs in fixed stages:
//!
//! 1. cycle and depth guard against the stack of in-progress compilations
//! 2. in-memory cache lookup keyed by SHA-256 of source and name
//! 3. verbatim blocks, comments and `@@` escapes are hidden
//! 4. the line-oriented structural pass (`@extends`, `@section`, ...)
//! 5. directive passes over the remaining text, in a fixed order
//! 6. block directives are assembled into a tree
//!
//! Include targets are compiled recursively through a [`SourceLoader`], so
//! an include cycle is reported before anything is rendered.

mod assemble;
mod fragment;
pub mod ir;
mod markers;
mod pipeline;
mod scan;
mod structural;

pub use ir::{Branch, Node, Program, PROGRAM_VERSION};

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, ViewError};
use crate::registry::Registry;
use assemble::assemble;
use fragment::{Fragment, Item, Located, Passes};
use markers::Markers;
use structural::{split_structure, Chunk};

/// Default bound on nested compilations and renders.
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Longest excerpt of template source quoted in a compile error.
const EXCERPT_LEN: usize = 60;

/// Reads the source of other templates during compilation.
pub trait SourceLoader {
    /// Source text of `name`, or `None` when no such template exists.
    fn load_source(&self, name: &str) -> Result<Option<String>>;
}

/// Output of one compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    pub program: Program,
    /// Layout and include targets, transitively through includes, without
    /// the template itself.
    pub dependencies: Vec<String>,
}

/// Compiles templates against a fixed registry.
pub struct Compiler {
    registry: Arc<Registry>,
    max_depth: usize,
    cache: HashMap<String, CompiledTemplate>,
    stack: Vec<String>,
}

impl Compiler {
    pub fn new(registry: Arc<Registry>, max_depth: usize) -> Self {
        Self {
            registry,
            max_depth,
            cache: HashMap::new(),
            stack: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Compile `source` as the template `name`.
    pub fn compile(
        &mut self,
        source: &str,
        name: &str,
        loader: &dyn SourceLoader,
    ) -> Result<CompiledTemplate> {
        if self.stack.iter().any(|n| n == name) {
            let mut cycle = self.stack.clone();
            cycle.push(name.to_string());
            return Err(ViewError::CyclicInclude {
                cycle: cycle.join(" -> "),
            });
        }
        if self.stack.len() >= self.max_depth {
            return Err(ViewError::RecursionLimitExceeded {
                name: name.to_string(),
                limit: self.max_depth,
            });
        }

        let key = cache_key(source, name);
        if let Some(hit) = self.cache.get(&key) {
            debug!(template = %name, "Compilation cache hit");
            return Ok(hit.clone());
        }

        self.stack.push(name.to_string());
        let result = self.compile_uncached(source, name, loader);
        self.stack.pop();

        let compiled = result?;
        self.cache.insert(key, compiled.clone());
        Ok(compiled)
    }

    fn compile_uncached(
        &mut self,
        source: &str,
        name: &str,
        loader: &dyn SourceLoader,
    ) -> Result<CompiledTemplate> {
        debug!(template = %name, "Compiling template");

        let (protected, markers) = Markers::protect(source);
        let chunks = split_structure(&protected, name)?;

        let registry = Arc::clone(&self.registry);
        let mut passes = Passes::new(name, &registry);
        let mut fragments = Vec::new();
        let mut dependencies = Vec::new();

        for chunk in chunks {
            match chunk {
                Chunk::Text { text, line } => fragments.extend(passes.run(&text, line)?),
                Chunk::Directive {
                    node,
                    line,
                    excerpt,
                } => {
                    if let Node::Extends(layout) = &node {
                        dependencies.push(layout.clone());
                    }
                    fragments.push(located(node, line, excerpt));
                }
                Chunk::Section {
                    name: section,
                    body,
                    body_line,
                    show,
                    line,
                    excerpt,
                } => {
                    let body = assemble(passes.run(&body, body_line)?, name, &markers)?;
                    let node = Node::Section {
                        name: section,
                        body,
                        show,
                    };
                    fragments.push(located(node, line, excerpt));
                }
            }
        }

        let nodes = assemble(fragments, name, &markers)?;
        let includes = std::mem::take(&mut passes.includes);

        for include in includes {
            dependencies.push(include.clone());
            match loader.load_source(&include)? {
                Some(child_source) => {
                    let child = self.compile(&child_source, &include, loader)?;
                    dependencies.extend(child.dependencies);
                }
                None => debug!(template = %name, include = %include, "Include target not found at compile time"),
            }
        }

        let mut seen = std::collections::HashSet::new();
        dependencies.retain(|d| d != name && seen.insert(d.clone()));

        Ok(CompiledTemplate {
            program: Program::new(name, nodes),
            dependencies,
        })
    }

    /// Drop every cached compilation.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Number of cached compilations.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

fn cache_key(source: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(name.as_bytes());
    hex::encode(hasher.finalize())
}

fn located(node: Node, line: usize, excerpt: String) -> Fragment {
    Fragment::Item(Located {
        item: Item::Node(node),
        line,
        excerpt,
    })
}

/// Where in a template a construct was found.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Site<'a> {
    pub template: &'a str,
    pub line: usize,
    pub excerpt: &'a str,
}

pub(crate) fn compile_error(site: &Site<'_>, message: impl Into<String>) -> ViewError {
    ViewError::CompileError {
        template: site.template.to_string(),
        line: site.line,
        excerpt: excerpt(site.excerpt),
        message: message.into(),
    }
}

pub(crate) fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_LEN).collect()
}
