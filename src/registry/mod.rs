//! Directive, filter and function tables.
//!
//! A [`Registry`] is assembled once through [`RegistryBuilder`] and then
//! shared as an `Arc<Registry>` by the compiler and the renderer. Nothing
//! can be registered after [`RegistryBuilder::build`].
//!
//! ```
//! use quire::registry::{Expansion, Registry};
//! use serde_json::Value;
//!
//! let registry = Registry::builder()
//!     .directive("datetime", |args| Ok(Expansion::Echo(format!("{} | date('%H:%M')", args))))
//!     .filter("shout", |value, _| Ok(Value::String(format!("{}!", value.as_str().unwrap_or_default()))))
//!     .build();
//!
//! assert!(registry.has_directive("datetime"));
//! assert!(registry.has_filter("shout"));
//! assert!(registry.has_filter("upper"));
//! ```

mod directives;
mod filters;
mod functions;

pub use directives::Expansion;
pub use filters::FilterDef;

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Handler for a custom directive: receives the raw argument text between
/// the parentheses (empty when the directive has none).
pub type DirectiveFn = dyn Fn(&str) -> anyhow::Result<Expansion> + Send + Sync;

/// Handler for a filter: receives the piped value and evaluated arguments.
pub type FilterFn = dyn Fn(&Value, &[Value]) -> anyhow::Result<Value> + Send + Sync;

/// Handler for a function callable from expressions.
pub type FunctionFn = dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync;

/// Immutable lookup tables consulted during compilation and rendering.
#[derive(Clone, Default)]
pub struct Registry {
    directives: HashMap<String, Arc<DirectiveFn>>,
    filters: HashMap<String, FilterDef>,
    functions: HashMap<String, Arc<FunctionFn>>,
}

impl Registry {
    /// Start a builder preloaded with the built-in filters and functions.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
            .with_filters(filters::builtin())
            .with_functions(functions::builtin())
    }

    /// A registry holding only the built-ins.
    pub fn with_builtins() -> Arc<Self> {
        Self::builder().build()
    }

    pub fn directive(&self, name: &str) -> Option<&Arc<DirectiveFn>> {
        self.directives.get(name)
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    pub fn filter(&self, name: &str) -> Option<&FilterDef> {
        self.filters.get(name)
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Whether the named filter's output bypasses HTML escaping.
    pub fn is_safe_filter(&self, name: &str) -> bool {
        self.filters.get(name).is_some_and(|f| f.safe)
    }

    pub fn function(&self, name: &str) -> Option<&Arc<FunctionFn>> {
        self.functions.get(name)
    }

    /// Registered directive names, sorted.
    pub fn directive_names(&self) -> Vec<&str> {
        sorted_keys(&self.directives)
    }

    /// Registered filter names, sorted.
    pub fn filter_names(&self) -> Vec<&str> {
        sorted_keys(&self.filters)
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("directives", &self.directive_names())
            .field("filters", &self.filter_names())
            .field("functions", &sorted_keys(&self.functions))
            .finish()
    }
}

/// Collects registrations before the registry is frozen.
#[derive(Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    /// Register a custom directive. Later registrations replace earlier ones.
    pub fn directive<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<Expansion> + Send + Sync + 'static,
    {
        self.registry
            .directives
            .insert(name.into(), Arc::new(handler));
        self
    }

    /// Register a filter whose output is HTML-escaped when it ends a pipeline.
    pub fn filter<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.with_filter(name, FilterDef::new(handler))
    }

    /// Register a filter whose output is emitted without escaping.
    pub fn safe_filter<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.with_filter(name, FilterDef::safe(handler))
    }

    /// Register a function callable from expressions.
    pub fn function<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.registry.functions.insert(name.into(), Arc::new(handler));
        self
    }

    fn with_filter(mut self, name: impl Into<String>, def: FilterDef) -> Self {
        self.registry.filters.insert(name.into(), def);
        self
    }

    fn with_filters(mut self, defs: Vec<(&'static str, FilterDef)>) -> Self {
        for (name, def) in defs {
            self.registry.filters.insert(name.to_string(), def);
        }
        self
    }

    fn with_functions(mut self, defs: Vec<(&'static str, Arc<FunctionFn>)>) -> Self {
        for (name, f) in defs {
            self.registry.functions.insert(name.to_string(), f);
        }
        self
    }

    /// Freeze the tables.
    pub fn build(self) -> Arc<Registry> {
        Arc::new(self.registry)
    }
}
