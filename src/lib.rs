//! Quire - a template compiler and renderer.
//!
//! Quire compiles directive-based view templates into a serialized program,
//! caches the result on disk with a dependency manifest, and renders it with
//! layouts, sections, components, slots, loops and stacks.
//!
//! # Modules
//!
//! - [`cache`] - Artifact store, dependency manifest and freshness checks
//! - [`cli`] - Command-line interface and argument parsing
//! - [`compiler`] - Template source to program compilation
//! - [`component`] - Component abstraction and registry
//! - [`config`] - Configuration loading, parsing, and validation
//! - [`error`] - Error types and result aliases
//! - [`expr`] - Expression language used inside templates
//! - [`registry`] - Directive, filter and function registry
//! - [`ui`] - Terminal output and prompts
//! - [`view`] - Template resolution and rendering
//!
//! # Example
//!
//! ```
//! use quire::view::{Engine, EngineOptions};
//! use serde_json::json;
//! use std::fs;
//! use tempfile::TempDir;
//!
//! let temp = TempDir::new().unwrap();
//! fs::write(temp.path().join("greeting.html"), "Hello, {{ $name }}!").unwrap();
//!
//! let mut engine = Engine::new(EngineOptions::new(temp.path())).unwrap();
//! let data = json!({"name": "<Ada>"}).as_object().cloned().unwrap();
//! assert_eq!(engine.render("greeting", data).unwrap(), "Hello, &lt;Ada&gt;!");
//! ```

pub mod cache;
pub mod cli;
pub mod compiler;
pub mod component;
pub mod config;
pub mod error;
pub mod expr;
pub mod registry;
pub mod ui;
pub mod view;

pub use error::{Result, ViewError};
