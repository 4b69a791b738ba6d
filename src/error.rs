//! Error types for quire operations.
//!
//! This module defines [`ViewError`], the error type shared by the compiler,
//! the cache store and the renderer, and a [`Result`] type alias.
//!
//! # Error Handling Strategy
//!
//! - Structural template problems (sections, filters, directives) are never
//!   recovered; they surface at the render boundary
//! - A corrupt manifest or an unresolvable dependency is recovered locally by
//!   treating the artifact as stale
//! - Use `anyhow::Error` (via `ViewError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for template compilation and rendering.
#[derive(Debug, Error)]
pub enum ViewError {
    /// Neither the application nor the framework root has the template.
    #[error("Template not found: {name} (searched: {})", display_paths(searched))]
    SourceNotFound { name: String, searched: Vec<PathBuf> },

    /// A template includes itself through a chain of includes or layouts.
    #[error("Cyclic template dependency: {cycle}")]
    CyclicInclude { cycle: String },

    /// Nesting of compilations or renders went past the configured bound.
    #[error("Template nesting exceeded the maximum depth of {limit} at '{name}'")]
    RecursionLimitExceeded { name: String, limit: usize },

    /// A section was still open at the end of the template.
    #[error("Unterminated section '{section}' in template '{template}'")]
    UnterminatedSection { template: String, section: String },

    /// A section was opened while another one was still capturing.
    #[error(
        "Nested sections are not supported: section '{open}' is not closed before '{nested}' (template '{template}', line {line})"
    )]
    NestedSection {
        template: String,
        open: String,
        nested: String,
        line: usize,
    },

    /// A filter pipeline referenced a filter that was never registered.
    #[error("Filter '{name}' is not registered (template '{template}', line {line})")]
    UnregisteredFilter {
        template: String,
        name: String,
        line: usize,
    },

    /// A custom directive handler failed while expanding.
    #[error("Directive '@{directive}' failed at line {line} of '{template}': {message}")]
    DirectiveExpansionFailure {
        template: String,
        directive: String,
        line: usize,
        message: String,
    },

    /// A directive matched but its arguments could not be compiled.
    #[error("Compile error in '{template}' at line {line} near `{excerpt}`: {message}")]
    CompileError {
        template: String,
        line: usize,
        excerpt: String,
        message: String,
    },

    /// The manifest file exists but is not valid JSON.
    #[error("Manifest at {path} is corrupt: {message}")]
    ManifestCorrupt { path: PathBuf, message: String },

    /// An artifact or the manifest could not be written.
    #[error("Failed to write cache file {path}: {message}")]
    CacheWriteFailure { path: PathBuf, message: String },

    /// A component name could not be turned into a component instance.
    #[error("Cannot resolve component '{name}': {message}")]
    ComponentResolutionFailure { name: String, message: String },

    /// The compiled program failed while being evaluated.
    #[error("Error evaluating template '{template}': {message}")]
    EvaluationFailure { template: String, message: String },

    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ViewError {
    /// Build an evaluation failure for `template`.
    pub fn evaluation(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EvaluationFailure {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Whether this error comes from the structure of the template itself
    /// (as opposed to I/O, configuration or evaluation problems).
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::CyclicInclude { .. }
                | Self::UnterminatedSection { .. }
                | Self::NestedSection { .. }
                | Self::UnregisteredFilter { .. }
                | Self::DirectiveExpansionFailure { .. }
                | Self::CompileError { .. }
        )
    }
}

/// Result type alias for quire operations.
pub type Result<T> = std::result::Result<T, ViewError>;
