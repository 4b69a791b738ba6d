//! Configuration validation rules.
//!
//! - The views directory must exist
//! - The framework views directory must exist when configured
//! - `max_depth` must be at least 1
//! - `extension` must be a non-empty file extension
//! - Component aliases need a valid name and a template

use crate::component::validate_name;
use crate::config::schema::QuireConfig;
use crate::error::{Result, ViewError};
use std::path::Path;

/// Validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    fn new(rule: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a configuration and return all errors.
///
/// All errors are collected rather than stopping at the first one.
pub fn validate_config(config: &QuireConfig, project_root: &Path) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    errors.extend(validate_paths(config, project_root));
    errors.extend(validate_settings(config));
    errors.extend(validate_components(config));
    errors
}

fn validate_paths(config: &QuireConfig, project_root: &Path) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let views = config.views_dir(project_root);
    if !views.is_dir() {
        errors.push(ValidationError::new(
            "missing-views",
            format!("Views directory does not exist: {}", views.display()),
        ));
    }

    if let Some(framework) = &config.framework_views {
        let framework = QuireConfig::resolve_path(project_root, framework);
        if !framework.is_dir() {
            errors.push(ValidationError::new(
                "missing-framework-views",
                format!("Framework views directory does not exist: {}", framework.display()),
            ));
        }
    }

    errors
}

fn validate_settings(config: &QuireConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.max_depth == 0 {
        errors.push(ValidationError::new("max-depth", "max_depth must be at least 1"));
    }

    let extension = config.extension.trim_start_matches('.');
    if extension.is_empty() || extension.contains(['/', '\\']) {
        errors.push(ValidationError::new(
            "extension",
            format!("Invalid template extension '{}'", config.extension),
        ));
    }

    errors
}

fn validate_components(config: &QuireConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (name, view) in &config.components {
        if validate_name(name).is_err() {
            errors.push(ValidationError::new(
                "component-name",
                format!("Invalid component name '{}'", name),
            ));
        }
        if view.trim().is_empty() {
            errors.push(ValidationError::new(
                "component-view",
                format!("Component '{}' has no template", name),
            ));
        }
    }

    errors
}

/// Validate and return the first errors joined into one.
pub fn validate(config: &QuireConfig, project_root: &Path) -> Result<()> {
    let errors = validate_config(config, project_root);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(ViewError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}
