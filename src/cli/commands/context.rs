//! Shared setup for commands: configuration and engine construction.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{load_config, validate, QuireConfig};
use crate::error::Result;
use crate::view::Engine;

/// Where a command runs and how it loads configuration.
#[derive(Debug, Clone)]
pub struct CommandContext {
    project_root: PathBuf,
    config_override: Option<PathBuf>,
    view_debug: bool,
}

impl CommandContext {
    /// Create a context for the given project root.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            config_override: None,
            view_debug: false,
        }
    }

    /// Load configuration from this file instead of `.quire/`.
    pub fn with_config(mut self, path: Option<PathBuf>) -> Self {
        self.config_override = path;
        self
    }

    /// Force debug rendering regardless of configuration.
    pub fn with_view_debug(mut self, view_debug: bool) -> Self {
        self.view_debug = view_debug;
        self
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Config file given with `--config`, if any.
    pub fn config_override(&self) -> Option<&Path> {
        self.config_override.as_deref()
    }

    /// Load and validate configuration.
    pub fn config(&self) -> Result<QuireConfig> {
        let mut config = load_config(&self.project_root, self.config_override())?;
        if self.view_debug {
            config.debug = true;
        }
        validate(&config, &self.project_root)?;
        Ok(config)
    }

    /// Build an engine from validated configuration.
    pub fn engine(&self) -> Result<Engine> {
        let config = self.config()?;
        debug!(
            root = %self.project_root.display(),
            views = %config.views.display(),
            debug = config.debug,
            "Creating engine"
        );
        Ok(Engine::new(config.engine_options(&self.project_root))?
            .with_components(config.component_registry()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn engine_uses_project_views() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("views")).unwrap();
        fs::write(temp.path().join("views/home.html"), "Hello").unwrap();

        let mut engine = CommandContext::new(temp.path()).engine().unwrap();
        assert_eq!(
            engine.try_render("home", Default::default()).unwrap(),
            "Hello"
        );
    }

    #[test]
    fn view_debug_overrides_config() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("views")).unwrap();

        let config = CommandContext::new(temp.path())
            .with_view_debug(true)
            .config()
            .unwrap();
        assert!(config.debug);
    }

    #[test]
    fn missing_views_is_validation_error() {
        let temp = TempDir::new().unwrap();
        let err = CommandContext::new(temp.path()).engine().unwrap_err();
        assert!(matches!(err, ViewError::ConfigValidationError { .. }));
    }
}
