//! Configuration file discovery and loading.
//!
//! This module handles finding and loading configuration files and
//! applying environment overrides.

use crate::config::merger::merge_configs;
use crate::config::schema::QuireConfig;
use crate::error::{Result, ViewError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory holding project configuration.
pub const CONFIG_DIR: &str = ".quire";

/// Environment variable overriding `debug`.
pub const DEBUG_ENV: &str = "QUIRE_DEBUG";

/// Paths to configuration files in priority order (later overrides earlier).
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Project config: .quire/config.yml
    pub project: Option<PathBuf>,

    /// Local overrides: .quire/config.local.yml
    pub project_local: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover config files for the given project root.
    pub fn discover(project_root: &Path) -> Self {
        let existing = |file: &str| {
            let path = project_root.join(CONFIG_DIR).join(file);
            path.exists().then_some(path)
        };
        Self {
            project: existing("config.yml"),
            project_local: existing("config.local.yml"),
        }
    }

    /// Returns all existing config paths in merge order.
    pub fn all_existing(&self) -> Vec<&PathBuf> {
        self.project.iter().chain(self.project_local.iter()).collect()
    }

    /// Check if any project config exists.
    pub fn has_project_config(&self) -> bool {
        self.project.is_some()
    }
}

/// Find the project root by walking up from `start`.
///
/// Looks for a `.quire` directory first, then falls back to `.git`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(CONFIG_DIR).is_dir() || current.join(".git").exists() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load a config file as a raw YAML value (for merging).
pub fn load_config_value(path: &Path) -> Result<serde_yaml::Value> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ViewError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ViewError::Io(e)
        }
    })?;

    if content.trim().is_empty() {
        return Ok(serde_yaml::Value::Mapping(Default::default()));
    }

    serde_yaml::from_str(&content).map_err(|e| ViewError::ConfigParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load a single config file without merging.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<QuireConfig> {
    let value = load_config_value(path)?;
    serde_yaml::from_value(value).map_err(|e| ViewError::ConfigParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load `.quire/config.yml` with `.quire/config.local.yml` laid over it.
///
/// A project without configuration gets the defaults.
pub fn load_merged_config(project_root: &Path) -> Result<QuireConfig> {
    let paths = ConfigPaths::discover(project_root);
    if !paths.has_project_config() && paths.project_local.is_none() {
        debug!(root = %project_root.display(), "No configuration found, using defaults");
        return Ok(QuireConfig::default());
    }

    let layers = paths
        .all_existing()
        .into_iter()
        .map(|path| load_config_value(path))
        .collect::<Result<Vec<_>>>()?;

    serde_yaml::from_value(merge_configs(&layers)).map_err(|e| ViewError::ConfigParseError {
        path: project_root.join(CONFIG_DIR).join("config.yml"),
        message: format!("Failed to parse merged config: {}", e),
    })
}

/// Apply environment overrides, reading variables through `lookup`.
pub fn apply_env_overrides<F>(config: &mut QuireConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(debug) = lookup(DEBUG_ENV).as_deref().and_then(parse_flag) {
        config.debug = debug;
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Load config with optional path override, then apply `QUIRE_DEBUG`.
///
/// If `config_override` is provided, loads only that file without merging.
pub fn load_config(project_root: &Path, config_override: Option<&Path>) -> Result<QuireConfig> {
    let mut config = match config_override {
        Some(path) => load_config_file(path)?,
        None => load_merged_config(project_root)?,
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(CONFIG_DIR);
        fs::create_dir_all(&dir).unwrap();
        for (name, content) in files {
            fs::write(dir.join(name), content).unwrap();
        }
        temp
    }

    #[test]
    fn discover_finds_project_and_local_config() {
        let temp = project(&[("config.yml", ""), ("config.local.yml", "")]);
        let paths = ConfigPaths::discover(temp.path());
        assert!(paths.has_project_config());
        assert!(paths.project_local.is_some());
        assert_eq!(paths.all_existing().len(), 2);
    }

    #[test]
    fn missing_config_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_merged_config(temp.path()).unwrap();
        assert_eq!(config, QuireConfig::default());
    }

    #[test]
    fn local_config_overrides_project_config() {
        let temp = project(&[
            ("config.yml", "views: app/views\nmax_depth: 20"),
            ("config.local.yml", "max_depth: 5\ndebug: true"),
        ]);
        let config = load_merged_config(temp.path()).unwrap();
        assert_eq!(config.views, PathBuf::from("app/views"));
        assert_eq!(config.max_depth, 5);
        assert!(config.debug);
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let temp = project(&[("config.yml", "views: [unclosed")]);
        let err = load_merged_config(temp.path()).unwrap_err();
        assert!(matches!(err, ViewError::ConfigParseError { .. }));
    }

    #[test]
    fn wrong_type_is_parse_error() {
        let temp = project(&[("config.yml", "max_depth: deep")]);
        let err = load_merged_config(temp.path()).unwrap_err();
        assert!(matches!(err, ViewError::ConfigParseError { .. }));
    }

    #[test]
    fn explicit_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = load_config_file(&temp.path().join("nope.yml")).unwrap_err();
        assert!(matches!(err, ViewError::ConfigNotFound { .. }));
    }

    #[test]
    fn env_override_sets_debug() {
        let mut config = QuireConfig::default();
        apply_env_overrides(&mut config, |key| (key == DEBUG_ENV).then(|| "true".to_string()));
        assert!(config.debug);

        apply_env_overrides(&mut config, |_| Some("0".to_string()));
        assert!(!config.debug);

        apply_env_overrides(&mut config, |_| Some("maybe".to_string()));
        assert!(!config.debug);
    }

    #[test]
    fn find_project_root_walks_up() {
        let temp = project(&[]);
        let subdir = temp.path().join("views").join("layouts");
        fs::create_dir_all(&subdir).unwrap();
        assert_eq!(find_project_root(&subdir), Some(temp.path().to_path_buf()));
    }

    #[test]
    fn find_project_root_falls_back_to_git() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        let subdir = temp.path().join("src");
        fs::create_dir_all(&subdir).unwrap();
        assert_eq!(find_project_root(&subdir), Some(temp.path().to_path_buf()));
    }
}
