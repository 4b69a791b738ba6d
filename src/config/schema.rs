//! Configuration schema definitions for quire.
//!
//! This module contains the struct that maps to `.quire/config.yml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::compiler::DEFAULT_MAX_DEPTH;
use crate::component::{AnonymousComponent, Component, ComponentRegistry};
use crate::view::{EngineOptions, DEFAULT_EXTENSION};

/// Root configuration structure for `.quire/config.yml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuireConfig {
    /// Application views directory (relative to project root)
    pub views: PathBuf,

    /// Framework views directory, searched after `views`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework_views: Option<PathBuf>,

    /// Artifact cache directory; defaults to `<views>/cache`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<PathBuf>,

    /// Template file extension, without the dot
    pub extension: String,

    /// Recompile on every render and surface errors
    #[serde(skip_serializing_if = "is_false")]
    pub debug: bool,

    /// Bound on nested compilations and renders
    pub max_depth: usize,

    /// Component aliases: name to the template that renders it
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, String>,
}

impl Default for QuireConfig {
    fn default() -> Self {
        Self {
            views: PathBuf::from("views"),
            framework_views: None,
            cache: None,
            extension: DEFAULT_EXTENSION.to_string(),
            debug: false,
            max_depth: DEFAULT_MAX_DEPTH,
            components: BTreeMap::new(),
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl QuireConfig {
    /// Resolve a configured path against the project root.
    pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            project_root.join(path)
        }
    }

    /// Absolute views directory.
    pub fn views_dir(&self, project_root: &Path) -> PathBuf {
        Self::resolve_path(project_root, &self.views)
    }

    /// Engine options with every path resolved against `project_root`.
    pub fn engine_options(&self, project_root: &Path) -> EngineOptions {
        let mut options = EngineOptions::new(self.views_dir(project_root))
            .extension(self.extension.trim_start_matches('.'))
            .debug(self.debug)
            .max_depth(self.max_depth);
        if let Some(framework) = &self.framework_views {
            options = options.framework_views(Self::resolve_path(project_root, framework));
        }
        if let Some(cache) = &self.cache {
            options = options.cache(Self::resolve_path(project_root, cache));
        }
        options
    }

    /// A component registry with one template-backed factory per alias.
    pub fn component_registry(&self) -> ComponentRegistry {
        self.components
            .iter()
            .fold(ComponentRegistry::new(), |registry, (name, view)| {
                let (name, view) = (name.clone(), view.clone());
                registry.register(name.clone(), move |data| {
                    Ok(Box::new(AnonymousComponent::new(name.clone(), view.clone(), data))
                        as Box<dyn Component>)
                })
            })
    }
}
