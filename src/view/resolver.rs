//! Template source resolution.
//!
//! Resolution order (first match wins):
//! 1. Application views directory
//! 2. Framework views directory, when configured

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compiler::SourceLoader;
use crate::error::{Result, ViewError};

/// Where a resolved template came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRoot {
    Application,
    Framework,
}

/// Maps logical template names to source files.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    app_root: PathBuf,
    framework_root: Option<PathBuf>,
    extension: String,
    /// Directory skipped when listing templates (the artifact cache).
    exclude: Option<PathBuf>,
}

impl TemplateResolver {
    pub fn new(app_root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            app_root: app_root.into(),
            framework_root: None,
            extension: extension.into(),
            exclude: None,
        }
    }

    pub fn with_framework_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.framework_root = Some(root.into());
        self
    }

    pub fn excluding(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exclude = Some(dir.into());
        self
    }

    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    pub fn framework_root(&self) -> Option<&Path> {
        self.framework_root.as_deref()
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Relative source path for a logical name: `layouts.app` becomes
    /// `layouts/app.<ext>`. Empty names and `..` segments yield `None`.
    pub fn relative_path(&self, name: &str) -> Option<PathBuf> {
        let segments: Vec<&str> = name
            .split(['.', '/'])
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() || name.contains("..") {
            return None;
        }
        let mut path: PathBuf = segments.iter().collect();
        let file = format!("{}.{}", segments[segments.len() - 1], self.extension);
        path.set_file_name(file);
        Some(path)
    }

    /// Source path of `name`, or `None` when no root has it.
    pub fn find(&self, name: &str) -> Option<(PathBuf, SourceRoot)> {
        let relative = self.relative_path(name)?;
        self.candidates(&relative)
            .into_iter()
            .find(|(path, _)| path.is_file())
    }

    /// Source path of `name`, or [`ViewError::SourceNotFound`] listing the
    /// searched paths.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        if let Some((path, _)) = self.find(name) {
            return Ok(path);
        }
        let searched = match self.relative_path(name) {
            Some(relative) => self
                .candidates(&relative)
                .into_iter()
                .map(|(p, _)| p)
                .collect(),
            None => Vec::new(),
        };
        Err(ViewError::SourceNotFound {
            name: name.to_string(),
            searched,
        })
    }

    /// Resolve and read the source of `name`.
    pub fn read(&self, name: &str) -> Result<(PathBuf, String)> {
        let path = self.resolve(name)?;
        let source = fs::read_to_string(&path)?;
        Ok((path, source))
    }

    fn candidates(&self, relative: &Path) -> Vec<(PathBuf, SourceRoot)> {
        let mut paths = vec![(self.app_root.join(relative), SourceRoot::Application)];
        if let Some(framework) = &self.framework_root {
            paths.push((framework.join(relative), SourceRoot::Framework));
        }
        paths
    }

    /// Every logical name available under the configured roots, sorted.
    pub fn template_names(&self) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        self.collect(&self.app_root, &self.app_root, &mut names)?;
        if let Some(framework) = &self.framework_root {
            self.collect(framework, framework, &mut names)?;
        }
        Ok(names.into_iter().collect())
    }

    fn collect(&self, root: &Path, dir: &Path, names: &mut BTreeSet<String>) -> Result<()> {
        if !dir.is_dir() {
            return Ok(());
        }
        if self.exclude.as_deref().is_some_and(|ex| ex == dir) {
            return Ok(());
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.collect(root, &path, names)?;
            } else if path
                .extension()
                .map(|e| e == self.extension.as_str())
                .unwrap_or(false)
            {
                let Ok(relative) = path.with_extension("").strip_prefix(root).map(Path::to_path_buf)
                else {
                    continue;
                };
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(".");
                names.insert(name);
            }
        }

        Ok(())
    }
}

impl SourceLoader for TemplateResolver {
    fn load_source(&self, name: &str) -> Result<Option<String>> {
        match self.find(name) {
            Some((path, _)) => Ok(Some(fs::read_to_string(path)?)),
            None => Ok(None),
        }
    }
}
