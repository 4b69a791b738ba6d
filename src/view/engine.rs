//! The rendering engine: resolve, check freshness, compile if stale,
//! evaluate.

use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use super::evaluator::Evaluator;
use super::host::{GuestHost, ViewHost};
use super::resolver::TemplateResolver;
use crate::cache::{default_cache_dir, ArtifactInfo, ArtifactStore, Freshness, FreshnessCheck};
use crate::compiler::{CompiledTemplate, Compiler, Program, DEFAULT_MAX_DEPTH};
use crate::component::ComponentRegistry;
use crate::error::{Result, ViewError};
use crate::registry::Registry;

/// Returned by [`Engine::render`] outside debug mode when rendering fails.
pub const RENDER_FAILURE: &str = r#"<div class="error">Failed to render page</div>"#;

/// Default template file extension.
pub const DEFAULT_EXTENSION: &str = "html";

/// Where templates live and how the engine behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub views: PathBuf,
    pub framework_views: Option<PathBuf>,
    /// Defaults to `<views>/cache`.
    pub cache: Option<PathBuf>,
    pub extension: String,
    pub debug: bool,
    pub max_depth: usize,
}

impl EngineOptions {
    pub fn new(views: impl Into<PathBuf>) -> Self {
        Self {
            views: views.into(),
            framework_views: None,
            cache: None,
            extension: DEFAULT_EXTENSION.to_string(),
            debug: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn framework_views(mut self, dir: impl Into<PathBuf>) -> Self {
        self.framework_views = Some(dir.into());
        self
    }

    pub fn cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache = Some(dir.into());
        self
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The cache directory in effect.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .clone()
            .unwrap_or_else(|| default_cache_dir(&self.views))
    }
}

/// A template engine bound to one views directory and cache.
pub struct Engine {
    debug: bool,
    max_depth: usize,
    resolver: TemplateResolver,
    store: ArtifactStore,
    compiler: Compiler,
    components: ComponentRegistry,
    host: Box<dyn ViewHost>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("debug", &self.debug)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine with the built-in registry and a guest host.
    ///
    /// The views directory (and framework directory, when set) must exist;
    /// the cache directory is created if missing.
    pub fn new(options: EngineOptions) -> Result<Self> {
        if !options.views.is_dir() {
            return Err(ViewError::ConfigValidationError {
                message: format!("Views directory not found: {}", options.views.display()),
            });
        }
        if let Some(framework) = &options.framework_views {
            if !framework.is_dir() {
                return Err(ViewError::ConfigValidationError {
                    message: format!("Framework views directory not found: {}", framework.display()),
                });
            }
        }

        let cache = options.cache_dir();
        fs::create_dir_all(&cache).map_err(|e| ViewError::CacheWriteFailure {
            path: cache.clone(),
            message: format!("Failed to create cache directory: {}", e),
        })?;

        let mut resolver = TemplateResolver::new(&options.views, &options.extension).excluding(&cache);
        if let Some(framework) = &options.framework_views {
            resolver = resolver.with_framework_root(framework);
        }

        Ok(Self {
            debug: options.debug,
            max_depth: options.max_depth,
            resolver,
            store: ArtifactStore::new(cache),
            compiler: Compiler::new(Registry::with_builtins(), options.max_depth),
            components: ComponentRegistry::new(),
            host: Box::new(GuestHost),
        })
    }

    /// Use a custom registry. Clears the in-memory compile cache.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.compiler = Compiler::new(registry, self.max_depth);
        self
    }

    pub fn with_components(mut self, components: ComponentRegistry) -> Self {
        self.components = components;
        self
    }

    pub fn with_host(mut self, host: impl ViewHost + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn resolver(&self) -> &TemplateResolver {
        &self.resolver
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.compiler.registry()
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    pub fn host(&self) -> &dyn ViewHost {
        self.host.as_ref()
    }

    /// Render `name` with `data`.
    ///
    /// Outside debug mode a failure is logged and replaced by
    /// [`RENDER_FAILURE`]; in debug mode the error is returned.
    pub fn render(&mut self, name: &str, data: Map<String, Value>) -> Result<String> {
        match self.try_render(name, data) {
            Ok(output) => Ok(output),
            Err(err) => {
                error!(template = %name, "Failed to render template: {}", err);
                if self.debug {
                    Err(err)
                } else {
                    Ok(RENDER_FAILURE.to_string())
                }
            }
        }
    }

    /// Render `name`, returning any failure regardless of debug mode.
    pub fn try_render(&mut self, name: &str, data: Map<String, Value>) -> Result<String> {
        debug!(template = %name, "Rendering template");
        Evaluator::new(self).render_template(name, data, None)
    }

    /// Freshness of the cached artifact for `name`.
    pub fn freshness(&self, name: &str) -> Result<Freshness> {
        let source = self.resolver.resolve(name)?;
        FreshnessCheck::new(&self.store, self.debug)
            .check(name, &source, |dep| self.resolver.find(dep).map(|(p, _)| p))
    }

    /// Load the program for `name`, compiling and storing it when the cached
    /// artifact is stale or unreadable.
    pub(crate) fn load_program(&mut self, name: &str) -> Result<Program> {
        match self.freshness(name)? {
            Freshness::Fresh => {
                if let Some(program) = self.store.read(name)?.as_deref().and_then(Program::from_json) {
                    debug!(template = %name, "Using cached artifact");
                    return Ok(program);
                }
                debug!(template = %name, "Cached artifact is unreadable, recompiling");
            }
            Freshness::Stale(reason) => {
                debug!(template = %name, reason = %reason, "Recompiling stale template");
            }
        }
        Ok(self.compile(name)?.program)
    }

    /// Compile `name` and store the artifact, whatever its freshness.
    pub fn compile(&mut self, name: &str) -> Result<CompiledTemplate> {
        let compiled = self.check(name)?;
        let json = compiled
            .program
            .to_json()
            .map_err(|e| ViewError::Other(e.into()))?;
        self.store.write(name, &json, &compiled.dependencies)?;
        Ok(compiled)
    }

    /// Compile `name` without touching the artifact cache.
    pub fn check(&mut self, name: &str) -> Result<CompiledTemplate> {
        let (_, source) = self.resolver.read(name)?;
        self.compiler.compile(&source, name, &self.resolver)
    }

    /// Remove every artifact, the manifest and the in-memory compile cache.
    pub fn clear_cache(&mut self) -> Result<usize> {
        self.compiler.clear_cache();
        self.store.clear_all()
    }

    /// Remove the artifact and manifest entry of one template.
    pub fn forget(&mut self, name: &str) -> Result<bool> {
        self.store.forget(name)
    }

    /// Remove artifacts and manifest entries older than `max_age`.
    pub fn purge(&mut self, max_age: Duration) -> Result<usize> {
        self.store.purge_older_than(max_age)
    }

    /// Total size in bytes of all artifacts.
    pub fn cache_size(&self) -> Result<u64> {
        self.store.total_size()
    }

    pub fn cache_entries(&self) -> Result<Vec<ArtifactInfo>> {
        self.store.list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, name: &str, content: &str) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn data(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn engine(temp: &TempDir) -> Engine {
        Engine::new(EngineOptions::new(temp.path())).unwrap()
    }

    #[test]
    fn missing_views_directory_is_rejected() {
        let temp = TempDir::new().unwrap();
        let result = Engine::new(EngineOptions::new(temp.path().join("nope")));
        assert!(matches!(result, Err(ViewError::ConfigValidationError { .. })));
    }

    #[test]
    fn cache_directory_defaults_under_views() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);
        assert_eq!(engine.store().root(), temp.path().join("cache"));
        assert!(temp.path().join("cache").is_dir());
    }

    #[test]
    fn renders_plain_template() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "hello.html", "Hello {{ name }}!");
        let mut engine = engine(&temp);
        let out = engine.render("hello", data(json!({"name": "<Ada>"}))).unwrap();
        assert_eq!(out, "Hello &lt;Ada&gt;!");
    }

    #[test]
    fn production_failure_returns_fixed_fragment() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(&temp);
        assert_eq!(engine.render("missing", Map::new()).unwrap(), RENDER_FAILURE);
    }

    #[test]
    fn debug_failure_returns_error() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::new(EngineOptions::new(temp.path()).debug(true)).unwrap();
        let err = engine.render("missing", Map::new()).unwrap_err();
        assert!(matches!(err, ViewError::SourceNotFound { .. }));
    }

    #[test]
    fn try_render_always_returns_error() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(&temp);
        assert!(engine.try_render("missing", Map::new()).is_err());
    }

    #[test]
    fn compile_writes_artifact_and_manifest() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "page.html", "@include('partials.nav')");
        write(temp.path(), "partials/nav.html", "<nav>");
        let mut engine = engine(&temp);

        let compiled = engine.compile("page").unwrap();
        assert_eq!(compiled.dependencies, vec!["partials.nav"]);
        assert!(engine.store().read("page").unwrap().is_some());
        assert!(engine.freshness("page").unwrap().is_fresh());
    }

    #[test]
    fn check_does_not_write() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "page.html", "x");
        let mut engine = engine(&temp);
        engine.check("page").unwrap();
        assert!(engine.store().read("page").unwrap().is_none());
    }

    #[test]
    fn clear_cache_removes_artifacts() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "page.html", "x");
        let mut engine = engine(&temp);
        engine.render("page", Map::new()).unwrap();
        assert_eq!(engine.cache_entries().unwrap().len(), 1);
        assert_eq!(engine.clear_cache().unwrap(), 1);
        assert_eq!(engine.cache_size().unwrap(), 0);
    }

    #[test]
    fn cache_directory_is_not_listed_as_templates() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "page.html", "x");
        let mut engine = engine(&temp);
        engine.render("page", Map::new()).unwrap();
        assert_eq!(engine.resolver().template_names().unwrap(), vec!["page"]);
    }
}
