//! Integration tests for the artifact cache and dependency tracking.

use quire::cache::{parse_age, ArtifactStore, Freshness, Manifest, StaleReason};
use quire::view::{Engine, EngineOptions};
use quire::ViewError;
use serde_json::Map;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

fn setup() -> (TempDir, Engine) {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "page.html", "<body>@include('partials.nav')</body>");
    write(temp.path(), "partials/nav.html", "<nav>");
    let engine = Engine::new(EngineOptions::new(temp.path())).unwrap();
    (temp, engine)
}

#[test]
fn render_records_dependencies_in_manifest() {
    let (_temp, mut engine) = setup();

    assert_eq!(engine.try_render("page", Map::new()).unwrap(), "<body><nav></body>");

    let manifest = engine.store().manifest().unwrap();
    assert_eq!(
        manifest.get("page").unwrap().dependencies,
        vec!["partials.nav".to_string()]
    );
    assert!(manifest.get("partials.nav").unwrap().dependencies.is_empty());
    assert!(engine.store().artifact_path("page").exists());
    assert!(engine.freshness("page").unwrap().is_fresh());
}

#[test]
fn second_render_reuses_artifact() {
    let (_temp, mut engine) = setup();
    engine.try_render("page", Map::new()).unwrap();

    let artifact = engine.store().artifact_path("page");
    let before_mtime = mtime(&artifact);
    let before_manifest = fs::read(engine.store().manifest_path()).unwrap();

    engine.try_render("page", Map::new()).unwrap();

    assert_eq!(mtime(&artifact), before_mtime);
    assert_eq!(fs::read(engine.store().manifest_path()).unwrap(), before_manifest);
}

#[test]
fn touching_dependency_invalidates_artifact() {
    let (temp, mut engine) = setup();
    engine.try_render("page", Map::new()).unwrap();

    let now = SystemTime::now();
    let artifact = engine.store().artifact_path("page");
    let partial = temp.path().join("partials").join("nav.html");
    set_mtime(&temp.path().join("page.html"), now - Duration::from_secs(7200));
    set_mtime(&artifact, now - Duration::from_secs(3600));
    set_mtime(&partial, now - Duration::from_secs(60));

    assert_eq!(
        engine.freshness("page").unwrap(),
        Freshness::Stale(StaleReason::SourceNewer(partial))
    );

    let stale_mtime = mtime(&artifact);
    engine.try_render("page", Map::new()).unwrap();

    assert!(engine.freshness("page").unwrap().is_fresh());
    assert!(mtime(&artifact) > stale_mtime);
}

#[test]
fn edited_partial_shows_up_in_output() {
    let (temp, mut engine) = setup();
    engine.try_render("page", Map::new()).unwrap();

    let partial = temp.path().join("partials").join("nav.html");
    fs::write(&partial, "<nav class=\"new\">").unwrap();
    set_mtime(&partial, SystemTime::now() + Duration::from_secs(60));

    assert_eq!(
        engine.try_render("page", Map::new()).unwrap(),
        "<body><nav class=\"new\"></body>"
    );
}

#[test]
fn removed_dependency_marks_artifact_stale() {
    let (temp, mut engine) = setup();
    engine.try_render("page", Map::new()).unwrap();

    fs::remove_file(temp.path().join("partials").join("nav.html")).unwrap();

    assert_eq!(
        engine.freshness("page").unwrap(),
        Freshness::Stale(StaleReason::UnresolvedDependency("partials.nav".to_string()))
    );
    let err = engine.try_render("page", Map::new()).unwrap_err();
    assert!(matches!(err, ViewError::SourceNotFound { ref name, .. } if name == "partials.nav"));
}

#[test]
fn corrupt_manifest_is_treated_as_empty() {
    let (_temp, mut engine) = setup();
    engine.try_render("page", Map::new()).unwrap();

    let manifest_path = engine.store().manifest_path();
    fs::write(&manifest_path, "{ not json").unwrap();

    assert!(matches!(
        Manifest::load(&manifest_path),
        Err(ViewError::ManifestCorrupt { .. })
    ));
    assert_eq!(
        engine.freshness("page").unwrap(),
        Freshness::Stale(StaleReason::MissingManifestEntry)
    );

    assert_eq!(engine.try_render("page", Map::new()).unwrap(), "<body><nav></body>");
    assert!(Manifest::load(&manifest_path).unwrap().get("page").is_some());
}

#[test]
fn debug_mode_always_recompiles() {
    let (temp, mut engine) = setup();
    engine.try_render("page", Map::new()).unwrap();
    drop(engine);

    let debug = Engine::new(EngineOptions::new(temp.path()).debug(true)).unwrap();
    assert_eq!(
        debug.freshness("page").unwrap(),
        Freshness::Stale(StaleReason::DebugMode)
    );
}

#[test]
fn forget_removes_one_template() {
    let (_temp, mut engine) = setup();
    engine.try_render("page", Map::new()).unwrap();

    assert!(engine.forget("page").unwrap());
    assert!(!engine.forget("page").unwrap());
    assert_eq!(
        engine.freshness("page").unwrap(),
        Freshness::Stale(StaleReason::MissingArtifact)
    );
    assert!(engine.freshness("partials.nav").unwrap().is_fresh());
}

#[test]
fn purge_removes_old_artifacts_only() {
    let (_temp, mut engine) = setup();
    engine.try_render("page", Map::new()).unwrap();

    let old = SystemTime::now() - Duration::from_secs(2 * 86_400);
    set_mtime(&engine.store().artifact_path("page"), old);

    assert_eq!(engine.purge(parse_age("1d").unwrap()).unwrap(), 1);
    assert!(!engine.store().artifact_path("page").exists());
    assert!(engine.store().artifact_path("partials.nav").exists());
}

#[test]
fn clear_cache_removes_everything() {
    let (_temp, mut engine) = setup();
    engine.try_render("page", Map::new()).unwrap();

    assert_eq!(engine.clear_cache().unwrap(), 2);
    assert!(engine.cache_entries().unwrap().is_empty());
    assert_eq!(engine.cache_size().unwrap(), 0);
    assert!(!engine.store().manifest_path().exists());
}

#[test]
fn store_lists_entries_with_sizes() {
    let temp = TempDir::new().unwrap();
    let store = ArtifactStore::new(temp.path().join("cache"));

    store.write("a", "{\"x\":1}", &[]).unwrap();
    store
        .write("b", "{}", &["a".to_string()])
        .unwrap();

    let entries = store.list().unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(entries[0].size, Some(7));
    assert_eq!(entries[1].entry.dependencies, vec!["a".to_string()]);
    assert_eq!(store.total_size().unwrap(), 9);
    assert_eq!(store.read("a").unwrap().as_deref(), Some("{\"x\":1}"));
    assert_eq!(store.read("missing").unwrap(), None);
}

#[test]
fn distinct_names_get_distinct_artifacts() {
    let store = ArtifactStore::new("/tmp/quire-cache");
    assert_ne!(store.artifact_path("a.b"), store.artifact_path("a/b"));
    assert_eq!(store.artifact_path("page"), store.artifact_path("page"));
}
