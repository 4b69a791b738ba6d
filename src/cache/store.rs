//! Artifact storage implementation.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use tracing::debug;

use super::lock::{is_lock_file, CacheLock};
use super::manifest::{Manifest, ManifestEntry, MANIFEST_FILE};
use crate::error::{Result, ViewError};

/// Extension of compiled artifact files.
pub const ARTIFACT_EXTENSION: &str = "artifact";

/// One row of [`ArtifactStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub name: String,
    pub path: PathBuf,
    pub size: Option<u64>,
    pub entry: ManifestEntry,
}

/// Storage for compiled artifacts and the dependency manifest.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    /// Root directory for cache.
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a new artifact store.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| ViewError::CacheWriteFailure {
            path: self.root.clone(),
            message: format!("Failed to create cache directory: {}", e),
        })
    }

    /// Path of the artifact for a logical name.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        let hash = Sha256::digest(name.as_bytes());
        let hash_str = hex::encode(&hash[..16]);
        self.root
            .join(hash_str)
            .with_extension(ARTIFACT_EXTENSION)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Load the manifest; a corrupt manifest is logged and read as empty.
    pub fn manifest(&self) -> Result<Manifest> {
        Manifest::load_or_recover(&self.manifest_path())
    }

    /// Persist an artifact and record its dependencies in the manifest.
    pub fn write(&self, name: &str, artifact: &str, dependencies: &[String]) -> Result<PathBuf> {
        self.ensure_dir()?;
        let _lock = CacheLock::acquire(&self.root)?;

        let path = self.artifact_path(name);
        self.replace(&path, artifact)?;

        let mut manifest = self.manifest()?;
        manifest.insert(name, ManifestEntry::new(dependencies.to_vec()));
        self.save_manifest(&manifest)?;

        debug!(template = %name, path = %path.display(), "Wrote compiled artifact");
        Ok(path)
    }

    /// Read the artifact for `name`, if one exists.
    pub fn read(&self, name: &str) -> Result<Option<String>> {
        let path = self.artifact_path(name);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove one template's artifact and manifest entry.
    pub fn forget(&self, name: &str) -> Result<bool> {
        if !self.root.exists() {
            return Ok(false);
        }
        let _lock = CacheLock::acquire(&self.root)?;

        let mut removed = false;
        let path = self.artifact_path(name);
        if path.exists() {
            fs::remove_file(&path)?;
            removed = true;
        }

        let mut manifest = self.manifest()?;
        if manifest.remove(name).is_some() {
            self.save_manifest(&manifest)?;
            removed = true;
        }

        Ok(removed)
    }

    /// Remove every artifact and the manifest. Returns the number of
    /// artifacts removed.
    pub fn clear_all(&self) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }
        let _lock = CacheLock::acquire(&self.root)?;

        let artifacts = self.artifact_files()?;
        for path in &artifacts {
            fs::remove_file(path)?;
        }
        let manifest = self.manifest_path();
        if manifest.exists() {
            fs::remove_file(&manifest)?;
        }

        debug!(count = artifacts.len(), "Cleared artifact cache");
        Ok(artifacts.len())
    }

    /// Remove artifacts last written more than `max_age` ago, along with
    /// manifest entries compiled before the same cutoff.
    pub fn purge_older_than(&self, max_age: Duration) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }
        let _lock = CacheLock::acquire(&self.root)?;

        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut purged = 0;
        for path in self.artifact_files()? {
            let modified = fs::metadata(&path)?.modified()?;
            if modified < cutoff {
                fs::remove_file(&path)?;
                purged += 1;
            }
        }

        let max_age_secs = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        let cutoff_secs = chrono::Utc::now().timestamp().saturating_sub(max_age_secs);
        let mut manifest = self.manifest()?;
        if manifest.retain_newer_than(cutoff_secs) > 0 {
            self.save_manifest(&manifest)?;
        }

        debug!(purged, "Purged old artifacts");
        Ok(purged)
    }

    /// Total size in bytes of all artifacts.
    pub fn total_size(&self) -> Result<u64> {
        if !self.root.exists() {
            return Ok(0);
        }
        let mut total = 0;
        for path in self.artifact_files()? {
            total += fs::metadata(&path)?.len();
        }
        Ok(total)
    }

    /// Manifest entries with their artifact paths and sizes.
    pub fn list(&self) -> Result<Vec<ArtifactInfo>> {
        let manifest = self.manifest()?;
        Ok(manifest
            .iter()
            .map(|(name, entry)| {
                let path = self.artifact_path(name);
                let size = fs::metadata(&path).ok().map(|m| m.len());
                ArtifactInfo {
                    name: name.clone(),
                    path,
                    size,
                    entry: entry.clone(),
                }
            })
            .collect())
    }

    fn artifact_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let is_artifact = path
                .extension()
                .is_some_and(|ext| ext == ARTIFACT_EXTENSION);
            let is_lock = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_lock_file);
            if path.is_file() && is_artifact && !is_lock {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        let path = self.manifest_path();
        self.replace(&path, &manifest.to_json()?)
    }

    /// Write `content` to a temporary file next to `path` and rename it over
    /// `path`.
    fn replace(&self, path: &Path, content: &str) -> Result<()> {
        let failure = |message: String| ViewError::CacheWriteFailure {
            path: path.to_path_buf(),
            message,
        };
        let mut tmp = NamedTempFile::new_in(&self.root).map_err(|e| failure(e.to_string()))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| failure(e.to_string()))?;
        tmp.persist(path).map_err(|e| failure(e.error.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ArtifactStore) {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().join("cache"));
        (temp, store)
    }

    #[test]
    fn artifact_path_is_deterministic() {
        let (_temp, store) = setup();
        let a = store.artifact_path("layouts.app");
        assert_eq!(a, store.artifact_path("layouts.app"));
        assert_ne!(a, store.artifact_path("layouts.admin"));
        assert_eq!(a.extension().unwrap(), ARTIFACT_EXTENSION);
        assert_eq!(a.file_stem().unwrap().len(), 32);
    }

    #[test]
    fn write_then_read() {
        let (_temp, store) = setup();
        store
            .write("pages.home", "{\"nodes\":[]}", &["layouts.app".to_string()])
            .unwrap();

        assert_eq!(store.read("pages.home").unwrap().unwrap(), "{\"nodes\":[]}");
        let manifest = store.manifest().unwrap();
        let entry = manifest.get("pages.home").unwrap();
        assert_eq!(entry.dependencies, vec!["layouts.app"]);
    }

    #[test]
    fn read_missing_is_none() {
        let (_temp, store) = setup();
        assert!(store.read("nope").unwrap().is_none());
    }

    #[test]
    fn rewrite_replaces_artifact_and_entry() {
        let (_temp, store) = setup();
        store.write("page", "one", &["a".to_string()]).unwrap();
        store.write("page", "two", &[]).unwrap();

        assert_eq!(store.read("page").unwrap().unwrap(), "two");
        assert!(store.manifest().unwrap().get("page").unwrap().dependencies.is_empty());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn forget_removes_one() {
        let (_temp, store) = setup();
        store.write("a", "1", &[]).unwrap();
        store.write("b", "2", &[]).unwrap();

        assert!(store.forget("a").unwrap());
        assert!(!store.forget("a").unwrap());
        assert!(store.read("a").unwrap().is_none());
        assert!(store.read("b").unwrap().is_some());
    }

    #[test]
    fn clear_all_removes_artifacts_and_manifest() {
        let (_temp, store) = setup();
        store.write("a", "1", &[]).unwrap();
        store.write("b", "2", &[]).unwrap();

        assert_eq!(store.clear_all().unwrap(), 2);
        assert!(!store.manifest_path().exists());
        assert_eq!(store.total_size().unwrap(), 0);
    }

    #[test]
    fn clear_on_missing_root_is_noop() {
        let (_temp, store) = setup();
        assert_eq!(store.clear_all().unwrap(), 0);
        assert_eq!(store.purge_older_than(Duration::from_secs(1)).unwrap(), 0);
    }

    #[test]
    fn total_size_counts_artifacts_only() {
        let (_temp, store) = setup();
        store.write("a", "12345", &[]).unwrap();
        store.write("b", "123", &[]).unwrap();
        assert_eq!(store.total_size().unwrap(), 8);
    }

    #[test]
    fn purge_keeps_recent_artifacts() {
        let (_temp, store) = setup();
        store.write("a", "1", &[]).unwrap();
        assert_eq!(store.purge_older_than(Duration::from_secs(3600)).unwrap(), 0);
        assert!(store.read("a").unwrap().is_some());
    }

    #[test]
    fn purge_with_huge_age_keeps_everything() {
        let (_temp, store) = setup();
        store.write("a", "1", &[]).unwrap();
        assert_eq!(store.purge_older_than(Duration::from_secs(u64::MAX)).unwrap(), 0);
        assert!(store.manifest().unwrap().get("a").is_some());
    }

    #[test]
    fn purge_with_zero_age_removes_everything() {
        let (_temp, store) = setup();
        store.write("a", "1", &[]).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.purge_older_than(Duration::ZERO).unwrap(), 1);
        assert!(store.read("a").unwrap().is_none());
    }

    #[test]
    fn corrupt_manifest_is_recovered_on_write() {
        let (_temp, store) = setup();
        fs::create_dir_all(store.root()).unwrap();
        fs::write(store.manifest_path(), "not json").unwrap();

        store.write("a", "1", &[]).unwrap();
        assert!(store.manifest().unwrap().get("a").is_some());
    }

    #[test]
    fn list_reports_sizes() {
        let (_temp, store) = setup();
        store.write("a", "abc", &["b".to_string()]).unwrap();
        let rows = store.list().unwrap();
        assert_eq!(rows[0].name, "a");
        assert_eq!(rows[0].size, Some(3));
        assert_eq!(rows[0].entry.dependencies, vec!["b"]);
    }
}
