//! Dependency manifest: one JSON document mapping each compiled template
//! to its dependencies and compile time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

use crate::error::{Result, ViewError};

/// File name of the manifest inside the cache root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// What the manifest records about one compiled template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub dependencies: Vec<String>,
    /// Unix seconds.
    pub compiled_at: i64,
}

impl ManifestEntry {
    pub fn new(dependencies: Vec<String>) -> Self {
        Self {
            dependencies,
            compiled_at: Utc::now().timestamp(),
        }
    }

    pub fn compiled_at_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.compiled_at, 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Load the manifest at `path`. A missing file is an empty manifest; an
    /// unparsable one is [`ViewError::ManifestCorrupt`].
    pub fn load(path: &Path) -> Result<Self> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&json).map_err(|e| ViewError::ManifestCorrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load the manifest, treating a corrupt one as empty.
    pub fn load_or_recover(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(err @ ViewError::ManifestCorrupt { .. }) => {
                warn!("{}; starting from an empty manifest", err);
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ViewError::Other(e.into()))
    }

    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: ManifestEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn remove(&mut self, name: &str) -> Option<ManifestEntry> {
        self.entries.remove(name)
    }

    /// Drop entries compiled before `cutoff` (unix seconds). Returns how many
    /// were dropped.
    pub fn retain_newer_than(&mut self, cutoff: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.compiled_at >= cutoff);
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ManifestEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_manifest_is_empty() {
        let temp = TempDir::new().unwrap();
        let manifest = Manifest::load(&temp.path().join(MANIFEST_FILE)).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn json_shape_is_a_map_of_entries() {
        let mut manifest = Manifest::default();
        manifest.insert(
            "pages.home",
            ManifestEntry {
                dependencies: vec!["layouts.app".into()],
                compiled_at: 1_700_000_000,
            },
        );
        let value: serde_json::Value = serde_json::from_str(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "pages.home": {"dependencies": ["layouts.app"], "compiled_at": 1_700_000_000}
            })
        );
    }

    #[test]
    fn corrupt_manifest_is_reported_or_recovered() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(MANIFEST_FILE);
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            Manifest::load(&path),
            Err(ViewError::ManifestCorrupt { .. })
        ));
        assert!(Manifest::load_or_recover(&path).unwrap().is_empty());
    }

    #[test]
    fn retains_recent_entries() {
        let mut manifest = Manifest::default();
        manifest.insert("old", ManifestEntry { dependencies: vec![], compiled_at: 10 });
        manifest.insert("new", ManifestEntry { dependencies: vec![], compiled_at: 100 });
        assert_eq!(manifest.retain_newer_than(50), 1);
        assert!(manifest.get("new").is_some());
        assert!(manifest.get("old").is_none());
    }

    #[test]
    fn new_entry_is_stamped_now() {
        let entry = ManifestEntry::new(vec![]);
        let age = Utc::now().timestamp() - entry.compiled_at;
        assert!((0..5).contains(&age));
        assert!(entry.compiled_at_time().is_some());
    }
}
