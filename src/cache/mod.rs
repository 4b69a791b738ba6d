//! Compiled artifact cache.
//!
//! One artifact per logical template name plus a JSON manifest recording
//! each template's dependencies, with mtime-based invalidation.

pub mod freshness;
pub mod lock;
pub mod manifest;
pub mod store;

pub use freshness::{format_age, parse_age, Freshness, FreshnessCheck, StaleReason};
pub use manifest::{Manifest, ManifestEntry, MANIFEST_FILE};
pub use store::{ArtifactInfo, ArtifactStore, ARTIFACT_EXTENSION};

/// Get the default cache directory for a views directory.
pub fn default_cache_dir(views: &std::path::Path) -> std::path::PathBuf {
    views.join("cache")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cache_dir_is_under_views() {
        let path = default_cache_dir(std::path::Path::new("/srv/views"));
        assert_eq!(path, std::path::PathBuf::from("/srv/views/cache"));
    }
}
