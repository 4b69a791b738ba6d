//! Deciding whether a compiled artifact can be reused.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::ArtifactStore;
use crate::error::{Result, ViewError};

/// Why an artifact has to be recompiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// Debug mode always recompiles.
    DebugMode,
    MissingArtifact,
    MissingManifestEntry,
    /// A recorded dependency no longer resolves to a source file.
    UnresolvedDependency(String),
    /// The source or one of its dependencies changed after compilation.
    SourceNewer(PathBuf),
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DebugMode => write!(f, "debug mode"),
            Self::MissingArtifact => write!(f, "no compiled artifact"),
            Self::MissingManifestEntry => write!(f, "not in manifest"),
            Self::UnresolvedDependency(name) => write!(f, "dependency '{}' not found", name),
            Self::SourceNewer(path) => write!(f, "{} changed", path.display()),
        }
    }
}

/// Result of a freshness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(StaleReason),
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }
}

/// Freshness checker over an [`ArtifactStore`].
pub struct FreshnessCheck<'a> {
    store: &'a ArtifactStore,
    debug: bool,
}

impl<'a> FreshnessCheck<'a> {
    pub fn new(store: &'a ArtifactStore, debug: bool) -> Self {
        Self { store, debug }
    }

    /// Check the artifact of `name`, whose source lives at `source`.
    ///
    /// `resolve` maps a dependency name to its source path, or `None` when it
    /// no longer exists.
    pub fn check<F>(&self, name: &str, source: &Path, resolve: F) -> Result<Freshness>
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        if self.debug {
            return Ok(Freshness::Stale(StaleReason::DebugMode));
        }

        let artifact = self.store.artifact_path(name);
        let compiled = match modified(&artifact) {
            Some(time) => time,
            None => return Ok(Freshness::Stale(StaleReason::MissingArtifact)),
        };

        let manifest = self.store.manifest()?;
        let entry = match manifest.get(name) {
            Some(entry) => entry,
            None => return Ok(Freshness::Stale(StaleReason::MissingManifestEntry)),
        };

        let mut sources = vec![source.to_path_buf()];
        for dependency in &entry.dependencies {
            match resolve(dependency) {
                Some(path) => sources.push(path),
                None => {
                    return Ok(Freshness::Stale(StaleReason::UnresolvedDependency(
                        dependency.clone(),
                    )))
                }
            }
        }

        for path in sources {
            let changed = fs::metadata(&path)
                .and_then(|m| m.modified())
                .map_err(ViewError::from)?;
            if changed > compiled {
                return Ok(Freshness::Stale(StaleReason::SourceNewer(path)));
            }
        }

        Ok(Freshness::Fresh)
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Parse an age like "7d", "24h", "30m" or a plain number of seconds.
pub fn parse_age(age: &str) -> anyhow::Result<Duration> {
    let age = age.trim().to_lowercase();

    let (digits, unit) = if let Some(days) = age.strip_suffix('d') {
        (days, 86_400)
    } else if let Some(hours) = age.strip_suffix('h') {
        (hours, 3_600)
    } else if let Some(mins) = age.strip_suffix('m') {
        (mins, 60)
    } else if let Some(secs) = age.strip_suffix('s') {
        (secs, 1)
    } else {
        (age.as_str(), 1)
    };

    let n: u64 = digits.trim().parse()?;
    let secs = n
        .checked_mul(unit)
        .ok_or_else(|| anyhow::anyhow!("age '{}' is too large", age))?;
    Ok(Duration::from_secs(secs))
}

/// Format a duration for display.
pub fn format_age(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs >= 86400 {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch_later(path: &Path) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
    }

    fn setup() -> (TempDir, ArtifactStore, PathBuf) {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("page.html");
        fs::write(&source, "hello").unwrap();
        let store = ArtifactStore::new(temp.path().join("cache"));
        (temp, store, source)
    }

    #[test]
    fn debug_mode_is_always_stale() {
        let (_temp, store, source) = setup();
        store.write("page", "{}", &[]).unwrap();
        let result = FreshnessCheck::new(&store, true)
            .check("page", &source, |_| None)
            .unwrap();
        assert_eq!(result, Freshness::Stale(StaleReason::DebugMode));
    }

    #[test]
    fn missing_artifact() {
        let (_temp, store, source) = setup();
        let result = FreshnessCheck::new(&store, false)
            .check("page", &source, |_| None)
            .unwrap();
        assert_eq!(result, Freshness::Stale(StaleReason::MissingArtifact));
    }

    #[test]
    fn missing_manifest_entry() {
        let (_temp, store, source) = setup();
        store.write("page", "{}", &[]).unwrap();
        fs::remove_file(store.manifest_path()).unwrap();
        let result = FreshnessCheck::new(&store, false)
            .check("page", &source, |_| None)
            .unwrap();
        assert_eq!(result, Freshness::Stale(StaleReason::MissingManifestEntry));
    }

    #[test]
    fn fresh_after_write() {
        let (_temp, store, source) = setup();
        store.write("page", "{}", &[]).unwrap();
        let result = FreshnessCheck::new(&store, false)
            .check("page", &source, |_| None)
            .unwrap();
        assert!(result.is_fresh());
    }

    #[test]
    fn unresolved_dependency_is_stale_not_error() {
        let (_temp, store, source) = setup();
        store.write("page", "{}", &["layouts.app".to_string()]).unwrap();
        let result = FreshnessCheck::new(&store, false)
            .check("page", &source, |_| None)
            .unwrap();
        assert_eq!(
            result,
            Freshness::Stale(StaleReason::UnresolvedDependency("layouts.app".into()))
        );
    }

    #[test]
    fn newer_dependency_is_stale() {
        let (temp, store, source) = setup();
        let layout = temp.path().join("layout.html");
        fs::write(&layout, "layout").unwrap();
        store.write("page", "{}", &["layout".to_string()]).unwrap();

        let check = FreshnessCheck::new(&store, false);
        let resolve = |_: &str| Some(layout.clone());
        assert!(check.check("page", &source, resolve).unwrap().is_fresh());

        touch_later(&layout);
        assert_eq!(
            check.check("page", &source, resolve).unwrap(),
            Freshness::Stale(StaleReason::SourceNewer(layout.clone()))
        );
    }

    #[test]
    fn newer_own_source_is_stale() {
        let (_temp, store, source) = setup();
        store.write("page", "{}", &[]).unwrap();
        touch_later(&source);
        let result = FreshnessCheck::new(&store, false)
            .check("page", &source, |_| None)
            .unwrap();
        assert!(matches!(result, Freshness::Stale(StaleReason::SourceNewer(_))));
    }

    #[test]
    fn parse_age_units() {
        assert_eq!(parse_age("7d").unwrap(), Duration::from_secs(7 * 86400));
        assert_eq!(parse_age("24h").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_age("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_age("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_age("90").unwrap(), Duration::from_secs(90));
        assert!(parse_age("soon").is_err());
    }

    #[test]
    fn parse_age_rejects_overflowing_values() {
        let err = parse_age("300000000000000d").unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert_eq!(
            parse_age("18446744073709551615s").unwrap(),
            Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn format_age_picks_largest_unit() {
        assert_eq!(format_age(Duration::from_secs(2 * 86400)), "2d");
        assert_eq!(format_age(Duration::from_secs(7200)), "2h");
        assert_eq!(format_age(Duration::from_secs(120)), "2m");
        assert_eq!(format_age(Duration::from_secs(5)), "5s");
    }

    #[test]
    fn reasons_display() {
        assert_eq!(StaleReason::DebugMode.to_string(), "debug mode");
        assert_eq!(
            StaleReason::UnresolvedDependency("x".into()).to_string(),
            "dependency 'x' not found"
        );
    }
}
