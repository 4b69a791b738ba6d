//! Configuration loading, parsing, and validation for quire.
//!
//! - Schema definitions in [`schema`]
//! - File discovery, loading and environment overrides in [`loader`]
//! - Deep merging in [`merger`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use quire::config::{load_merged_config, validate};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! fs::create_dir_all(temp.path().join(".quire")).unwrap();
//! fs::create_dir_all(temp.path().join("templates")).unwrap();
//! fs::write(temp.path().join(".quire/config.yml"), "views: templates").unwrap();
//!
//! let config = load_merged_config(temp.path()).unwrap();
//! validate(&config, temp.path()).unwrap();
//! assert_eq!(config.views, std::path::PathBuf::from("templates"));
//! ```
//!
//! # Configuration File Locations
//!
//! 1. Project config (`.quire/config.yml`)
//! 2. Local overrides (`.quire/config.local.yml`)
//!
//! `QUIRE_DEBUG` overrides the `debug` setting after merging.

pub mod loader;
pub mod merger;
pub mod schema;
pub mod validator;

pub use loader::{
    apply_env_overrides, find_project_root, load_config, load_config_file, load_config_value,
    load_merged_config, ConfigPaths, CONFIG_DIR, DEBUG_ENV,
};
pub use merger::{deep_merge, merge_configs};
pub use schema::QuireConfig;
pub use validator::{validate, validate_config, ValidationError};
