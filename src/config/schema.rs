//! Configuration schema for bundlecache
//!
//! Configuration is read from `bundlecache.toml` in the working directory.

use crate::checksum::FingerprintPolicy;
use crate::tracker::PersistPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// Bundle defaults
    pub bundle: BundleConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use the cache at all (default: true)
    pub enabled: bool,

    /// Cache store file, relative to the working directory
    pub store: PathBuf,

    /// Staged output directory, relative to the working directory
    pub staged_dir: PathBuf,

    /// How source files are fingerprinted
    pub policy: FingerprintPolicy,

    /// When discovered dependencies are written
    pub persist: PersistPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store: PathBuf::from("bundle-cache.json"),
            staged_dir: PathBuf::from(".bundle-cache"),
            policy: FingerprintPolicy::default(),
            persist: PersistPolicy::default(),
        }
    }
}

/// Defaults applied to every bundle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Options merged under command-line `--opt` values
    pub options: BTreeMap<String, String>,
}
