//! Configuration management for bundlecache

pub mod schema;

pub use schema::Config;

use crate::checksum::FingerprintPolicy;
use crate::error::{BundleCacheError, BundleCacheResult};
use crate::tracker::PersistPolicy;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Name of the project config file
pub const CONFIG_FILE_NAME: &str = "bundlecache.toml";

/// Settings injected into the cache layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Cache store file
    pub store_path: PathBuf,

    /// Staged output directory
    pub staged_dir: PathBuf,

    /// How source files are fingerprinted
    pub policy: FingerprintPolicy,

    /// When discovered dependencies are written
    pub persist: PersistPolicy,
}

impl CacheOptions {
    /// Defaults rooted at `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::from_config(&Config::default(), dir)
    }

    /// Resolve configured paths against `base`
    pub fn from_config(config: &Config, base: &Path) -> Self {
        Self {
            store_path: base.join(&config.cache.store),
            staged_dir: base.join(&config.cache.staged_dir),
            policy: config.cache.policy,
            persist: config.cache.persist,
        }
    }
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Config manager for the project config in `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config_path: dir.join(CONFIG_FILE_NAME),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Load configuration, falling back to defaults if not exists
    pub async fn load(&self) -> BundleCacheResult<Config> {
        let content = match fs::read_to_string(&self.config_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Config file not found, using defaults");
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(BundleCacheError::io(
                    format!("reading config from {}", self.config_path.display()),
                    e,
                ))
            }
        };

        toml::from_str(&content).map_err(|e| BundleCacheError::ConfigInvalid {
            path: self.config_path.clone(),
            reason: e.to_string(),
        })
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::in_dir(temp.path());

        let config = manager.load().await.unwrap();
        assert!(config.cache.enabled);
        assert_eq!(manager.path(), temp.path().join("bundlecache.toml"));
    }

    #[tokio::test]
    async fn load_from_custom_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("b.toml");
        let toml = "[cache]\npolicy = \"content\"\npersist = \"each-batch\"\n";
        std::fs::write(&path, toml).unwrap();

        let loaded = ConfigManager::with_path(path).load().await.unwrap();

        assert_eq!(loaded.cache.policy, FingerprintPolicy::Content);
        assert_eq!(loaded.cache.persist, PersistPolicy::EachBatch);
        assert!(loaded.cache.enabled);
    }

    #[tokio::test]
    async fn invalid_config_reports_path() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::in_dir(temp.path());
        std::fs::write(manager.path(), "[cache]\npolicy = 3\n").unwrap();

        let err = manager.load().await.unwrap_err();
        assert!(matches!(err, BundleCacheError::ConfigInvalid { .. }));
    }

    #[test]
    fn options_resolve_against_base() {
        let options = CacheOptions::in_dir(Path::new("/work"));
        assert_eq!(options.store_path, PathBuf::from("/work/bundle-cache.json"));
        assert_eq!(options.staged_dir, PathBuf::from("/work/.bundle-cache"));
        assert_eq!(options.persist, PersistPolicy::OnCompletion);
    }
}
