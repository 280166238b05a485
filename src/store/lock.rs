//! Cross-process lock around store read-modify-write cycles

use crate::error::{BundleCacheError, BundleCacheResult};
use fs2::FileExt as _;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Exclusive advisory lock on `<store>.lock`
///
/// Released when dropped. The file lock coordinates processes. Depending on
/// the platform it may not exclude other tasks of the same process, so an
/// in-process mutex per lock path is held alongside it.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl StoreLock {
    /// Lock file path guarding the given store file
    pub fn path_for(store_path: &Path) -> PathBuf {
        let mut name = store_path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Block (off the async scheduler) until the lock is held
    pub async fn acquire(store_path: &Path) -> BundleCacheResult<Self> {
        let path = Self::path_for(store_path);
        let guard = process_lock_for(&path).lock_owned().await;
        let lock_path = path.clone();

        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            if let Some(parent) = lock_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| BundleCacheError::StoreLock {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?
        .map_err(|e| BundleCacheError::StoreLock {
            path: path.clone(),
            source: e,
        })?;

        debug!("Acquired store lock {}", path.display());
        Ok(Self {
            file,
            path,
            _guard: guard,
        })
    }
}

fn process_lock_for(path: &Path) -> Arc<AsyncMutex<()>> {
    static PROCESS_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>> = OnceLock::new();
    let locks = PROCESS_LOCKS.get_or_init(|| Mutex::new(HashMap::new()));

    let mut map = locks
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    map.entry(path.to_path_buf()).or_default().clone()
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!("Released store lock {}", self.path.display());
    }
}
