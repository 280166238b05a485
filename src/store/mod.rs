//! Persistent cache store
//!
//! Maps a run fingerprint (the hash of one invocation's configuration) to
//! the fingerprints of every file that run depended on.
//!
//! # On-disk shape
//!
//! ```json
//! { "created": "...", "changed": "...",
//!   "items": { "<run>": { "/abs/a.js": "<fingerprint>" } },
//!   "outputs": { "<run>": "<fingerprint of the bundle bytes>" },
//!   "pending": ["<run>"] }
//! ```
//!
//! `pending` is omitted when empty. A run listed there has a file set that
//! is still being rebuilt (or whose rebuild was interrupted) and must not be
//! trusted for a cache hit. `outputs` holds the digest of what each complete
//! run produced, so a destination shared by two runs is never replayed for
//! the wrong one.
//!
//! # Concurrency
//!
//! [`CacheStore::save`] is a full overwrite. Everything else that mutates
//! the store goes through [`CacheStore::update`], which re-reads the file
//! under a [`StoreLock`] and only then applies the change, so concurrent
//! runs for different partitions never drop each other's entries.

pub mod lock;
pub mod staged;

pub use lock::StoreLock;
pub use staged::StagedOutputs;

use crate::checksum::Fingerprint;
use crate::error::{BundleCacheError, BundleCacheResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Recorded file fingerprints for one run, keyed by absolute path
pub type FileFingerprintSet = BTreeMap<PathBuf, Fingerprint>;

/// Full contents of the store file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    /// When the store was first created
    pub created: DateTime<Utc>,

    /// When the store was last written
    pub changed: DateTime<Utc>,

    /// File sets per run fingerprint
    #[serde(default)]
    pub items: BTreeMap<Fingerprint, FileFingerprintSet>,

    /// Digest of the output each complete run produced
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<Fingerprint, Fingerprint>,

    /// Runs whose file set is incomplete
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub pending: BTreeSet<Fingerprint>,
}

impl StoreData {
    /// An empty store stamped with the current time
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            created: now,
            changed: now,
            items: BTreeMap::new(),
            outputs: BTreeMap::new(),
            pending: BTreeSet::new(),
        }
    }

    /// The trusted file set for a run, if one exists
    pub fn complete_run(&self, run: &Fingerprint) -> Option<&FileFingerprintSet> {
        if self.pending.contains(run) {
            return None;
        }
        self.items.get(run)
    }
}

/// Handle to the JSON cache store file
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    /// Open the store at `path`, creating an empty one if absent
    ///
    /// Any error other than "not found" is fatal.
    pub async fn open(path: impl Into<PathBuf>) -> BundleCacheResult<Self> {
        let store = Self { path: path.into() };

        match fs::metadata(&store.path).await {
            Ok(_) => {
                debug!("Using cache store {}", store.path.display());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let _lock = StoreLock::acquire(&store.path).await?;
                // Another process may have created it while we waited.
                if store.read().await?.is_none() {
                    store.save(&StoreData::empty()).await?;
                    info!("Created cache store {}", store.path.display());
                }
            }
            Err(e) => {
                return Err(BundleCacheError::io(
                    format!("checking cache store {}", store.path.display()),
                    e,
                ))
            }
        }

        Ok(store)
    }

    /// Read the whole store
    pub async fn load(&self) -> BundleCacheResult<StoreData> {
        self.read().await?.ok_or_else(|| {
            BundleCacheError::io(
                format!("reading cache store {}", self.path.display()),
                std::io::Error::from(ErrorKind::NotFound),
            )
        })
    }

    /// Overwrite the whole store
    pub async fn save(&self, data: &StoreData) -> BundleCacheResult<()> {
        let content = serde_json::to_vec_pretty(data)?;
        write_atomic(&self.path, &content).await
    }

    /// Locked read-modify-write of the store
    ///
    /// The closure sees the latest on-disk state. `changed` is stamped after
    /// it runs. Returns the data as written.
    pub async fn update<F>(&self, apply: F) -> BundleCacheResult<StoreData>
    where
        F: FnOnce(&mut StoreData),
    {
        let _lock = StoreLock::acquire(&self.path).await?;

        let mut data = self.read().await?.unwrap_or_else(StoreData::empty);
        apply(&mut data);
        data.changed = Utc::now();
        self.save(&data).await?;

        Ok(data)
    }

    /// Replace one run's file set
    ///
    /// With `output`, the run is committed along with the digest of the bytes
    /// it produced. Without it the run stays flagged as pending, so an
    /// interrupted rebuild is never mistaken for a trustworthy record.
    pub async fn record_run(
        &self,
        run: &Fingerprint,
        files: FileFingerprintSet,
        output: Option<Fingerprint>,
    ) -> BundleCacheResult<()> {
        let count = files.len();
        let complete = output.is_some();
        self.update(|data| {
            data.items.insert(run.clone(), files);
            match output {
                Some(output) => {
                    data.outputs.insert(run.clone(), output);
                    data.pending.remove(run);
                }
                None => {
                    data.outputs.remove(run);
                    data.pending.insert(run.clone());
                }
            }
        })
        .await?;

        debug!(
            "Recorded {} files for run {} ({})",
            count,
            short(run),
            if complete { "complete" } else { "pending" }
        );
        Ok(())
    }

    /// Flag a run as being rebuilt
    pub async fn mark_pending(&self, run: &Fingerprint) -> BundleCacheResult<()> {
        self.update(|data| {
            data.pending.insert(run.clone());
        })
        .await?;
        Ok(())
    }

    /// Drop one run's partition
    pub async fn remove_run(&self, run: &Fingerprint) -> BundleCacheResult<bool> {
        let mut removed = false;
        self.update(|data| {
            removed = data.items.remove(run).is_some();
            data.outputs.remove(run);
            data.pending.remove(run);
        })
        .await?;
        Ok(removed)
    }

    /// Reset to an empty store
    pub async fn clear(&self) -> BundleCacheResult<()> {
        let _lock = StoreLock::acquire(&self.path).await?;
        self.save(&StoreData::empty()).await?;
        info!("Cleared cache store {}", self.path.display());
        Ok(())
    }

    async fn read(&self) -> BundleCacheResult<Option<StoreData>> {
        match fs::read(&self.path).await {
            Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BundleCacheError::io(
                format!("reading cache store {}", self.path.display()),
                e,
            )),
        }
    }
}

/// Write via a sibling temp file and rename, so readers never see a torn file
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> BundleCacheResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| BundleCacheError::io(format!("creating {}", parent.display()), e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".tmp-{}", std::process::id()));
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, content)
        .await
        .map_err(|e| BundleCacheError::io(format!("writing {}", tmp.display()), e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| BundleCacheError::io(format!("replacing {}", path.display()), e))?;
    Ok(())
}

/// First 12 hex chars, for log lines
pub(crate) fn short(fp: &Fingerprint) -> &str {
    let s = fp.as_str();
    &s[..s.len().min(12)]
}
