//! Content addressing for run configurations and source files
//!
//! Structured values are serialized to canonical JSON (object keys sorted)
//! before hashing, so the same value always produces the same fingerprint
//! regardless of the order its fields were assembled in.
//!
//! Files are fingerprinted under a [`FingerprintPolicy`]:
//!
//! | Policy | Hashed payload | Touch without edit | Same size+mtime edit |
//! |--------|----------------|--------------------|----------------------|
//! | Metadata | size, mtime | changed | unchanged |
//! | Content | file bytes | unchanged | changed |

use crate::error::{BundleCacheError, BundleCacheResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tokio::fs;

/// How source files are fingerprinted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FingerprintPolicy {
    /// Hash size and modification time only
    #[default]
    Metadata,
    /// Hash the full file contents
    Content,
}

/// SHA-256 fingerprint as a lowercase hex string
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint raw bytes
    pub fn of_bytes(bytes: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes.as_ref());
        Self(hex::encode(hasher.finalize()))
    }

    /// Fingerprint a structured value through its canonical JSON form
    pub fn of_value<T: Serialize + ?Sized>(value: &T) -> BundleCacheResult<Self> {
        // `serde_json::Value` objects are BTreeMap-backed, so keys come out sorted.
        let canonical = serde_json::to_value(value)?;
        let bytes = serde_json::to_vec(&canonical)?;
        Ok(Self::of_bytes(bytes))
    }

    /// Fingerprint a file under the given policy
    pub async fn of_file(path: &Path, policy: FingerprintPolicy) -> BundleCacheResult<Self> {
        match policy {
            FingerprintPolicy::Metadata => {
                let meta = fs::metadata(path).await.map_err(|e| {
                    BundleCacheError::io(format!("reading metadata of {}", path.display()), e)
                })?;
                Self::of_value(&FileState::from_metadata(&meta))
            }
            FingerprintPolicy::Content => {
                let bytes = fs::read(path)
                    .await
                    .map_err(|e| BundleCacheError::io(format!("reading {}", path.display()), e))?;
                Ok(Self::of_bytes(bytes))
            }
        }
    }

    /// Like [`Fingerprint::of_file`], but a missing file yields `None`
    pub async fn of_existing_file(
        path: &Path,
        policy: FingerprintPolicy,
    ) -> BundleCacheResult<Option<Self>> {
        match Self::of_file(path, policy).await {
            Ok(fp) => Ok(Some(fp)),
            Err(BundleCacheError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The metadata record hashed under [`FingerprintPolicy::Metadata`]
#[derive(Debug, Serialize)]
struct FileState {
    size: u64,
    mtime_nanos: u128,
}

impl FileState {
    fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let mtime_nanos = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Self {
            size: meta.len(),
            mtime_nanos,
        }
    }
}
