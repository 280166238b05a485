//! Staged copies of output sent to destinations that cannot be read back

use crate::checksum::Fingerprint;
use crate::error::{BundleCacheError, BundleCacheResult};
use crate::store::write_atomic;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// Directory of staged outputs, one file per destination descriptor
#[derive(Debug, Clone)]
pub struct StagedOutputs {
    dir: PathBuf,
}

impl StagedOutputs {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File holding the staged output for a destination descriptor
    pub fn path_for(&self, descriptor: &str) -> PathBuf {
        self.dir.join(Fingerprint::of_bytes(descriptor).as_str())
    }

    /// Staged bytes for a destination, `None` if nothing was staged
    pub async fn read(&self, descriptor: &str) -> BundleCacheResult<Option<Vec<u8>>> {
        let path = self.path_for(descriptor);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BundleCacheError::io(
                format!("reading staged output {}", path.display()),
                e,
            )),
        }
    }

    /// Stage bytes for a destination, replacing any earlier copy
    pub async fn write(&self, descriptor: &str, bytes: &[u8]) -> BundleCacheResult<PathBuf> {
        let path = self.path_for(descriptor);
        write_atomic(&path, bytes).await?;
        debug!(
            "Staged {} bytes for '{}' at {}",
            bytes.len(),
            descriptor,
            path.display()
        );
        Ok(path)
    }

    /// Remove every staged output
    pub async fn clear(&self) -> BundleCacheResult<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(BundleCacheError::io("reading staged output directory", e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BundleCacheError::io("reading staged output entry", e))?
        {
            if entry.path().is_file() {
                fs::remove_file(entry.path())
                    .await
                    .map_err(|e| BundleCacheError::io("removing staged output", e))?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let staged = StagedOutputs::new(dir.path().join(".bundle-cache"));

        let path = staged.write("> a.js > b.js", b"bundle").await.unwrap();

        assert!(path.starts_with(&staged.dir));
        assert_eq!(
            staged.read("> a.js > b.js").await.unwrap(),
            Some(b"bundle".to_vec())
        );
    }

    #[tokio::test]
    async fn named_by_descriptor_fingerprint() {
        let staged = StagedOutputs::new("/cache");
        let path = staged.path_for("gzip > out.js.gz");
        assert_eq!(
            path,
            PathBuf::from("/cache").join(Fingerprint::of_bytes("gzip > out.js.gz").as_str())
        );
        assert_ne!(path, staged.path_for("gzip > other.js.gz"));
    }

    #[tokio::test]
    async fn missing_is_none() {
        let dir = TempDir::new().unwrap();
        let staged = StagedOutputs::new(dir.path());
        assert!(staged.read("| cat").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_removes_files() {
        let dir = TempDir::new().unwrap();
        let staged = StagedOutputs::new(dir.path().join("s"));
        assert_eq!(staged.clear().await.unwrap(), 0);

        staged.write("| a", b"1").await.unwrap();
        staged.write("| b", b"2").await.unwrap();

        assert_eq!(staged.clear().await.unwrap(), 2);
        assert!(staged.read("| a").await.unwrap().is_none());
    }
}
