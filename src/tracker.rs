//! Dependency tracking during a real bundle run
//!
//! Builds the file set for one run from scratch: entry files first, then
//! every trackable file the engine reports as it walks the graph. The run is
//! flagged pending in the store until [`DependencyTracker::finish`] commits
//! the complete set.

use crate::checksum::{Fingerprint, FingerprintPolicy};
use crate::engine::{absolute, is_trackable, resolve_dependency, DependencyRow};
use crate::error::BundleCacheResult;
use crate::store::{short, CacheStore, FileFingerprintSet};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// When discovered fingerprints are written to the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PersistPolicy {
    /// After every discovery batch that added files
    EachBatch,
    /// Once, when the engine has produced its output
    #[default]
    OnCompletion,
}

/// Records the files one run depends on
#[derive(Debug)]
pub struct DependencyTracker {
    store: CacheStore,
    run: Fingerprint,
    policy: FingerprintPolicy,
    persist: PersistPolicy,
    files: FileFingerprintSet,
}

impl DependencyTracker {
    /// Start a fresh file set for `run`, seeded with the entry files
    pub async fn start(
        store: CacheStore,
        run: Fingerprint,
        policy: FingerprintPolicy,
        persist: PersistPolicy,
        entries: &[PathBuf],
    ) -> BundleCacheResult<Self> {
        let mut tracker = Self {
            store,
            run,
            policy,
            persist,
            files: FileFingerprintSet::new(),
        };

        for entry in entries {
            let path = absolute(entry)?;
            tracker.insert(path).await?;
        }

        match tracker.persist {
            PersistPolicy::EachBatch => {
                tracker
                    .store
                    .record_run(&tracker.run, tracker.files.clone(), None)
                    .await?
            }
            PersistPolicy::OnCompletion => tracker.store.mark_pending(&tracker.run).await?,
        }

        Ok(tracker)
    }

    /// Handle one discovery notification; returns how many files were added
    pub async fn record(&mut self, row: &DependencyRow) -> BundleCacheResult<usize> {
        let mut added = 0;
        for name in row.deps.iter().filter(|n| is_trackable(n)) {
            let path = resolve_dependency(&row.file, name)?;
            if self.files.contains_key(&path) {
                continue;
            }
            if self.insert(path).await? {
                added += 1;
            }
        }

        if added > 0 && self.persist == PersistPolicy::EachBatch {
            self.store
                .record_run(&self.run, self.files.clone(), None)
                .await?;
        }

        Ok(added)
    }

    /// Commit the complete file set together with the digest of the output
    pub async fn finish(self, output: Fingerprint) -> BundleCacheResult<FileFingerprintSet> {
        self.store
            .record_run(&self.run, self.files.clone(), Some(output))
            .await?;
        debug!(
            "Run {} depends on {} files",
            short(&self.run),
            self.files.len()
        );
        Ok(self.files)
    }

    async fn insert(&mut self, path: PathBuf) -> BundleCacheResult<bool> {
        match Fingerprint::of_existing_file(&path, self.policy).await? {
            Some(fp) => {
                self.files.insert(path, fp);
                Ok(true)
            }
            None => {
                debug!("Skipping missing dependency {}", path.display());
                Ok(false)
            }
        }
    }
}
