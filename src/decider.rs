//! Hit/miss decision for one invocation
//!
//! A run is identified by the fingerprint of its whole configuration, so a
//! change to any option (or to the file fingerprint policy) starts a new
//! cache partition. Within a partition,
//! only the files recorded by the last complete run are re-checked. A file
//! that the sources start referencing without any recorded file changing is
//! not detected; misses always rebuild the set by walking the full graph.

use crate::checksum::{Fingerprint, FingerprintPolicy};
use crate::engine::{absolute, Bundler};
use crate::error::BundleCacheResult;
use crate::store::StoreData;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Why a cached result cannot be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    /// No record for this configuration
    NotCached,
    /// The last rebuild for this configuration never completed
    Incomplete,
    /// An entry file is not part of the recorded set
    EntryNotRecorded(PathBuf),
    /// A recorded file changed or disappeared
    Changed(PathBuf),
    /// The recorded output can no longer be read back
    OutputMissing,
    /// The destination holds bytes this run did not produce
    OutputChanged,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotCached => write!(f, "no cache entry"),
            Self::Incomplete => write!(f, "previous run incomplete"),
            Self::EntryNotRecorded(p) => write!(f, "entry {} not recorded", p.display()),
            Self::Changed(p) => write!(f, "{} changed", p.display()),
            Self::OutputMissing => write!(f, "cached output missing"),
            Self::OutputChanged => write!(f, "cached output overwritten"),
        }
    }
}

/// Result of comparing recorded state with the file system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(MissReason),
}

/// Merged configuration hashed into the run fingerprint
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub entries: Vec<PathBuf>,
    pub options: serde_json::Value,
    pub destination: Option<String>,
    pub policy: FingerprintPolicy,
}

impl RunConfig {
    /// Capture an engine's configuration
    ///
    /// Recorded file fingerprints are only comparable under the policy that
    /// produced them, so the policy is part of the run identity.
    pub fn of(engine: &dyn Bundler, policy: FingerprintPolicy) -> Self {
        Self {
            entries: engine.entries(),
            options: engine.options(),
            destination: engine.destination(),
            policy,
        }
    }

    /// The run fingerprint
    pub fn fingerprint(&self) -> BundleCacheResult<Fingerprint> {
        Fingerprint::of_value(self)
    }
}

/// Compares recorded file fingerprints against current file state
#[derive(Debug, Clone, Copy)]
pub struct InvalidationDecider {
    policy: FingerprintPolicy,
}

impl InvalidationDecider {
    pub fn new(policy: FingerprintPolicy) -> Self {
        Self { policy }
    }

    /// Decide whether `run` can be served from the cache
    pub async fn check(
        &self,
        data: &StoreData,
        run: &Fingerprint,
        entries: &[PathBuf],
    ) -> BundleCacheResult<Freshness> {
        let Some(recorded) = data.items.get(run) else {
            return Ok(Freshness::Stale(MissReason::NotCached));
        };
        if data.complete_run(run).is_none() {
            return Ok(Freshness::Stale(MissReason::Incomplete));
        }

        for entry in entries {
            let entry = absolute(entry)?;
            if !recorded.contains_key(&entry) {
                return Ok(Freshness::Stale(MissReason::EntryNotRecorded(entry)));
            }
        }

        for (path, expected) in recorded {
            let current = Fingerprint::of_existing_file(path, self.policy).await?;
            if current.as_ref() != Some(expected) {
                debug!("Changed since last run: {}", path.display());
                return Ok(Freshness::Stale(MissReason::Changed(path.clone())));
            }
        }

        Ok(Freshness::Fresh)
    }
}
