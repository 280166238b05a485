//! Cache-aware wrapper around a bundling engine
//!
//! [`wrap`] decides hit or miss before anything is bundled. The returned
//! [`Incremental`] is itself a [`Bundler`]: on a hit its `bundle` replays the
//! last output without running the engine, on a miss it runs the engine with
//! dependency tracking attached and captures the output for later replay.

use crate::checksum::Fingerprint;
use crate::config::CacheOptions;
use crate::decider::{Freshness, InvalidationDecider, MissReason, RunConfig};
use crate::engine::{BundleEvents, Bundler, DependencyRow};
use crate::error::{BundleCacheError, BundleCacheResult};
use crate::relay::OutputRelay;
use crate::store::{short, CacheStore, StagedOutputs};
use crate::tracker::DependencyTracker;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Outcome of the cache decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Output is replayed, the engine does not run
    Hit,
    /// The engine runs
    Miss(MissReason),
}

impl Outcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit)
    }
}

enum Plan {
    Replay(Vec<u8>),
    Rebuild(MissReason),
}

/// A bundling engine decorated with the cache
pub struct Incremental<E> {
    engine: E,
    options: CacheOptions,
    store: CacheStore,
    run: Fingerprint,
    relay: OutputRelay,
    plan: Plan,
}

/// Wrap `engine` with the cache described by `options`
///
/// Fails with [`BundleCacheError::NoDestination`] before touching the store
/// if the engine has no output destination.
pub async fn wrap<E: Bundler>(
    engine: E,
    options: CacheOptions,
) -> BundleCacheResult<Incremental<E>> {
    let destination = engine
        .destination()
        .filter(|d| !d.trim().is_empty())
        .ok_or(BundleCacheError::NoDestination)?;

    let store = CacheStore::open(&options.store_path).await?;
    let data = store.load().await?;

    let run = RunConfig::of(&engine, options.policy).fingerprint()?;
    let relay = OutputRelay::new(&destination, StagedOutputs::new(&options.staged_dir));
    let decider = InvalidationDecider::new(options.policy);

    let plan = match decider.check(&data, &run, &engine.entries()).await? {
        // Another run may have written the same destination since.
        Freshness::Fresh => match relay.replay().await? {
            Some(bytes) if data.outputs.get(&run) == Some(&Fingerprint::of_bytes(&bytes)) => {
                Plan::Replay(bytes)
            }
            Some(_) => Plan::Rebuild(MissReason::OutputChanged),
            None => Plan::Rebuild(MissReason::OutputMissing),
        },
        Freshness::Stale(reason) => Plan::Rebuild(reason),
    };

    match &plan {
        Plan::Replay(_) => info!("no bundling, use cache: '{}'", destination),
        Plan::Rebuild(reason) => info!(
            "bundling: '{}' ({}, run {})",
            destination,
            reason,
            short(&run)
        ),
    }

    Ok(Incremental {
        engine,
        options,
        store,
        run,
        relay,
        plan,
    })
}

impl<E: Bundler> Incremental<E> {
    /// The cache decision made by [`wrap`]
    pub fn outcome(&self) -> Outcome {
        match &self.plan {
            Plan::Replay(_) => Outcome::Hit,
            Plan::Rebuild(reason) => Outcome::Miss(reason.clone()),
        }
    }
}

/// Forwards engine events to the tracker, then to the caller's listener
struct Tracking<'a> {
    tracker: &'a mut DependencyTracker,
    inner: &'a mut dyn BundleEvents,
}

#[async_trait]
impl<'a> BundleEvents for Tracking<'a> {
    async fn dependency(&mut self, row: &DependencyRow) -> BundleCacheResult<()> {
        self.tracker.record(row).await?;
        self.inner.dependency(row).await
    }

    async fn output(&mut self, bytes: &[u8]) -> BundleCacheResult<()> {
        self.inner.output(bytes).await
    }
}

#[async_trait]
impl<E: Bundler> Bundler for Incremental<E> {
    fn entries(&self) -> Vec<PathBuf> {
        self.engine.entries()
    }

    fn options(&self) -> serde_json::Value {
        self.engine.options()
    }

    fn destination(&self) -> Option<String> {
        self.engine.destination()
    }

    async fn bundle(&mut self, events: &mut dyn BundleEvents) -> BundleCacheResult<Vec<u8>> {
        if let Plan::Replay(bytes) = &self.plan {
            events.output(bytes).await?;
            return Ok(bytes.clone());
        }

        let mut tracker = DependencyTracker::start(
            self.store.clone(),
            self.run.clone(),
            self.options.policy,
            self.options.persist,
            &self.engine.entries(),
        )
        .await?;

        let bytes = {
            let mut tracking = Tracking {
                tracker: &mut tracker,
                inner: events,
            };
            self.engine.bundle(&mut tracking).await?
        };

        // Capture before committing, so a recorded run always has a replay source.
        self.relay.capture(&bytes).await?;
        tracker.finish(Fingerprint::of_bytes(&bytes)).await?;

        Ok(bytes)
    }
}
