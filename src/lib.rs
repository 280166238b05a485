//! bundlecache - Incremental bundle cache
//!
//! Sits in front of a deterministic bundling engine and skips the bundle
//! step when neither the configuration nor any file the last bundle read
//! has changed, replaying the previous output instead.

pub mod checksum;
pub mod cli;
pub mod config;
pub mod decider;
pub mod engine;
pub mod error;
pub mod incremental;
pub mod relay;
pub mod store;
pub mod tracker;

pub use checksum::{Fingerprint, FingerprintPolicy};
pub use config::CacheOptions;
pub use engine::{BundleEvents, Bundler, DependencyRow, NoEvents};
pub use error::{BundleCacheError, BundleCacheResult};
pub use incremental::{wrap, Incremental, Outcome};
pub use tracker::PersistPolicy;
