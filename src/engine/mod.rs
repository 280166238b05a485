//! Contract for the bundling engine being cached
//!
//! The cache never looks inside a bundle. It only needs an engine that can
//! report its configuration, announce each source file it walks, and hand
//! back the bytes it produced. Anything implementing [`Bundler`] can be
//! wrapped with [`crate::wrap`].

pub mod concat;

pub use concat::ConcatBundler;

use crate::error::{BundleCacheError, BundleCacheResult};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// One discovery notification: a source file and the names it references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRow {
    /// File that was just read
    pub file: PathBuf,
    /// Referenced names, relative to `file`'s directory
    pub deps: Vec<String>,
}

impl DependencyRow {
    pub fn new(file: impl Into<PathBuf>, deps: Vec<String>) -> Self {
        Self {
            file: file.into(),
            deps,
        }
    }
}

/// Listener for engine events
///
/// Engines await every call before continuing, so work done by a listener
/// happens-before the bundle is returned.
#[async_trait]
pub trait BundleEvents: Send {
    /// A source file was read and its references resolved
    async fn dependency(&mut self, _row: &DependencyRow) -> BundleCacheResult<()> {
        Ok(())
    }

    /// The bundle is ready
    async fn output(&mut self, _bytes: &[u8]) -> BundleCacheResult<()> {
        Ok(())
    }
}

/// Listener that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl BundleEvents for NoEvents {}

/// Abstract bundling engine
#[async_trait]
pub trait Bundler: Send {
    /// Entry files
    fn entries(&self) -> Vec<PathBuf>;

    /// Options and flags that shape the output
    fn options(&self) -> serde_json::Value;

    /// Output destination descriptor (a path or a shell redirection)
    fn destination(&self) -> Option<String>;

    /// Walk the dependency graph and produce the bundle
    async fn bundle(&mut self, events: &mut dyn BundleEvents) -> BundleCacheResult<Vec<u8>>;
}

/// Whether a referenced name looks like a real file rather than a virtual module
pub fn is_trackable(name: &str) -> bool {
    Path::new(name).extension().is_some()
}

/// Absolute path of `name` referenced from `owner`
pub fn resolve_dependency(owner: &Path, name: &str) -> BundleCacheResult<PathBuf> {
    let base = owner.parent().unwrap_or_else(|| Path::new(""));
    absolute(&base.join(name))
}

/// Absolute, lexically normalized form of `path`
pub fn absolute(path: &Path) -> BundleCacheResult<PathBuf> {
    let abs = std::path::absolute(path)
        .map_err(|e| BundleCacheError::io(format!("resolving {}", path.display()), e))?;
    Ok(normalize(&abs))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
