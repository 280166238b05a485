//! Error types for bundlecache
//!
//! All modules use `BundleCacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bundlecache operations
pub type BundleCacheResult<T> = Result<T, BundleCacheError>;

/// All errors that can occur in bundlecache
#[derive(Error, Debug)]
pub enum BundleCacheError {
    // Configuration errors
    #[error("No output destination given")]
    NoDestination,

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // Store errors
    #[error("Failed to lock cache store {path}: {source}")]
    StoreLock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Engine errors
    #[error("Bundling failed: {0}")]
    Engine(String),

    #[error("Output destination failed: {command}, exit code: {code}")]
    Destination { command: String, code: i32 },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BundleCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an engine error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NoDestination => Some("Pass an output destination with -o <FILE>"),
            Self::ConfigInvalid { .. } => Some("Check the [cache] and [bundle] sections"),
            Self::Json(_) => Some("The cache store may be corrupt. Run: bundlecache clear"),
            _ => None,
        }
    }
}
