//! CLI command implementations

pub mod bundle;
pub mod clear;
pub mod show;

pub use bundle::execute as bundle;
pub use clear::execute as clear;
pub use show::execute as show;

use crate::cli::args::StoreArgs;
use crate::config::{CacheOptions, Config};
use std::path::Path;

/// Cache locations from config, overridden by `--store` / `--staged-dir`
fn locate(location: &StoreArgs, config: &Config, cwd: &Path) -> CacheOptions {
    let mut options = CacheOptions::from_config(config, cwd);
    if let Some(ref store) = location.store {
        options.store_path = cwd.join(store);
    }
    if let Some(ref dir) = location.staged_dir {
        options.staged_dir = cwd.join(dir);
    }
    options
}
