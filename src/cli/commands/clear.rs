//! Clear command - reset the cache store

use crate::cli::args::ClearArgs;
use crate::config::Config;
use crate::error::BundleCacheResult;
use crate::store::{CacheStore, StagedOutputs};
use console::style;
use std::path::Path;

/// Execute the clear command
pub async fn execute(args: ClearArgs, config: &Config, cwd: &Path) -> BundleCacheResult<()> {
    let options = super::locate(&args.location, config, cwd);

    let store = CacheStore::open(&options.store_path).await?;
    store.clear().await?;
    let staged = StagedOutputs::new(&options.staged_dir).clear().await?;

    println!(
        "{} Cleared {} ({} staged outputs removed)",
        style("✓").green(),
        options.store_path.display(),
        staged
    );
    Ok(())
}
