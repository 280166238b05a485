//! Show command - list recorded runs

use crate::cli::args::{OutputFormat, ShowArgs};
use crate::config::Config;
use crate::error::BundleCacheResult;
use crate::store::{short, CacheStore, StoreData};
use console::style;
use std::path::Path;

/// Execute the show command
pub async fn execute(args: ShowArgs, config: &Config, cwd: &Path) -> BundleCacheResult<()> {
    let options = super::locate(&args.location, config, cwd);
    let data = CacheStore::open(&options.store_path).await?.load().await?;

    match args.format {
        OutputFormat::Table => print_table(&data),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&data)?),
    }

    Ok(())
}

fn print_table(data: &StoreData) {
    println!(
        "Created {}, changed {}",
        data.created.format("%Y-%m-%d %H:%M:%S"),
        data.changed.format("%Y-%m-%d %H:%M:%S")
    );

    if data.items.is_empty() {
        println!("No recorded runs.");
        return;
    }

    println!("{:<14} {:<8} {:<10}", "RUN", "FILES", "STATE");
    println!("{}", "-".repeat(34));

    for (run, files) in &data.items {
        let state = if data.pending.contains(run) {
            style("pending").yellow().to_string()
        } else {
            style("complete").green().to_string()
        };
        println!("{:<14} {:<8} {:<10}", short(run), files.len(), state);
    }
}
