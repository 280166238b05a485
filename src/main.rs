//! bundlecache - Incremental bundle cache
//!
//! CLI entry point that dispatches to subcommands.

use bundlecache::cli::{Cli, Commands};
use bundlecache::config::{Config, ConfigManager};
use bundlecache::error::{BundleCacheError, BundleCacheResult};
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> BundleCacheResult<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir()
        .map_err(|e| BundleCacheError::io("getting current directory", e))?;

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::in_dir(&cwd)
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);

    // Dispatch to command
    match cli.command {
        Commands::Bundle(args) => bundlecache::cli::commands::bundle(args, &config, &cwd).await,
        Commands::Show(args) => bundlecache::cli::commands::show(args, &config, &cwd).await,
        Commands::Clear(args) => bundlecache::cli::commands::clear(args, &config, &cwd).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; `general.verbose` counts as one level
fn init_logging(verbose: u8, config: &Config) {
    let level = verbose.max(u8::from(config.general.verbose));
    let filter = match level {
        0 => EnvFilter::new("bundlecache=warn"),
        1 => EnvFilter::new("bundlecache=info"),
        _ => EnvFilter::new("bundlecache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
