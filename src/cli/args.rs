//! CLI argument definitions using clap derive

use crate::tracker::PersistPolicy;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// bundlecache - skip bundling when nothing changed
///
/// Fingerprints the bundle configuration and every file the last bundle
/// read, and replays the previous output when they all match.
#[derive(Parser, Debug)]
#[command(name = "bundlecache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path (defaults to ./bundlecache.toml)
    #[arg(short, long, global = true, env = "BUNDLECACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bundle entry files, reusing cached output when possible
    Bundle(BundleArgs),

    /// Show recorded runs in the cache store
    Show(ShowArgs),

    /// Reset the cache store and remove staged outputs
    Clear(ClearArgs),
}

/// Cache locations, overriding the config file
#[derive(Args, Debug, Default)]
pub struct StoreArgs {
    /// Cache store file
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Staged output directory
    #[arg(long)]
    pub staged_dir: Option<PathBuf>,
}

/// Arguments for the bundle command
#[derive(Parser, Debug)]
pub struct BundleArgs {
    /// Entry files
    #[arg(required = true)]
    pub entries: Vec<PathBuf>,

    /// Output destination: a file path or a shell redirection (e.g. "| gzip > out.gz")
    #[arg(short, long)]
    pub outfile: Option<String>,

    /// Bundle options (KEY=VALUE), part of the cache key
    #[arg(long = "opt", value_parser = parse_option)]
    pub opts: Vec<(String, String)>,

    /// Fingerprint sources by content instead of size and mtime
    #[arg(long)]
    pub content_hash: bool,

    /// When discovered dependencies are written to the store
    #[arg(long, value_enum)]
    pub persist: Option<PersistPolicy>,

    #[command(flatten)]
    pub location: StoreArgs,

    /// Bypass the cache entirely
    #[arg(long)]
    pub no_cache: bool,
}

/// Arguments for the show command
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub location: StoreArgs,
}

/// Arguments for the clear command
#[derive(Parser, Debug)]
pub struct ClearArgs {
    #[command(flatten)]
    pub location: StoreArgs,
}

/// Output format for show command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}

/// Parse a bundle option in KEY=VALUE format
fn parse_option(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE format: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
