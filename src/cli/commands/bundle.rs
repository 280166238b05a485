//! Bundle command - bundle through the cache and deliver the output

use crate::checksum::FingerprintPolicy;
use crate::cli::args::BundleArgs;
use crate::config::{CacheOptions, Config};
use crate::engine::{Bundler, ConcatBundler, NoEvents};
use crate::error::{BundleCacheError, BundleCacheResult};
use crate::incremental::wrap;
use crate::relay::Destination;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Execute the bundle command
pub async fn execute(args: BundleArgs, config: &Config, cwd: &Path) -> BundleCacheResult<()> {
    let mut options = config.bundle.options.clone();
    options.extend(args.opts.iter().cloned());

    let mut engine = ConcatBundler::new(args.entries.clone(), args.outfile.clone())?
        .with_options(options);

    let cache_options = cache_options(&args, config, cwd);

    let Some(destination) = args.outfile.as_deref().filter(|d| !d.trim().is_empty()) else {
        return Err(BundleCacheError::NoDestination);
    };

    let bytes = if config.cache.enabled && !args.no_cache {
        let mut incremental = wrap(engine, cache_options).await?;
        incremental.bundle(&mut NoEvents).await?
    } else {
        debug!("Cache disabled, bundling directly");
        engine.bundle(&mut NoEvents).await?
    };

    deliver(destination, &bytes, cwd).await?;
    info!("written to {}", destination);

    Ok(())
}

/// Cache settings from config, overridden by flags
fn cache_options(args: &BundleArgs, config: &Config, cwd: &Path) -> CacheOptions {
    let mut options = super::locate(&args.location, config, cwd);
    if args.content_hash {
        options.policy = FingerprintPolicy::Content;
    }
    if let Some(persist) = args.persist {
        options.persist = persist;
    }
    options
}

/// Write the bundle to its destination
///
/// Plain paths are written directly. Shell destinations run under `sh -c`
/// with the bundle on stdin; a leading redirection or pipe reads from `cat`.
pub async fn deliver(destination: &str, bytes: &[u8], cwd: &Path) -> BundleCacheResult<()> {
    match Destination::classify(destination) {
        Destination::File(path) => {
            let path = cwd.join(path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    BundleCacheError::io(format!("creating {}", parent.display()), e)
                })?;
            }
            fs::write(&path, bytes)
                .await
                .map_err(|e| BundleCacheError::io(format!("writing {}", path.display()), e))
        }
        Destination::Shell(command) => {
            let trimmed = command.trim_start();
            let script = if trimmed.starts_with('>') || trimmed.starts_with('|') {
                format!("cat {}", trimmed)
            } else {
                command.clone()
            };
            run_shell(&script, bytes, cwd).await
        }
    }
}

async fn run_shell(script: &str, bytes: &[u8], cwd: &Path) -> BundleCacheResult<()> {
    debug!("Delivering {} bytes to: sh -c {:?}", bytes.len(), script);

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(script)
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| BundleCacheError::io(format!("spawning sh -c {script:?}"), e))?;

    if let Some(mut stdin) = child.stdin.take() {
        // A command that ignores its input is judged by its exit status alone.
        match stdin.write_all(bytes).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!("Destination command closed its input early");
            }
            Err(e) => return Err(BundleCacheError::io("writing bundle to destination", e)),
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| BundleCacheError::io("waiting for destination command", e))?;
    if !status.success() {
        return Err(BundleCacheError::Destination {
            command: script.to_string(),
            code: status.code().unwrap_or(-1),
        });
    }

    Ok(())
}
