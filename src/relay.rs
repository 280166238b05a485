//! Output replay and capture
//!
//! A destination that is a single plain path is its own cache: a hit reads
//! the file back. Anything else (pipes, redirections, tee commands) cannot
//! be read back, so a miss stages a copy of the bytes under the staged
//! output directory and a hit replays that copy.

use crate::error::{BundleCacheError, BundleCacheResult};
use crate::store::StagedOutputs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const SHELL_OPERATORS: &[char] = &['|', '&', ';', '<', '>', '(', ')'];

/// Where the bundle goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A single ordinary file
    File(PathBuf),
    /// A shell command line
    Shell(String),
}

impl Destination {
    /// Classify a destination descriptor
    ///
    /// A descriptor is a plain file when it parses to exactly one shell word
    /// with no operators. Quotes around that word are removed.
    pub fn classify(descriptor: &str) -> Self {
        match single_word(descriptor) {
            Some(word) => Self::File(PathBuf::from(word)),
            None => Self::Shell(descriptor.to_string()),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

/// The sole word of `s`, or `None` for zero or several words or any operator
fn single_word(s: &str) -> Option<String> {
    let mut words = 0;
    let mut word = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some('"') if c == '\\' => word.push(chars.next()?),
            Some(_) => word.push(c),
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    if !in_word {
                        in_word = true;
                        words += 1;
                    }
                }
                '\\' => {
                    word.push(chars.next()?);
                    if !in_word {
                        in_word = true;
                        words += 1;
                    }
                }
                c if c.is_whitespace() => in_word = false,
                c if SHELL_OPERATORS.contains(&c) => return None,
                c => {
                    word.push(c);
                    if !in_word {
                        in_word = true;
                        words += 1;
                    }
                }
            },
        }
    }

    (quote.is_none() && words == 1).then_some(word)
}

/// Replays cached output or captures fresh output for later replay
#[derive(Debug, Clone)]
pub struct OutputRelay {
    descriptor: String,
    destination: Destination,
    staged: StagedOutputs,
}

impl OutputRelay {
    pub fn new(descriptor: impl Into<String>, staged: StagedOutputs) -> Self {
        let descriptor = descriptor.into();
        Self {
            destination: Destination::classify(&descriptor),
            descriptor,
            staged,
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Bytes of the last run's output, `None` when they are gone
    pub async fn replay(&self) -> BundleCacheResult<Option<Vec<u8>>> {
        match &self.destination {
            Destination::File(path) => read_if_exists(path).await,
            Destination::Shell(_) => self.staged.read(&self.descriptor).await,
        }
    }

    /// Keep a copy of fresh output when the destination cannot be read back
    pub async fn capture(&self, bytes: &[u8]) -> BundleCacheResult<()> {
        match &self.destination {
            Destination::File(_) => Ok(()),
            Destination::Shell(_) => {
                let path = self.staged.write(&self.descriptor, bytes).await?;
                debug!(
                    "Captured output for '{}' in {}",
                    self.descriptor,
                    path.display()
                );
                Ok(())
            }
        }
    }
}

async fn read_if_exists(path: &Path) -> BundleCacheResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BundleCacheError::io(
            format!("reading output {}", path.display()),
            e,
        )),
    }
}
