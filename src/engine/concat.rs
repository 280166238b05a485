//! Directive-driven concatenating bundler
//!
//! Source files declare their dependencies with directive lines:
//!
//! ```text
//! //= require ./lib/util.js
//! ```
//!
//! The bundle is every reachable file, each exactly once, dependencies
//! before dependents. Names without an extension are treated as virtual
//! and skipped.

use crate::engine::{
    absolute, is_trackable, resolve_dependency, BundleEvents, Bundler, DependencyRow,
};
use crate::error::{BundleCacheError, BundleCacheResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

const DIRECTIVE: &str = "//= require ";

/// Concatenating engine used by the CLI
#[derive(Debug, Clone)]
pub struct ConcatBundler {
    entries: Vec<PathBuf>,
    options: BTreeMap<String, String>,
    destination: Option<String>,
}

impl ConcatBundler {
    /// Create a bundler for the given entry files
    pub fn new(entries: Vec<PathBuf>, destination: Option<String>) -> BundleCacheResult<Self> {
        let entries = entries
            .iter()
            .map(|p| absolute(p))
            .collect::<BundleCacheResult<Vec<_>>>()?;
        Ok(Self {
            entries,
            options: BTreeMap::new(),
            destination,
        })
    }

    /// Add an option; options shape the run fingerprint
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Add several options
    pub fn with_options(mut self, options: impl IntoIterator<Item = (String, String)>) -> Self {
        self.options.extend(options);
        self
    }

    /// Banner prepended to the bundle when the `banner` option is set
    fn banner(&self) -> Option<&str> {
        self.options.get("banner").map(String::as_str)
    }
}

/// Referenced names declared in a source file
fn parse_directives(source: &str) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix(DIRECTIVE))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[async_trait]
impl Bundler for ConcatBundler {
    fn entries(&self) -> Vec<PathBuf> {
        self.entries.clone()
    }

    fn options(&self) -> serde_json::Value {
        serde_json::json!(self.options)
    }

    fn destination(&self) -> Option<String> {
        self.destination.clone()
    }

    async fn bundle(&mut self, events: &mut dyn BundleEvents) -> BundleCacheResult<Vec<u8>> {
        let mut seen = HashSet::new();
        let mut sources: HashMap<PathBuf, String> = HashMap::new();
        let mut order = Vec::new();

        // (path, children already pushed)
        let mut stack: Vec<(PathBuf, bool)> = self
            .entries
            .iter()
            .rev()
            .map(|p| (p.clone(), false))
            .collect();

        while let Some((path, expanded)) = stack.pop() {
            if expanded {
                order.push(path);
                continue;
            }
            if !seen.insert(path.clone()) {
                continue;
            }

            let source = fs::read_to_string(&path).await.map_err(|e| {
                BundleCacheError::io(format!("reading source {}", path.display()), e)
            })?;
            let deps = parse_directives(&source);
            events
                .dependency(&DependencyRow::new(path.clone(), deps.clone()))
                .await?;

            stack.push((path.clone(), true));
            for name in deps.iter().rev().filter(|n| is_trackable(n)) {
                let dep = resolve_dependency(&path, name)?;
                if !seen.contains(&dep) {
                    stack.push((dep, false));
                }
            }
            sources.insert(path, source);
        }

        let mut out = String::new();
        if let Some(banner) = self.banner() {
            out.push_str(&format!("/* {} */\n", banner));
        }
        for path in &order {
            let source = &sources[path];
            out.push_str(source);
            if !source.ends_with('\n') {
                out.push('\n');
            }
        }

        debug!("Bundled {} files ({} bytes)", order.len(), out.len());
        let bytes = out.into_bytes();
        events.output(&bytes).await?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NoEvents;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        rows: Vec<DependencyRow>,
        outputs: usize,
    }

    #[async_trait]
    impl BundleEvents for Recorder {
        async fn dependency(&mut self, row: &DependencyRow) -> BundleCacheResult<()> {
            self.rows.push(row.clone());
            Ok(())
        }

        async fn output(&mut self, _bytes: &[u8]) -> BundleCacheResult<()> {
            self.outputs += 1;
            Ok(())
        }
    }

    #[test]
    fn parses_directives() {
        let src = "//= require ./b.js\n  //= require events\nlet x = 1;\n// = require no\n";
        assert_eq!(parse_directives(src), vec!["./b.js", "events"]);
    }

    #[tokio::test]
    async fn dependencies_come_first() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.js"), "//= require ./b.js\nA\n").unwrap();
        std::fs::write(dir.path().join("b.js"), "B").unwrap();

        let mut bundler = ConcatBundler::new(vec![dir.path().join("a.js")], None).unwrap();
        let out = bundler.bundle(&mut NoEvents).await.unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "B\n//= require ./b.js\nA\n"
        );
    }

    #[tokio::test]
    async fn shared_and_cyclic_deps_emitted_once() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("a.js"),
            "//= require ./b.js\n//= require ./c.js\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("b.js"), "//= require ./c.js\n").unwrap();
        std::fs::write(dir.path().join("c.js"), "//= require ./a.js\n").unwrap();

        let mut recorder = Recorder::default();
        let mut bundler = ConcatBundler::new(vec![dir.path().join("a.js")], None).unwrap();
        bundler.bundle(&mut recorder).await.unwrap();

        assert_eq!(recorder.rows.len(), 3);
        assert_eq!(recorder.outputs, 1);
    }

    #[tokio::test]
    async fn virtual_names_are_not_read() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.js"), "//= require buffer\nA").unwrap();

        let mut recorder = Recorder::default();
        let mut bundler = ConcatBundler::new(vec![dir.path().join("a.js")], None).unwrap();
        bundler.bundle(&mut recorder).await.unwrap();

        assert_eq!(recorder.rows.len(), 1);
        assert_eq!(recorder.rows[0].deps, vec!["buffer"]);
    }

    #[tokio::test]
    async fn missing_dependency_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.js"), "//= require ./gone.js\n").unwrap();

        let mut bundler = ConcatBundler::new(vec![dir.path().join("a.js")], None).unwrap();
        let err = bundler.bundle(&mut NoEvents).await.unwrap_err();
        assert!(matches!(err, BundleCacheError::Io { .. }));
    }

    #[tokio::test]
    async fn banner_option_is_prepended() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.js"), "A\n").unwrap();

        let mut bundler = ConcatBundler::new(vec![dir.path().join("a.js")], None)
            .unwrap()
            .with_option("banner", "v1");
        let out = bundler.bundle(&mut NoEvents).await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "/* v1 */\nA\n");
        assert_eq!(bundler.options()["banner"], "v1");
    }
}
