//! Integration tests for bundlecache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn bundlecache(dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("bundlecache");
        cmd.current_dir(dir).env_remove("BUNDLECACHE_CONFIG");
        cmd
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(
            dir.path().join("src/a.js"),
            "//= require ./b.js\nconsole.log(b);\n",
        )
        .unwrap();
        fs::write(dir.path().join("src/b.js"), "var b = 1;\n").unwrap();
        dir
    }

    fn bundle(dir: &Path, outfile: &str) -> assert_cmd::assert::Assert {
        bundle_with(dir, outfile, &[])
    }

    fn bundle_with(dir: &Path, outfile: &str, extra: &[&str]) -> assert_cmd::assert::Assert {
        bundlecache(dir)
            .args(["-v", "bundle", "src/a.js", "--content-hash", "-o"])
            .arg(outfile)
            .args(extra)
            .assert()
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        bundlecache(dir.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("skip bundling when nothing changed"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        bundlecache(dir.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("bundlecache"));
    }

    #[test]
    fn missing_outfile_fails() {
        let dir = project();
        bundlecache(dir.path())
            .args(["bundle", "src/a.js"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No output destination"));
        assert!(!dir.path().join("bundle-cache.json").exists());
    }

    #[test]
    fn second_bundle_uses_cache() {
        let dir = project();

        bundle(dir.path(), "out.js")
            .success()
            .stderr(predicate::str::contains("bundling: 'out.js'"));
        let first = fs::read_to_string(dir.path().join("out.js")).unwrap();
        assert_eq!(first, "var b = 1;\n//= require ./b.js\nconsole.log(b);\n");

        bundle(dir.path(), "out.js")
            .success()
            .stderr(predicate::str::contains("no bundling, use cache: 'out.js'"));
        let second = fs::read_to_string(dir.path().join("out.js")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn changed_dependency_rebuilds() {
        let dir = project();
        bundle(dir.path(), "out.js").success();

        fs::write(dir.path().join("src/b.js"), "var b = 2;\n").unwrap();
        bundle(dir.path(), "out.js")
            .success()
            .stderr(predicate::str::contains("b.js changed"));

        let out = fs::read_to_string(dir.path().join("out.js")).unwrap();
        assert!(out.starts_with("var b = 2;"));

        bundle(dir.path(), "out.js")
            .success()
            .stderr(predicate::str::contains("no bundling"));
    }

    #[test]
    fn option_change_is_a_new_run() {
        let dir = project();
        bundle(dir.path(), "out.js").success();
        let plain = fs::read_to_string(dir.path().join("out.js")).unwrap();

        bundle_with(dir.path(), "out.js", &["--opt", "banner=release"])
            .success()
            .stderr(predicate::str::contains("no cache entry"));
        let out = fs::read_to_string(dir.path().join("out.js")).unwrap();
        assert!(out.starts_with("/* release */"));

        // Both runs write out.js; the first must not replay the second's bundle.
        bundle(dir.path(), "out.js")
            .success()
            .stderr(predicate::str::contains("cached output overwritten"));
        let out = fs::read_to_string(dir.path().join("out.js")).unwrap();
        assert_eq!(out, plain);

        bundle(dir.path(), "out.js")
            .success()
            .stderr(predicate::str::contains("no bundling"));
        let out = fs::read_to_string(dir.path().join("out.js")).unwrap();
        assert_eq!(out, plain);
    }

    #[test]
    fn default_policy_rebuilds_on_touch() {
        let dir = project();
        let default_bundle = |dir: &Path| {
            bundlecache(dir)
                .args(["-v", "bundle", "src/a.js", "-o", "out.js"])
                .assert()
        };

        default_bundle(dir.path()).success();
        default_bundle(dir.path())
            .success()
            .stderr(predicate::str::contains("no bundling"));

        let file = fs::File::options()
            .write(true)
            .open(dir.path().join("src/b.js"))
            .unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000))
            .unwrap();
        drop(file);

        default_bundle(dir.path())
            .success()
            .stderr(predicate::str::contains("b.js changed"));
        default_bundle(dir.path())
            .success()
            .stderr(predicate::str::contains("no bundling"));
    }

    #[test]
    fn shell_destination_replays_staged_output() {
        let dir = project();

        bundle(dir.path(), "| tee one.js > two.js").success();
        assert!(dir.path().join(".bundle-cache").is_dir());
        let first = fs::read_to_string(dir.path().join("two.js")).unwrap();

        fs::remove_file(dir.path().join("two.js")).unwrap();
        bundle(dir.path(), "| tee one.js > two.js")
            .success()
            .stderr(predicate::str::contains("no bundling"));

        let two = fs::read_to_string(dir.path().join("two.js")).unwrap();
        let one = fs::read_to_string(dir.path().join("one.js")).unwrap();
        assert_eq!(two, first);
        assert_eq!(one, first);
    }

    #[test]
    fn show_and_clear() {
        let dir = project();
        bundle(dir.path(), "out.js").success();

        bundlecache(dir.path())
            .args(["show", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"items\""))
            .stdout(predicate::str::contains("b.js"));

        bundlecache(dir.path())
            .arg("show")
            .assert()
            .success()
            .stdout(predicate::str::contains("complete"));

        bundlecache(dir.path())
            .arg("clear")
            .assert()
            .success()
            .stdout(predicate::str::contains("Cleared"));

        bundlecache(dir.path())
            .arg("show")
            .assert()
            .success()
            .stdout(predicate::str::contains("No recorded runs."));
    }

    #[test]
    fn show_and_clear_follow_store_flag() {
        let dir = project();
        bundle_with(dir.path(), "out.js", &["--store", "alt/store.json"]).success();
        assert!(!dir.path().join("bundle-cache.json").exists());

        bundlecache(dir.path())
            .args(["show", "--store", "alt/store.json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("complete"));

        bundlecache(dir.path())
            .args(["clear", "--store", "alt/store.json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("alt/store.json"));

        bundlecache(dir.path())
            .args(["show", "--store", "alt/store.json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No recorded runs."));
    }

    #[test]
    fn config_file_sets_store_location() {
        let dir = project();
        fs::write(
            dir.path().join("bundlecache.toml"),
            "[cache]\nstore = \"cache/store.json\"\npolicy = \"content\"\n",
        )
        .unwrap();

        bundlecache(dir.path())
            .args(["bundle", "src/a.js", "-o", "out.js"])
            .assert()
            .success();

        assert!(dir.path().join("cache/store.json").exists());
        assert!(!dir.path().join("bundle-cache.json").exists());
    }

    #[test]
    fn blank_outfile_fails_without_cache() {
        let dir = project();
        bundlecache(dir.path())
            .args(["bundle", "src/a.js", "-o", "", "--no-cache"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No output destination"));
    }

    #[test]
    fn no_cache_bypasses_store() {
        let dir = project();
        bundlecache(dir.path())
            .args(["bundle", "src/a.js", "-o", "out.js", "--no-cache"])
            .assert()
            .success();

        assert!(dir.path().join("out.js").exists());
        assert!(!dir.path().join("bundle-cache.json").exists());
    }
}
