//! CLI tests for assetline.
//!
//! Each test copies `fixtures/project/` into a temp dir and runs the binary
//! against it with `--root`.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn assetline() -> Command {
    cargo_bin_cmd!("assetline")
}

fn copy_dir(src: &Path, dst: &Path) {
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let target = dst.join(entry.file_name());
        if entry.path().is_dir() {
            fs::create_dir_all(&target).unwrap();
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

fn fixture_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    copy_dir(
        &Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/project"),
        tmp.path(),
    );
    tmp
}

fn single_file_with_prefix(dir: &Path, prefix: &str) -> String {
    let names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(prefix))
        .collect();
    assert_eq!(names.len(), 1, "expected one {prefix}* in {}: {names:?}", dir.display());
    fs::read_to_string(dir.join(&names[0])).unwrap()
}

// =============================================================================
// Help & config
// =============================================================================

#[test]
fn help_lists_commands() {
    assetline()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("clear-cache"));
}

#[test]
fn gen_config_prints_stock_toml() {
    assetline()
        .arg("gen-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[project]"))
        .stdout(predicate::str::contains("[purge]"));
}

#[test]
fn unknown_config_key_fails() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("assetline.toml"), "[project]\nnmae = \"typo\"\n").unwrap();
    assetline()
        .args(["build", "--root"])
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

// =============================================================================
// Build
// =============================================================================

#[test]
fn development_build_writes_reports_and_sourcemaps() {
    let tmp = fixture_project();
    assetline()
        .args(["build", "--env", "development", "--root"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("==> prebuild: annotations"))
        .stdout(predicate::str::contains("Build complete (development)"));

    assert!(tmp.path().join("todo-javascript.md").exists());
    assert!(tmp.path().join("todo-styles.md").exists());
    assert!(tmp.path().join("todo-templates.md").exists());
    let css = fs::read_to_string(tmp.path().join("public/assets/stylesheets/app.css")).unwrap();
    assert!(css.contains("sourceMappingURL="));
}

#[test]
fn production_build_is_minified_bannered_and_revisioned() {
    let tmp = fixture_project();
    assetline()
        .args(["build", "--env", "production", "--root"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("==> postbuild: compress-images"))
        .stdout(predicate::str::contains("==> postbuild: banners"));

    let dest = tmp.path().join("public/assets");
    let css = single_file_with_prefix(&dest.join("stylesheets"), "app-");
    assert!(css.starts_with("/**\n * Harbor Lights - Marketing site\n"));
    assert!(!css.contains("sourceMappingURL"));
    assert!(!css.contains("legacy-banner"));

    let manifest = fs::read_to_string(dest.join("rev-manifest.json")).unwrap();
    assert!(manifest.contains("\"stylesheets/app.css\""));
    assert!(dest.join("images/icons/mark.svg").exists());
    assert!(!tmp.path().join("todo-styles.md").exists());
}

#[test]
fn broken_stylesheet_fails_build() {
    let tmp = fixture_project();
    fs::write(
        tmp.path().join("src/stylesheets/app.scss"),
        ".a { color: $nope; }\n",
    )
    .unwrap();
    assetline()
        .args(["build", "--env", "production", "--root"])
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Style build failed"));
}

// =============================================================================
// Supplementary commands
// =============================================================================

#[test]
fn images_then_clear_cache() {
    let tmp = fixture_project();
    assetline()
        .arg("images")
        .arg("--root")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("icons/mark.svg"))
        .stdout(predicate::str::contains("Cache: 1 compressed"));

    let svg = fs::read_to_string(tmp.path().join("public/assets/images/icons/mark.svg")).unwrap();
    assert!(!svg.contains("<!--"));

    assetline()
        .arg("images")
        .arg("--root")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("icons/mark.svg: cached"));

    assetline()
        .arg("clear-cache")
        .arg("--root")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared"));
    assert!(!tmp.path().join(".assetline-cache").exists());

    assetline()
        .arg("clear-cache")
        .arg("--root")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to clear"));
}

#[test]
fn todo_command_reports_counts() {
    let tmp = fixture_project();
    assetline()
        .arg("todo")
        .arg("--root")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("todo-javascript.md: 1 marker"))
        .stdout(predicate::str::contains("todo-templates.md: 2 markers"));
}
