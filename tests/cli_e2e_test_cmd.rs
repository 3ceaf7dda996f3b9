//! End-to-end tests for the `repodata-hotfixes test` command.
//!
//! The "live" reference is seeded as the unpatched snapshot, so the locally
//! generated hotfixes show up as additions in the diff.

mod common;
use common::prelude::*;

fn seed_test_tree(temp: &TempDir) {
    fixtures::seed(
        temp,
        "main",
        "linux-64",
        "repodata-reference.json",
        fixtures::main_linux64(),
    );
    fixtures::seed(
        temp,
        "main",
        "linux-64",
        "repodata_from_packages.json",
        fixtures::main_linux64(),
    );
}

#[test]
fn test_test_help() {
    let mut cmd = cargo_bin_cmd!("repodata-hotfixes");
    cmd.arg("test")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Test new hotfix changes before they are deployed",
        ));
}

#[test]
fn test_test_unified_diff_shows_new_hotfixes() {
    let temp = TempDir::new().unwrap();
    seed_test_tree(&temp);

    let mut cmd = cargo_bin_cmd!("repodata-hotfixes");
    cmd.arg("test")
        .arg("main")
        .arg("--subdirs")
        .arg("linux-64")
        .arg("--use-cache")
        .arg("--color")
        .arg("never")
        .arg("--base-dir")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Executing hotfix for channel 'main'"))
        // the revocation materializes as added lines relative to the live data
        .stdout(predicate::str::contains("package_has_been_revoked"))
        .stdout(predicate::str::contains("blas * mkl"));

    // the patched repodata and regenerated instructions are persisted
    assert!(temp
        .path()
        .join("main/linux-64/repodata-patched.json")
        .is_file());
    assert!(temp
        .path()
        .join("main/linux-64/patch_instructions.json")
        .is_file());
}

#[test]
fn test_test_show_pkgs_lists_changed_records() {
    let temp = TempDir::new().unwrap();
    seed_test_tree(&temp);

    let mut cmd = cargo_bin_cmd!("repodata-hotfixes");
    cmd.arg("test")
        .arg("main")
        .arg("--subdirs")
        .arg("linux-64")
        .arg("--use-cache")
        .arg("--show-pkgs")
        .arg("--color")
        .arg("never")
        .arg("--base-dir")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("New Hot Fixes:"))
        .stdout(predicate::str::contains(
            "linux-64::numpy-1.11.3-py36_2.tar.bz2",
        ))
        .stdout(predicate::str::contains("+  \"revoked\": true,"))
        // unchanged records stay quiet
        .stdout(predicate::str::contains("tzdata").not());
}

#[test]
fn test_completions_generate() {
    let mut cmd = cargo_bin_cmd!("repodata-hotfixes");
    cmd.arg("completions")
        .arg("bash")
        .assert()
        .success()
        .stdout(predicate::str::contains("repodata-hotfixes"));
}
