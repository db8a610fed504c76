/// Integration tests for the `prebuild` sub-command: the build-driver entry
/// point that stamps the header and stages PGO files for Release builds.
use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const HEADER: &str = "\
#define VERSION_MAJOR 1
#define VERSION_MINOR 4
#define VERSION_PATCH 0
#define VERSION_BUILD 1044
";

#[test]
fn prebuild_stamps_relative_to_the_solution_dir() {
    let solution = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::write(solution.path().join("version.h"), HEADER).unwrap();

    Command::cargo_bin("buildstamp")
        .unwrap()
        .args([
            "prebuild",
            "Debug",
            "x64",
            solution.path().to_str().unwrap(),
            out.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Build: 1.4.0.1045"));

    let header = fs::read_to_string(solution.path().join("version.h")).unwrap();
    assert!(header.contains("#define VERSION_BUILD 1045"));
}

#[test]
fn release_prebuild_copies_pgo_files() {
    let solution = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::write(solution.path().join("version.h"), HEADER).unwrap();
    let optimizer = solution.path().join("Optimizer");
    fs::create_dir(&optimizer).unwrap();
    fs::write(optimizer.join("app.pgd"), b"pgo-db").unwrap();

    Command::cargo_bin("buildstamp")
        .unwrap()
        .args([
            "prebuild",
            "Release",
            "x64",
            solution.path().to_str().unwrap(),
            out.path().to_str().unwrap(),
        ])
        .assert()
        .success();

    assert_eq!(fs::read(out.path().join("app.pgd")).unwrap(), b"pgo-db");
}

#[test]
fn debug_prebuild_leaves_pgo_files_alone() {
    let solution = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::write(solution.path().join("version.h"), HEADER).unwrap();
    let optimizer = solution.path().join("Optimizer");
    fs::create_dir(&optimizer).unwrap();
    fs::write(optimizer.join("app.pgd"), b"pgo-db").unwrap();

    Command::cargo_bin("buildstamp")
        .unwrap()
        .args([
            "prebuild",
            "Debug",
            "x64",
            solution.path().to_str().unwrap(),
            out.path().to_str().unwrap(),
        ])
        .assert()
        .success();

    assert!(!out.path().join("app.pgd").exists());
}

#[test]
fn prebuild_fails_when_the_header_is_missing() {
    let solution = tempdir().unwrap();
    let out = tempdir().unwrap();

    Command::cargo_bin("buildstamp")
        .unwrap()
        .args([
            "prebuild",
            "Debug",
            "x64",
            solution.path().to_str().unwrap(),
            out.path().to_str().unwrap(),
        ])
        .assert()
        .failure();
}
