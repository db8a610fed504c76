/// Integration tests for the `filter` sub-command: keyword linking and the
/// reference-listing markers, checked against the binary's stdout.
use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const TABLE: &str = "\
Name,URL,Section
SetEvent,https://example/set,Synchronization
CloseHandle,https://example/close,Handles
";

#[test]
fn doc_comments_get_linked() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("API_Documentation.csv"), TABLE).unwrap();
    fs::write(
        tmp.path().join("goertzel.cpp"),
        "   /// Use CloseHandle to close X\n   br = CloseHandle( h );\n",
    )
    .unwrap();

    Command::cargo_bin("buildstamp")
        .unwrap()
        .current_dir(tmp.path())
        .args(["filter", "goertzel.cpp"])
        .assert()
        .success()
        .stdout(predicate::eq(
            "   /// Use [CloseHandle](https://example/close) to close X\n   br = CloseHandle( h );\n",
        ));
}

#[test]
fn all_docs_marker_expands_to_grouped_table() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("API_Documentation.csv"), TABLE).unwrap();
    fs::write(
        tmp.path().join("REFERENCES.md"),
        "# References\n<< Print All API Documentation >>\n",
    )
    .unwrap();

    Command::cargo_bin("buildstamp")
        .unwrap()
        .current_dir(tmp.path())
        .args(["filter", "REFERENCES.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("## Handles"))
        .stdout(predicate::str::contains(
            "| [CloseHandle](https://example/close) | https://example/close |",
        ))
        .stdout(predicate::str::contains("## Synchronization"))
        .stdout(predicate::str::contains("<< Print All API Documentation >>").not());
}

#[test]
fn module_marker_is_restricted_to_used_keywords() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("API_Documentation.csv"), TABLE).unwrap();
    fs::write(
        tmp.path().join("audio.cpp"),
        "/// << Print Module API Documentation >>\nvoid stop( void ) {\n   CloseHandle( h );\n}\n",
    )
    .unwrap();

    Command::cargo_bin("buildstamp")
        .unwrap()
        .current_dir(tmp.path())
        .args(["filter", "audio.cpp"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/// #### Handles"))
        .stdout(predicate::str::contains(
            "/// | [CloseHandle](https://example/close) | https://example/close |",
        ))
        .stdout(predicate::str::contains("SetEvent").not());
}

#[test]
fn python_sources_pass_through_without_a_table() {
    let tmp = tempdir().unwrap();
    // No API_Documentation.csv on purpose: .py files must not need it.
    fs::write(
        tmp.path().join("pre_build_event.py"),
        "## Uses CloseHandle in a comment\nprint('hi')\n",
    )
    .unwrap();

    Command::cargo_bin("buildstamp")
        .unwrap()
        .current_dir(tmp.path())
        .args(["filter", "pre_build_event.py"])
        .assert()
        .success()
        .stdout(predicate::eq("## Uses CloseHandle in a comment\nprint('hi')\n"));
}

#[test]
fn missing_table_is_fatal() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("audio.cpp"), "/// CloseHandle\n").unwrap();

    Command::cargo_bin("buildstamp")
        .unwrap()
        .current_dir(tmp.path())
        .args(["filter", "audio.cpp"])
        .assert()
        .failure();
}

#[test]
fn missing_source_is_fatal() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("API_Documentation.csv"), TABLE).unwrap();

    Command::cargo_bin("buildstamp")
        .unwrap()
        .current_dir(tmp.path())
        .args(["filter", "nope.cpp"])
        .assert()
        .failure();
}
