mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::Workspace;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn init_writes_baseline_and_prints_nothing() {
    let ws = Workspace::new();
    ws.write("file.txt", "hello");

    ws.cmd()
        .arg("--init")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let content = fs::read_to_string(ws.baseline_path()).unwrap();
    assert!(content.contains("algorithm = \"sha256\""));
    assert!(content.contains(&ws.key("file.txt")));
}

#[test]
fn init_records_requested_algorithm() {
    let ws = Workspace::new();
    ws.write("file.txt", "hello");

    ws.cmd().arg("--init").arg("--hash").arg("SHA512").assert().success();

    let content = fs::read_to_string(ws.baseline_path()).unwrap();
    assert!(content.contains("algorithm = \"sha512\""));
}

#[test]
fn init_replaces_existing_baseline() {
    let ws = Workspace::new();
    ws.write("old.txt", "x");
    ws.init();

    fs::remove_file(ws.root().join("old.txt")).unwrap();
    ws.write("new.txt", "y");
    ws.init();

    let content = fs::read_to_string(ws.baseline_path()).unwrap();
    assert!(content.contains(&ws.key("new.txt")));
    assert!(!content.contains(&ws.key("old.txt")));
}

#[test]
fn default_baseline_lands_in_working_directory() {
    let watched = TempDir::new().unwrap();
    let cwd = TempDir::new().unwrap();
    fs::write(watched.path().join("a.txt"), "A").unwrap();

    cargo_bin_cmd!("treesentry")
        .current_dir(cwd.path())
        .arg(watched.path())
        .arg("--init")
        .assert()
        .success();

    assert!(cwd.path().join("file_hashes.toml").exists());
}

#[test]
fn ignored_files_and_ignore_file_are_not_recorded() {
    let ws = Workspace::new();
    ws.write(".fimignore", "*.log\nbuild/\n");
    ws.write("keep.txt", "k");
    ws.write("debug.log", "l");
    ws.write("build/out.bin", "b");

    ws.init();

    let content = fs::read_to_string(ws.baseline_path()).unwrap();
    assert!(content.contains(&ws.key("keep.txt")));
    assert!(!content.contains("debug.log"));
    assert!(!content.contains("out.bin"));
    assert!(!content.contains(".fimignore"));
}

#[test]
fn unknown_algorithm_is_a_configuration_error() {
    let ws = Workspace::new();

    ws.cmd()
        .arg("--init")
        .arg("--hash")
        .arg("md5")
        .assert()
        .code(255)
        .stderr(predicate::str::contains("Unknown hash algorithm 'md5'"));

    assert!(!ws.baseline_path().exists());
}

#[test]
fn missing_directory_is_a_configuration_error() {
    let ws = Workspace::new();
    let missing = ws.root().join("missing");

    cargo_bin_cmd!("treesentry")
        .current_dir(ws.state.path())
        .arg(&missing)
        .arg("--init")
        .assert()
        .code(255)
        .stderr(predicate::str::contains("does not exist"));

    assert!(!ws.state.path().join("file_hashes.toml").exists());
}

#[test]
fn file_instead_of_directory_is_rejected() {
    let ws = Workspace::new();
    ws.write("plain.txt", "x");

    cargo_bin_cmd!("treesentry")
        .current_dir(ws.state.path())
        .arg(ws.root().join("plain.txt"))
        .arg("--init")
        .assert()
        .code(255)
        .stderr(predicate::str::contains("not a directory"));
}

#[test]
fn init_rejects_cycles_flag() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["--init", "--cycles", "2"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}
