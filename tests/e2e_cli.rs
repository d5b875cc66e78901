//! CLI end-to-end tests.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use smm_codec::{fixtures, Course, WiiuSave};
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[allow(deprecated)]
fn smmdb_cmd() -> Command {
    Command::cargo_bin("smmdb").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    smmdb_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    smmdb_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("smmdb {}", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn test_cli_start_help() {
    smmdb_cmd()
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Start the HTTP server"));
}

#[test]
fn test_cli_inspect_3ds() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("course.3ds");
    fs::write(&path, fixtures::sample_3ds("Inspected", "maker")).unwrap();

    smmdb_cmd()
        .arg("inspect")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Inspected"))
        .stdout(predicate::str::contains("Maker: maker"));
}

#[test]
fn test_cli_inspect_zip_as_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("courses.zip");
    fs::write(&path, fixtures::wiiu_zip(&["First", "Second"])).unwrap();

    let output = smmdb_cmd()
        .args(["inspect", "--json"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let views: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(views.len(), 2);
    assert_eq!(views[1]["title"], "Second");
}

#[test]
fn test_cli_inspect_rejects_garbage() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("junk.bin");
    fs::write(&path, b"%PDF-1.4 not a course").unwrap();

    smmdb_cmd()
        .arg("inspect")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("application/pdf"));
}

#[test]
fn test_cli_convert_3ds_to_wiiu() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("course.3ds");
    let output = dir.path().join("course000");
    fs::write(&input, fixtures::sample_3ds("Converted", "maker")).unwrap();

    smmdb_cmd()
        .arg("convert")
        .arg(&input)
        .arg(&output)
        .assert()
        .success();

    let save = WiiuSave::read_dir(&output).unwrap();
    assert_eq!(Course::from_wiiu(&save).unwrap().title(), "Converted");
}

#[test]
fn test_cli_convert_wiiu_folder_to_3ds() {
    let dir = tempdir().unwrap();
    let folder = dir.path().join("course000");
    fixtures::sample_course("Folder", "maker")
        .to_wiiu()
        .unwrap()
        .write_dir(&folder)
        .unwrap();
    let output = dir.path().join("out.3ds");

    smmdb_cmd()
        .args(["convert", "--to", "3ds"])
        .arg(&folder)
        .arg(&output)
        .assert()
        .success();

    let course = Course::from_3ds(&fs::read(&output).unwrap()).unwrap();
    assert_eq!(course.title(), "Folder");
}

#[test]
fn test_cli_convert_index_out_of_range() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("one.zip");
    fs::write(&input, fixtures::wiiu_zip(&["Only"])).unwrap();

    smmdb_cmd()
        .args(["convert", "--to", "json", "--index", "3"])
        .arg(&input)
        .arg(dir.path().join("out.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn test_cli_validate_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"server": {"port": 4040}}"#).unwrap();

    smmdb_cmd()
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains(":4040"));
}

#[test]
fn test_cli_validate_rejects_bad_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    smmdb_cmd().arg("validate").arg(&path).assert().failure();
}

#[test]
fn test_cli_create_account_prints_key() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.json");
    let db_path = dir.path().join("data").join("smmdb.db");
    fs::write(
        &config,
        serde_json::json!({ "server": { "db_path": db_path } }).to_string(),
    )
    .unwrap();

    let output = smmdb_cmd()
        .arg("--config")
        .arg(&config)
        .args(["create-account", "mario"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let key = String::from_utf8(output.stdout).unwrap();
    assert_eq!(key.trim().len(), 64);
    assert!(db_path.exists());

    smmdb_cmd()
        .arg("--config")
        .arg(&config)
        .args(["create-account", "mario"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}
