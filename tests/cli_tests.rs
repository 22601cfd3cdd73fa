//! CLI surface tests
//!
//! Drive the `fsarc` binary end to end: archive/restore cycles, the
//! mutually-exclusive mode flags, and the exit-code contract (0 on
//! success, 1 on argument or runtime errors).

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use std::thread::sleep;
use std::time::Duration;
use tempfile::tempdir;

fn snapshots_in(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("fsarc_"))
        .collect();
    names.sort();
    names
}

#[test]
fn test_cli_archive_restore_cycle() -> Result<(), Box<dyn std::error::Error>> {
    let source_dir = tempdir()?;
    let root = source_dir.path().join("data");
    fs::create_dir(&root)?;
    fs::write(root.join("notes.txt"), "first version\n")?;

    let archive_dir = tempdir()?;

    // full snapshot
    let mut cmd = Command::cargo_bin("fsarc")?;
    cmd.arg("-a").arg(archive_dir.path()).arg(&root);
    cmd.assert().success();
    assert_eq!(snapshots_in(archive_dir.path()).len(), 1);

    // snapshot names have one-second resolution
    sleep(Duration::from_millis(1100));
    fs::write(root.join("notes.txt"), "second version, longer\n")?;

    // delta snapshot with bsdiff
    let mut cmd = Command::cargo_bin("fsarc")?;
    cmd.arg("-a").arg(archive_dir.path()).arg("-b").arg(&root);
    cmd.assert().success();
    let names = snapshots_in(archive_dir.path());
    assert_eq!(names.len(), 2);

    // restore the latest snapshot into a fresh directory
    let out_dir = tempdir()?;
    let mut cmd = Command::cargo_bin("fsarc")?;
    cmd.arg("-r")
        .arg(archive_dir.path().join(&names[1]))
        .arg("-d")
        .arg(out_dir.path());
    cmd.assert().success();

    let rel = root.join("notes.txt");
    let rel = rel.to_string_lossy();
    let restored = out_dir.path().join(rel.trim_start_matches('/'));
    assert_eq!(fs::read_to_string(&restored)?, "second version, longer\n");
    Ok(())
}

#[test]
fn test_cli_modes_are_mutually_exclusive() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let mut cmd = Command::cargo_bin("fsarc")?;
    cmd.arg("-a")
        .arg(dir.path())
        .arg("-r")
        .arg(dir.path().join("x.zip"));
    cmd.assert().failure().code(1);
    Ok(())
}

#[test]
fn test_cli_requires_a_mode() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("fsarc")?;
    cmd.assert().failure().code(1);
    Ok(())
}

#[test]
fn test_cli_archive_needs_input_roots() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let mut cmd = Command::cargo_bin("fsarc")?;
    cmd.arg("-a").arg(dir.path());
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("input root"));
    assert!(snapshots_in(dir.path()).is_empty());
    Ok(())
}

#[test]
fn test_cli_rejects_bad_size_filter() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let mut cmd = Command::cargo_bin("fsarc")?;
    cmd.arg("-a")
        .arg(dir.path())
        .arg("--size-filter")
        .arg("12q")
        .arg(dir.path());
    cmd.assert().failure().code(1);
    Ok(())
}

#[test]
fn test_cli_dry_run_creates_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let source_dir = tempdir()?;
    fs::write(source_dir.path().join("f"), "data")?;
    let archive_dir = tempdir()?;

    let mut cmd = Command::cargo_bin("fsarc")?;
    cmd.arg("-a")
        .arg(archive_dir.path())
        .arg("--dry-run")
        .arg(source_dir.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Dry run"));
    assert!(snapshots_in(archive_dir.path()).is_empty());
    Ok(())
}

#[test]
fn test_cli_help_exits_zero() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("fsarc")?;
    cmd.arg("--help");
    cmd.assert().success().stdout(predicate::str::contains("--archive"));
    Ok(())
}
