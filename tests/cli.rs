use assert_cmd::prelude::*;
use filetime::{set_file_mtime, FileTime};
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_cli_checkpoints_dry_run_then_execute() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempdir()?;
    let ckpts = root.path().join("run").join("checkpoints");
    for (name, mtime) in [("old", 1_000), ("new", 2_000)] {
        fs::create_dir_all(ckpts.join(name))?;
        set_file_mtime(ckpts.join(name), FileTime::from_unix_time(mtime, 0))?;
    }

    let mut cmd = Command::cargo_bin("dirprune")?;
    cmd.arg("checkpoints").arg(root.path());
    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains("Would delete:")
                .and(predicate::str::contains("old"))
                .and(predicate::str::contains("Dry run complete.")),
        );
    assert!(ckpts.join("old").is_dir());

    let mut cmd = Command::cargo_bin("dirprune")?;
    cmd.arg("checkpoints").arg("--execute").arg(root.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Deleting:"));
    assert!(!ckpts.join("old").exists());
    assert!(ckpts.join("new").is_dir());

    Ok(())
}

#[test]
fn test_cli_named_removes_wandb() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempdir()?;
    fs::create_dir_all(root.path().join("a").join("wandb").join("wandb"))?;

    let mut cmd = Command::cargo_bin("dirprune")?;
    cmd.arg("named").arg("--execute").arg(root.path());
    cmd.assert().success();
    assert!(!root.path().join("a").join("wandb").exists());
    assert!(root.path().join("a").is_dir());

    Ok(())
}

#[test]
fn test_cli_archive_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let target = tempdir()?;
    let out = tempdir()?;
    fs::create_dir(target.path().join("sub"))?;
    fs::write(target.path().join("sub").join("old.txt"), "old")?;
    fs::write(target.path().join("new.txt"), "new")?;
    set_file_mtime(
        target.path().join("sub").join("old.txt"),
        FileTime::from_unix_time(946_684_800, 0),
    )?;
    let archive = out.path().join("old.tar");

    let mut cmd = Command::cargo_bin("dirprune")?;
    cmd.arg("archive")
        .arg("--execute")
        .arg(target.path())
        .arg("2010-01-01 00:00:00")
        .arg(&archive);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("verified successfully (1 files)"));

    assert!(archive.is_file());
    assert!(!target.path().join("sub").join("old.txt").exists());
    assert!(target.path().join("new.txt").exists());

    Ok(())
}

#[test]
fn test_cli_archive_nothing_to_do() -> Result<(), Box<dyn std::error::Error>> {
    let target = tempdir()?;
    let out = tempdir()?;
    fs::write(target.path().join("new.txt"), "new")?;

    let mut cmd = Command::cargo_bin("dirprune")?;
    cmd.arg("archive")
        .arg("--execute")
        .arg(target.path())
        .arg("2000-01-01 00:00:00")
        .arg(out.path().join("old.tar"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Nothing to do."));
    assert_eq!(fs::read_dir(out.path())?.count(), 0);

    Ok(())
}

#[test]
fn test_cli_argument_errors_exit_with_two() -> Result<(), Box<dyn std::error::Error>> {
    let target = tempdir()?;
    let file = target.path().join("file.txt");
    fs::write(&file, "x")?;
    let out = tempdir()?;

    // Root is not a directory
    let mut cmd = Command::cargo_bin("dirprune")?;
    cmd.arg("checkpoints").arg(&file);
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("is not a directory"));

    // Malformed cutoff
    let mut cmd = Command::cargo_bin("dirprune")?;
    cmd.arg("archive")
        .arg(target.path())
        .arg("yesterday")
        .arg(out.path().join("a.tar"));
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid cutoff timestamp"));

    // Missing archive directory
    let mut cmd = Command::cargo_bin("dirprune")?;
    cmd.arg("archive")
        .arg(target.path())
        .arg("2020-01-01 00:00:00")
        .arg(out.path().join("missing").join("a.tar"));
    cmd.assert().code(2);

    // Archive inside the target
    let mut cmd = Command::cargo_bin("dirprune")?;
    cmd.arg("archive")
        .arg("--execute")
        .arg(target.path())
        .arg("2099-01-01 00:00:00")
        .arg(target.path().join("a.tar"));
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("inside the target directory"));
    assert!(file.exists());

    Ok(())
}
