//! GitRepository against throwaway repositories. Skipped without `git`.

use std::path::Path;
use std::process::{Command, Stdio};

use confmon::{CommitOutcome, GitRepository, Repository, Snapshot, SnapshotArchive};

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(output.status.success(), "git {args:?} failed");
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn repository(root: &Path) -> GitRepository {
    GitRepository::new(root)
        .with_branch("master")
        .with_identity("confmon test", "confmon@example.net")
}

#[tokio::test]
async fn test_prepare_initializes_archive() {
    if !git_available() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("archive");

    let mut repo = repository(&root);
    repo.prepare().await.unwrap();

    assert!(root.join(".git").exists());
    assert_eq!(git(&root, &["symbolic-ref", "--short", "HEAD"]), "master");

    // Preparing an existing archive is a no-op
    repo.prepare().await.unwrap();
}

#[tokio::test]
async fn test_stage_and_commit() {
    if !git_available() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let mut repo = repository(&root);
    repo.prepare().await.unwrap();

    assert_eq!(
        repo.commit("Device R1 was updated").await.unwrap(),
        CommitOutcome::NothingToCommit
    );

    std::fs::write(root.join("R1.cnf"), "hostname R1").unwrap();
    std::fs::write(root.join("R2.cnf"), "hostname R2").unwrap();
    repo.stage(&root.join("R1.cnf")).await.unwrap();
    assert_eq!(
        repo.commit("Device R1 was updated").await.unwrap(),
        CommitOutcome::Committed
    );

    assert_eq!(git(&root, &["log", "-1", "--format=%s"]), "Device R1 was updated");
    assert_eq!(git(&root, &["ls-files"]), "R1.cnf");

    // Unstaged R2 must not be swept into a later commit
    assert_eq!(
        repo.commit("Devices updated: R2").await.unwrap(),
        CommitOutcome::NothingToCommit
    );
}

#[tokio::test]
async fn test_push_to_remote() {
    if !git_available() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let remote = dir.path().join("remote.git");
    std::fs::create_dir(&remote).unwrap();
    git(&remote, &["init", "--bare", "--quiet"]);

    let root = dir.path().join("archive");
    let remote_url = remote.to_string_lossy().into_owned();
    let mut repo = repository(&root).with_remote(remote_url.as_str());
    repo.prepare().await.unwrap();

    std::fs::write(root.join("R1.cnf"), "hostname R1").unwrap();
    repo.stage(&root.join("R1.cnf")).await.unwrap();
    repo.commit("Device R1 was updated").await.unwrap();
    repo.push().await.unwrap();

    assert_eq!(
        git(&remote, &["log", "-1", "--format=%s", "master"]),
        "Device R1 was updated"
    );
}

#[tokio::test]
async fn test_push_without_remote_is_skipped() {
    if !git_available() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let mut repo = repository(dir.path());
    repo.prepare().await.unwrap();
    repo.push().await.unwrap();
}

#[tokio::test]
async fn test_switches_to_configured_branch() {
    if !git_available() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();

    let mut repo = repository(&root);
    repo.prepare().await.unwrap();
    std::fs::write(root.join("R1.cnf"), "a").unwrap();
    repo.stage(&root.join("R1.cnf")).await.unwrap();
    repo.commit("Device R1 was updated").await.unwrap();

    let mut repo = repository(&root).with_branch("configs");
    repo.prepare().await.unwrap();
    assert_eq!(git(&root, &["symbolic-ref", "--short", "HEAD"]), "configs");
}

#[tokio::test]
async fn test_stage_through_relative_archive_root() {
    if !git_available() {
        eprintln!("skipping: git not found in PATH");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    // Only this test relies on the working directory; the others use
    // absolute paths.
    std::env::set_current_dir(dir.path()).unwrap();

    let archive = SnapshotArchive::new("./archive");
    let mut repo = repository(Path::new("./archive"));
    repo.prepare().await.unwrap();

    let path = archive.persist(&Snapshot::new("R1", "hostname R1")).unwrap();
    assert_eq!(path, Path::new("./archive/R1.cnf"));
    repo.stage(&path).await.unwrap();
    assert_eq!(
        repo.commit("Device R1 was updated").await.unwrap(),
        CommitOutcome::Committed
    );

    let root = dir.path().join("archive");
    assert_eq!(git(&root, &["ls-files"]), "R1.cnf");
}
