//! Version-controlled snapshot archive.
//!
//! The orchestrator only talks to the [`Repository`] trait. [`GitRepository`]
//! drives the `git` binary inside the archive root.

use std::borrow::Cow;
use std::ffi::OsStr;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use log::{debug, info};
use tokio::process::Command;

use crate::error::{RepositoryError, Result};

/// Default branch when the inventory names none.
pub const DEFAULT_BRANCH: &str = "master";

/// Identity used for commits when git has none configured.
const FALLBACK_NAME: &str = "confmon";
const FALLBACK_EMAIL: &str = "confmon@localhost";

/// Result of a commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Nothing was staged; not an error.
    NothingToCommit,
}

/// Stage, commit and publish snapshot files.
pub trait Repository: Send {
    /// Make the archive usable: create it, initialize or clone it, and
    /// check out the working branch.
    fn prepare(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn stage(&mut self, path: &Path) -> impl Future<Output = Result<()>> + Send;

    fn commit(&mut self, message: &str) -> impl Future<Output = Result<CommitOutcome>> + Send;

    fn push(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// [`Repository`] backed by the `git` command line tool.
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: PathBuf,
    remote: Option<String>,
    branch: String,
    push_enabled: bool,
    identity: Option<(String, String)>,
}

impl GitRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            remote: None,
            branch: DEFAULT_BRANCH.to_string(),
            push_enabled: true,
            identity: None,
        }
    }

    /// Remote name (e.g. "origin") or URL to push to. A URL is also cloned
    /// when the archive does not exist yet.
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_push(mut self, enabled: bool) -> Self {
        self.push_enabled = enabled;
        self
    }

    /// Commit author, overriding git's own configuration.
    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.identity = Some((name.into(), email.into()));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    fn command<I, S>(&self, args: I) -> (Command, String)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some((name, email)) = &self.identity {
            cmd.arg("-c")
                .arg(format!("user.name={name}"))
                .arg("-c")
                .arg(format!("user.email={email}"));
        }

        let mut text = Vec::new();
        for arg in args {
            text.push(arg.as_ref().to_string_lossy().into_owned());
            cmd.arg(arg);
        }
        (cmd, text.join(" "))
    }

    /// Run git and return its output whatever the exit status.
    async fn output<I, S>(&self, args: I) -> Result<(Output, String)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let (mut cmd, command) = self.command(args);
        debug!("git {}", command);
        let output = cmd
            .output()
            .await
            .map_err(|source| RepositoryError::Spawn {
                command: command.clone(),
                source,
            })?;
        Ok((output, command))
    }

    /// Run git and fail unless it exits successfully.
    async fn run<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let (output, command) = self.output(args).await?;
        if !output.status.success() {
            return Err(failure(command, &output).into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn succeeds(&self, args: &[&str]) -> Result<bool> {
        Ok(self.output(args).await?.0.status.success())
    }

    /// `path` as git sees it from inside the archive root.
    ///
    /// Git runs with the root as its working directory, so a path that
    /// already includes a relative root would be resolved twice.
    fn pathspec<'p>(&self, path: &'p Path) -> Cow<'p, Path> {
        if let Ok(relative) = path.strip_prefix(&self.root) {
            return Cow::Borrowed(relative);
        }
        match (self.root.canonicalize(), path.canonicalize()) {
            (Ok(root), Ok(full)) => match full.strip_prefix(&root) {
                Ok(relative) => Cow::Owned(relative.to_path_buf()),
                Err(_) => Cow::Borrowed(path),
            },
            _ => Cow::Borrowed(path),
        }
    }

    async fn is_work_tree(&self) -> Result<bool> {
        if !self.root.is_dir() {
            return Ok(false);
        }
        // The archive must be the top of its own work tree, not a
        // subdirectory of some unrelated repository.
        let (output, _) = self.output(["rev-parse", "--show-toplevel"]).await?;
        if !output.status.success() {
            return Ok(false);
        }
        let toplevel = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        let (Ok(toplevel), Ok(root)) = (toplevel.canonicalize(), self.root.canonicalize()) else {
            return Ok(false);
        };
        Ok(toplevel == root)
    }

    async fn clone_remote(&self, url: &str) -> Result<()> {
        info!("cloning {} into {}", url, self.root.display());
        let parent = match self.root.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|source| RepositoryError::CreateArchive {
            path: parent.clone(),
            source,
        })?;

        let mut cmd = Command::new("git");
        cmd.current_dir(&parent)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .arg("clone")
            .arg(url)
            .arg(&self.root);
        let command = format!("clone {} {}", url, self.root.display());
        let output = cmd.output().await.map_err(|source| RepositoryError::Spawn {
            command: command.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(failure(command, &output).into());
        }
        Ok(())
    }

    async fn checkout_branch(&self) -> Result<()> {
        let (output, _) = self.output(["symbolic-ref", "--short", "HEAD"]).await?;
        let current = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() && current == self.branch {
            return Ok(());
        }

        if !self.succeeds(&["rev-parse", "--verify", "--quiet", "HEAD"]).await? {
            // Unborn repository: just point HEAD at the branch
            let head = format!("refs/heads/{}", self.branch);
            self.run(["symbolic-ref", "HEAD", head.as_str()]).await?;
        } else if !self.succeeds(&["checkout", "--quiet", self.branch.as_str()]).await? {
            self.run(["checkout", "--quiet", "-b", self.branch.as_str()])
                .await?;
        }
        debug!("on branch {}", self.branch);
        Ok(())
    }

    async fn ensure_identity(&mut self) -> Result<()> {
        if self.identity.is_some() || self.succeeds(&["config", "user.email"]).await? {
            return Ok(());
        }
        info!(
            "no git identity configured, committing as {} <{}>",
            FALLBACK_NAME, FALLBACK_EMAIL
        );
        self.identity = Some((FALLBACK_NAME.to_string(), FALLBACK_EMAIL.to_string()));
        Ok(())
    }
}

fn failure(command: String, output: &Output) -> RepositoryError {
    RepositoryError::Git {
        command,
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

/// Whether a remote is a URL rather than the name of a configured remote.
fn is_url(remote: &str) -> bool {
    remote.contains("://") || remote.contains(':') || remote.contains('/')
}

impl Repository for GitRepository {
    async fn prepare(&mut self) -> Result<()> {
        if !self.is_work_tree().await? {
            match self.remote.as_deref() {
                Some(url) if is_url(url) && !self.root.exists() => {
                    self.clone_remote(url).await?;
                }
                _ => {
                    std::fs::create_dir_all(&self.root).map_err(|source| {
                        RepositoryError::CreateArchive {
                            path: self.root.clone(),
                            source,
                        }
                    })?;
                    info!("initializing git repository in {}", self.root.display());
                    self.run(["init", "--quiet"]).await?;
                }
            }
        }

        self.checkout_branch().await?;
        self.ensure_identity().await
    }

    async fn stage(&mut self, path: &Path) -> Result<()> {
        let pathspec = self.pathspec(path);
        self.run([OsStr::new("add"), OsStr::new("--"), pathspec.as_os_str()])
            .await?;
        Ok(())
    }

    async fn commit(&mut self, message: &str) -> Result<CommitOutcome> {
        // Exit status 0 means the index matches HEAD
        if self.succeeds(&["diff", "--cached", "--quiet"]).await? {
            info!("nothing to commit");
            return Ok(CommitOutcome::NothingToCommit);
        }

        self.run(["commit", "--quiet", "-m", message]).await?;
        info!("committed: {}", message);
        Ok(CommitOutcome::Committed)
    }

    async fn push(&mut self) -> Result<()> {
        if !self.push_enabled {
            info!("push disabled, leaving commit local");
            return Ok(());
        }
        let Some(remote) = self.remote.as_deref() else {
            info!("no git remote configured, skipping push");
            return Ok(());
        };

        self.run(["push", "--quiet", remote, self.branch.as_str()])
            .await?;
        info!("pushed {} to {}", self.branch, remote);
        Ok(())
    }
}
