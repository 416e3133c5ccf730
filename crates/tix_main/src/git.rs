//! Local git operations through the `git` binary

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run `git args..` in the repository and return its trimmed stdout.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let command = format!("git {}", args.join(" "));
        debug!(command = %command, cwd = %self.dir.display(), "Running git");

        let output = Command::new("git")
            .current_dir(&self.dir)
            .args(args)
            .output()
            .await
            .with_context(|| format!("failed to run `{command}`; is git installed and in PATH?"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("`{command}` failed ({}): {}", output.status, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// True when `git status --porcelain` reports nothing.
    pub async fn is_clean(&self) -> Result<bool> {
        let status = self.run(&["status", "--porcelain"]).await?;
        debug!(clean = status.is_empty(), "Git status checked");
        Ok(status.is_empty())
    }

    pub async fn current_branch(&self) -> Result<String> {
        let branch = self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        if branch == "HEAD" {
            bail!("HEAD is not a branch");
        }
        Ok(branch)
    }

    /// Create `name` from HEAD and check it out.
    pub async fn create_branch(&self, name: &str) -> Result<()> {
        self.run(&["checkout", "-b", name])
            .await
            .with_context(|| format!("failed to create branch {name}"))?;
        Ok(())
    }

    pub async fn checkout(&self, name: &str) -> Result<()> {
        self.run(&["checkout", name])
            .await
            .with_context(|| format!("failed to checkout branch {name}"))?;
        Ok(())
    }

    pub async fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(&["push", "-u", remote, branch])
            .await
            .with_context(|| format!("failed to push {branch} to {remote}"))?;
        Ok(())
    }

    /// Create `branch` from `base` checked out in a new worktree at `path`.
    pub async fn add_worktree(&self, path: &Path, branch: &str, base: &str) -> Result<()> {
        let path = path.to_string_lossy();
        self.run(&["worktree", "add", "-b", branch, &path, base])
            .await
            .with_context(|| format!("failed to create worktree {path}"))?;
        Ok(())
    }
}
