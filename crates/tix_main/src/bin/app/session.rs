//! Repository selection and branch helpers shared by the commands

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use console::style;
use inquire::Select;
use tix_domain::{Repository, Settings};
use tix_main::{Git, IssueTarget, resolve_issue_target};
use tracing::{info, warn};

pub fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("failed to determine current directory")
}

/// Prompt for one of `candidates`, with the cursor starting on `default`.
pub fn choose_repo<'a>(
    message: &str,
    candidates: &[&'a Repository],
    default: Option<&Repository>,
) -> Result<&'a Repository> {
    match candidates {
        [] => bail!("no repositories configured - add repositories to your config file"),
        [only] => Ok(*only),
        _ => {
            let names: Vec<&str> = candidates.iter().map(|r| r.name.as_str()).collect();
            let cursor = default
                .and_then(|d| candidates.iter().position(|r| r.name == d.name))
                .unwrap_or_default();
            let choice = Select::new(message, names)
                .with_starting_cursor(cursor)
                .raw_prompt()
                .context("repository selection cancelled")?;
            Ok(candidates[choice.index])
        }
    }
}

/// The code repository containing the current directory, or one picked by the
/// user when the directory is outside every configured checkout.
pub fn current_code_repo(settings: &Settings) -> Result<&Repository> {
    let cwd = current_dir()?;
    if let Some(repo) = settings.repo_for_dir(&cwd) {
        info!(repo = %repo.name, directory = %repo.directory, "Found matching repository");
        return Ok(repo);
    }

    let code_repos: Vec<&Repository> =
        settings.repositories.iter().filter(|r| r.is_code_repo()).collect();
    if code_repos.is_empty() {
        bail!("no code repositories configured (repositories with a `directory`)");
    }
    choose_repo("Select a code repository", &code_repos, None)
}

pub async fn ensure_clean(git: &Git) -> Result<()> {
    if !git.is_clean().await? {
        bail!("git repository has uncommitted changes - commit or stash them first");
    }
    Ok(())
}

/// Check out `branch` in the code repository, or add it as a worktree next
/// to the checkout when worktrees are enabled.
pub async fn create_work_branch(repo: &Repository, git: &Git, branch: &str) -> Result<()> {
    if repo.worktree.enabled {
        let path = repo.directory_path().join(branch);
        git.add_worktree(&path, branch, repo.worktree_base()).await?;
        println!("Created worktree: {} in {}", style(branch).green(), path.display());
    } else {
        git.create_branch(branch).await?;
        println!("Created and checked out branch: {}", style(branch).green());
    }
    Ok(())
}

pub fn open_in_browser(url: &str) {
    if let Err(e) = open::that(url) {
        warn!(error = %e, url, "Failed to open browser");
    }
}

/// Code repository, git handle and issue target for the checked-out branch.
pub struct BranchSession<'a> {
    pub code_repo: &'a Repository,
    pub git: Git,
    pub branch: String,
    pub target: IssueTarget<'a>,
}

pub async fn branch_session(settings: &Settings) -> Result<BranchSession<'_>> {
    let code_repo = current_code_repo(settings)?;
    code_repo.provider_kind()?;

    let git = Git::new(code_repo.directory_path());
    let branch = git
        .current_branch()
        .await
        .context("failed to determine current git branch")?;
    let target = resolve_issue_target(settings, code_repo, &branch)?;
    info!(branch = %branch, issue = target.number, repo = %target.repo.name, "Working on issue");

    Ok(BranchSession { code_repo, git, branch, target })
}
