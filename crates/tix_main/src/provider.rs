//! Choosing the provider and issue repository for a command

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tix_domain::{ProviderKind, Repository, ScmProvider, Settings};
use tix_services::workflow::extract_issue_info;
use tracing::info;

use crate::github::GitHubProvider;
use crate::gitlab::GitLabProvider;

/// Build the provider serving `repo`, with its token read from the environment.
pub fn create_provider(repo: &Repository) -> Result<Arc<dyn ScmProvider>> {
    let path = repo.remote_path()?;
    let provider: Arc<dyn ScmProvider> = match repo.provider_kind()? {
        ProviderKind::GitHub => Arc::new(
            GitHubProvider::from_env(path)
                .context("failed to create GitHub provider, check your GITHUB_TOKEN")?,
        ),
        ProviderKind::GitLab => Arc::new(
            GitLabProvider::from_env(path)
                .context("failed to create GitLab provider, check your GITLAB_TOKEN")?,
        ),
    };
    Ok(provider)
}

/// The issue a branch works on and the repository that holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueTarget<'a> {
    pub repo: &'a Repository,
    pub number: u64,
    /// The issue lives in a different repository than the code.
    pub cross_repo: bool,
}

/// Resolve the issue behind `branch` in `code_repo`. A `project-N-...` branch
/// names another configured repository, which must use the same provider.
pub fn resolve_issue_target<'a>(
    settings: &'a Settings,
    code_repo: &'a Repository,
    branch: &str,
) -> Result<IssueTarget<'a>> {
    let (project, number) = extract_issue_info(branch)
        .with_context(|| format!("failed to extract issue number from branch '{branch}'"))?;

    let Some(project) = project.filter(|p| *p != code_repo.name) else {
        return Ok(IssueTarget { repo: code_repo, number, cross_repo: false });
    };

    let Some(issue_repo) = settings.repo(&project) else {
        bail!("repository '{project}' not found in config");
    };
    if issue_repo.provider_kind()? != code_repo.provider_kind()? {
        bail!(
            "issue repo '{project}' and code repo '{}' must use the same provider",
            code_repo.name
        );
    }

    info!(code_repo = %code_repo.name, issue_repo = %project, "Cross-repo issue");
    Ok(IssueTarget { repo: issue_repo, number, cross_repo: true })
}
