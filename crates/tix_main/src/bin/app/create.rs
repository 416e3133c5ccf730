use anyhow::{Context, Result, bail};
use chrono::Local;
use console::style;
use inquire::{Text, max_length, required};
use tix_domain::{IssueParams, ProviderKind, Settings};
use tix_main::{Git, create_provider};
use tix_services::workflow::{branch_name, generate_milestone, split_labels};
use tracing::info;

use super::session::{choose_repo, create_work_branch, current_dir, ensure_clean};

const MAX_TITLE_LEN: usize = 255;

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        bail!("title must not be empty");
    }
    if title.chars().count() > MAX_TITLE_LEN {
        bail!("title must be at most {MAX_TITLE_LEN} characters");
    }
    Ok(())
}

pub async fn run(settings: &Settings, title: Option<&str>, self_assign: bool) -> Result<()> {
    let cwd = current_dir()?;
    let candidates: Vec<_> = settings.repositories.iter().collect();
    let repo = choose_repo("Select a repository", &candidates, settings.repo_for_dir(&cwd))?;
    let kind = repo.provider_kind()?;

    let git = repo.is_code_repo().then(|| Git::new(repo.directory_path()));
    if let Some(git) = &git {
        ensure_clean(git).await?;
    }

    let title = match title {
        Some(title) => {
            validate_title(title)?;
            println!("Using title: {title}");
            title.to_string()
        }
        None => Text::new("Title of issue:")
            .with_validator(required!())
            .with_validator(max_length!(MAX_TITLE_LEN))
            .prompt()
            .context("issue creation cancelled")?,
    };

    let labels = Text::new("Labels (comma separated):")
        .with_default(repo.default_labels())
        .prompt()
        .context("issue creation cancelled")?;

    let mut params = IssueParams::new(title).labels(split_labels(&labels)).self_assign(self_assign);
    if kind == ProviderKind::GitLab {
        let default = generate_milestone(&Local::now().date_naive());
        let milestone = Text::new("Milestone:")
            .with_default(&default)
            .prompt()
            .context("issue creation cancelled")?;
        if !milestone.trim().is_empty() {
            params = params.milestone(milestone.trim());
        }
    }

    let provider = create_provider(repo)?;
    let issue = provider.create_issue(&params).await?;
    info!(number = issue.number, repo = %repo.name, "Issue created");
    println!("Created issue #{}: {}", issue.number, issue.title);

    if let Some(git) = &git {
        let branch = branch_name(issue.number, &issue.title, None);
        create_work_branch(repo, git, &branch).await.context(
            "the issue was created but its branch could not be created",
        )?;
    }

    println!("Issue: {}", style(&issue.url).cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_title() {
        assert!(validate_title("Add retries").is_ok());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LEN)).is_ok());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LEN + 1)).is_err());
    }
}
