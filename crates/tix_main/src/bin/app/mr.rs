use anyhow::{Context, Result};
use console::style;
use tix_domain::{MergeRequestParams, Settings};
use tix_main::create_provider;
use tix_services::workflow::{find_request_for_branch, request_title};
use tracing::{info, warn};

use super::session::{branch_session, ensure_clean, open_in_browser};

const EXISTING_REQUEST: &str = "already exists for this branch";

pub async fn run(settings: &Settings, draft: bool, remote: &str) -> Result<()> {
    let session = branch_session(settings).await?;
    ensure_clean(&session.git).await?;

    let provider = create_provider(session.code_repo)?;
    let noun = provider.kind().request_noun();
    let number = session.target.number;

    match provider.open_requests_for_issue(number).await {
        Ok(requests) => {
            if let Some(existing) = find_request_for_branch(&requests, &session.branch) {
                println!("a {noun} already exists for this branch.\nView existing {noun}: {}", existing.url);
                return Ok(());
            }
        }
        Err(e) => warn!(error = %e, "Failed to check for existing requests"),
    }

    info!(branch = %session.branch, remote, "Pushing branch");
    session.git.push(remote, &session.branch).await.with_context(|| {
        format!(
            "failed to push branch '{}' to remote '{remote}' - check network or permissions",
            session.branch
        )
    })?;

    let issue_provider = if session.target.cross_repo {
        create_provider(session.target.repo)?
    } else {
        provider.clone()
    };
    let issue = issue_provider
        .get_issue(number)
        .await
        .with_context(|| format!("issue #{number} not found - check if it exists"))?;

    let mut params = MergeRequestParams::default()
        .title(request_title(number, &issue.title))
        .source_branch(session.branch.as_str())
        .target_branch(session.code_repo.target_branch())
        .issue_number(number)
        .is_draft(draft)
        .labels(issue.labels.clone())
        .remove_source_branch(true);
    if let Some(milestone) = issue.milestone_id {
        params = params.milestone_id(milestone);
    }
    if session.target.cross_repo {
        params = params.issue_ref(issue_provider.cross_repo_issue_ref(number));
    }

    let request = match provider.create_request(&params).await {
        Ok(request) => request,
        Err(e) if e.to_string().contains(EXISTING_REQUEST) => {
            println!("{e}");
            return Ok(());
        }
        Err(e) => return Err(e.context(format!("failed to create {noun}"))),
    };

    println!("Created {noun}: {}", style(&request.url).cyan());
    open_in_browser(&request.url);
    Ok(())
}
