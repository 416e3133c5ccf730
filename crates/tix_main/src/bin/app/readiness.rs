use std::sync::Arc;

use anyhow::Result;
use tix_domain::{ScmProvider, Settings};
use tix_main::create_provider;
use tix_services::workflow::ReadinessChange;
use tracing::{info, warn};

use super::session::branch_session;

async fn apply(provider: Arc<dyn ScmProvider>, number: u64, change: &ReadinessChange) -> Result<()> {
    if let Some(label) = &change.remove_label {
        provider.remove_labels(number, std::slice::from_ref(label)).await?;
        println!("Removed label '{label}' from issue #{number}");
    }
    if let Some(label) = &change.add_label {
        provider.add_labels(number, std::slice::from_ref(label)).await?;
        println!("Added label '{label}' to issue #{number}");
    }
    if let Some(status) = &change.status {
        match provider.update_issue_status(number, status).await {
            Ok(()) => info!(issue = number, status = %status, "Issue status updated"),
            Err(e) => warn!(error = %e, issue = number, "Failed to update issue status"),
        }
    }
    Ok(())
}

pub async fn ready(settings: &Settings, label: Option<&str>, status: Option<&str>) -> Result<()> {
    let session = branch_session(settings).await?;
    let repo = session.target.repo;

    let change = ReadinessChange::ready(settings, repo, label, status);
    if change.is_noop() {
        println!("No ready label or status configured for '{}', nothing to do.", repo.name);
        return Ok(());
    }

    apply(create_provider(repo)?, session.target.number, &change).await
}

pub async fn unready(
    settings: &Settings,
    ready_label: Option<&str>,
    unready_label: Option<&str>,
    status: Option<&str>,
) -> Result<()> {
    let session = branch_session(settings).await?;
    let repo = session.target.repo;

    let change = ReadinessChange::unready(settings, repo, ready_label, unready_label, status);
    if change.is_noop() {
        println!("No ready label or unready status configured for '{}', nothing to do.", repo.name);
        return Ok(());
    }

    apply(create_provider(repo)?, session.target.number, &change).await
}
