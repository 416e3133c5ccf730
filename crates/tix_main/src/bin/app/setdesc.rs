use std::sync::Arc;

use anyhow::{Context, Result, bail};
use console::style;
use inquire::{Confirm, Select};
use tix_domain::{RequestResult, Settings};
use tix_main::{OpenAiClient, create_provider};
use tix_services::{DescriptionContext, IssueDescription, RetrievalConfig};
use tracing::info;

use super::session::branch_session;

fn show(heading: &str, text: &str) {
    println!("\n{}", style(format!("========== {heading} ==========")).bold());
    println!("{text}");
    println!("{}\n", style("=".repeat(heading.len() + 22)).bold());
}

fn confirm(message: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    Ok(Confirm::new(message).with_default(true).prompt()?)
}

fn select_request(requests: Vec<RequestResult>, noun: &str) -> Result<RequestResult> {
    if requests.len() == 1 {
        return requests.into_iter().next().context("no open requests");
    }
    let labels: Vec<String> = requests.iter().map(|r| format!("#{}: {}", r.id, r.title)).collect();
    let choice = Select::new(&format!("Select a {noun}"), labels)
        .raw_prompt()
        .with_context(|| format!("{noun} selection cancelled"))?;
    requests.into_iter().nth(choice.index).context("selected request disappeared")
}

pub async fn run(settings: &Settings, force_retrieval: Option<bool>, yes: bool) -> Result<()> {
    let session = branch_session(settings).await?;
    let number = session.target.number;

    let openai = Arc::new(OpenAiClient::from_env(&settings.retrieval)?);
    let descriptions =
        DescriptionContext::new(openai.clone(), openai, RetrievalConfig::from(&settings.retrieval))
            .force_retrieval(force_retrieval);

    let provider = create_provider(session.code_repo)?;
    let noun = provider.kind().request_noun();
    let requests = provider.open_requests_for_issue(number).await?;
    if requests.is_empty() {
        bail!("no open {noun}s found for issue #{number}, run 'tix mr' first");
    }
    let request = select_request(requests, noun)?;

    let diff = provider.request_diff(request.id).await?;
    let context = descriptions.prepare_diff_context(&diff).await?;
    if context.is_retrieved() {
        info!(bytes = diff.len(), "Describing the most relevant diff excerpts");
    }

    println!("Generating {noun} description...");
    let description = descriptions.generate_mr_description(&context).await?;
    show(&format!("{} DESCRIPTION", noun.to_uppercase()), &description);

    if !confirm(&format!("Update {noun} description?"), yes)? {
        println!("Description update canceled.");
        return Ok(());
    }
    provider.update_request_description(request.id, &description).await?;
    println!("Updated {noun}: {}", style(&request.url).cyan());

    let issue_provider = if session.target.cross_repo {
        create_provider(session.target.repo)?
    } else {
        provider
    };
    let issue = issue_provider.get_issue(number).await?;

    println!("Generating issue description...");
    let IssueDescription { title, body } =
        descriptions.generate_issue_description(&context, &issue.title).await?;
    let title = title.filter(|t| *t != issue.title);

    let preview = match &title {
        Some(title) => format!("Title: {title}\n\n{body}"),
        None => body.clone(),
    };
    show("ISSUE DESCRIPTION", &preview);

    if !confirm("Update issue description?", yes)? {
        println!("Issue description update canceled.");
        return Ok(());
    }
    issue_provider.update_issue_description(number, &body).await?;
    if let Some(title) = title {
        issue_provider.update_issue_title(number, &title).await?;
    }
    println!("Updated issue: {}", style(&issue.url).cyan());
    Ok(())
}
