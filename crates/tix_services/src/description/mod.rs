//! AI-written merge request and issue descriptions

mod prompts;

use std::sync::Arc;

use derive_setters::Setters;
use tix_domain::{CompletionModel, Embedder, Error, Result};
use tracing::info;

pub use self::prompts::SYSTEM_INSTRUCTIONS;
use crate::retrieval::{RetrievalConfig, Retriever};

/// What the language model gets to see of a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffContext {
    /// The diff itself.
    Full(String),
    /// Annotated excerpts chosen by retrieval.
    Excerpts(String),
}

impl DiffContext {
    pub fn is_retrieved(&self) -> bool {
        matches!(self, Self::Excerpts(_))
    }
}

/// A generated issue description with the title the model proposed, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDescription {
    pub title: Option<String>,
    pub body: String,
}

/// Split a leading `## <title>` line off `text`.
///
/// Returns `(title, body)`. Without the heading the title is empty and the body
/// is `text` untouched.
pub fn parse_title(text: &str) -> (String, String) {
    if !text.starts_with("## ") {
        return (String::new(), text.to_string());
    }

    let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
    let title = first.strip_prefix("## ").unwrap_or(first).trim().to_string();
    (title, rest.trim().to_string())
}

/// Everything description generation needs, built once per command.
#[derive(Clone, Setters)]
pub struct DescriptionContext {
    #[setters(skip)]
    retriever: Retriever,
    #[setters(skip)]
    completion: Arc<dyn CompletionModel>,
    /// Forces retrieval on or off regardless of diff size.
    force_retrieval: Option<bool>,
}

impl DescriptionContext {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn CompletionModel>,
        config: RetrievalConfig,
    ) -> Self {
        Self { retriever: Retriever::new(embedder, config), completion, force_retrieval: None }
    }

    /// Decide how the diff is shown to the model, running retrieval when it
    /// is too large to send whole.
    pub async fn prepare_diff_context(&self, diff: &str) -> Result<DiffContext> {
        if !self.retriever.should_use_retrieval(diff, self.force_retrieval) {
            info!(bytes = diff.len(), "Using full diff");
            return Ok(DiffContext::Full(diff.to_string()));
        }

        info!(bytes = diff.len(), forced = ?self.force_retrieval, "Using retrieval for diff");
        self.retriever.retrieve(diff).await.map(DiffContext::Excerpts)
    }

    pub async fn generate_mr_description(&self, diff: &DiffContext) -> Result<String> {
        self.complete(&prompts::merge_request(diff)).await
    }

    pub async fn generate_issue_description(
        &self,
        diff: &DiffContext,
        current_title: &str,
    ) -> Result<IssueDescription> {
        let text = self.complete(&prompts::issue(diff, current_title)).await?;
        let (title, body) = parse_title(&text);
        Ok(IssueDescription { title: Some(title).filter(|t| !t.is_empty()), body })
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let name = self.completion.name();
        let response = self
            .completion
            .complete(SYSTEM_INSTRUCTIONS, prompt)
            .await
            .map_err(|e| Error::completion_provider_with_source(format!("{name} request failed"), e))?;

        response
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| Error::no_response(format!("{name} returned no message")))
    }
}
