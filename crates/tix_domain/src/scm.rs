//! Contracts for the source-control hosting services tix talks to

use anyhow::Result;
use async_trait::async_trait;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    GitHub,
    GitLab,
}

impl ProviderKind {
    /// Name used for change requests on this provider
    pub fn request_noun(&self) -> &'static str {
        match self {
            Self::GitHub => "pull request",
            Self::GitLab => "merge request",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Setters)]
#[setters(strip_option, into)]
pub struct IssueParams {
    pub title: String,
    pub labels: Vec<String>,
    pub self_assign: bool,
    /// Milestone title; only GitLab honours it.
    pub milestone: Option<String>,
}

impl IssueParams {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Default::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueResult {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub labels: Vec<String>,
    pub milestone_id: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Setters)]
#[setters(strip_option, into)]
pub struct MergeRequestParams {
    pub title: String,
    pub source_branch: String,
    pub target_branch: String,
    pub issue_number: u64,
    /// Reference used in place of `#N` when the issue lives in another repository.
    pub issue_ref: Option<String>,
    pub is_draft: bool,
    pub labels: Vec<String>,
    pub milestone_id: Option<u64>,
    pub remove_source_branch: bool,
    pub squash: bool,
}

impl MergeRequestParams {
    /// The line that links the request to its issue.
    pub fn closing_reference(&self) -> String {
        match &self.issue_ref {
            Some(reference) => format!("Closes {reference}"),
            None => format!("Closes #{}", self.issue_number),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestResult {
    pub id: u64,
    pub title: String,
    pub url: String,
    pub is_draft: bool,
}

/// Operations tix needs from an issue tracker with merge/pull requests.
#[async_trait]
pub trait ScmProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn create_issue(&self, params: &IssueParams) -> Result<IssueResult>;

    async fn get_issue(&self, number: u64) -> Result<IssueResult>;

    /// Open requests whose description references `#number`.
    async fn open_requests_for_issue(&self, number: u64) -> Result<Vec<RequestResult>>;

    async fn create_request(&self, params: &MergeRequestParams) -> Result<RequestResult>;

    /// Unified diff of a request.
    async fn request_diff(&self, id: u64) -> Result<String>;

    /// Replace a request description, keeping its issue-closing line.
    async fn update_request_description(&self, id: u64, description: &str) -> Result<()>;

    async fn update_issue_description(&self, number: u64, description: &str) -> Result<()>;

    async fn update_issue_title(&self, number: u64, title: &str) -> Result<()>;

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<()>;

    async fn remove_labels(&self, number: u64, labels: &[String]) -> Result<()>;

    /// Set the workflow status of an issue. Providers without statuses do nothing.
    async fn update_issue_status(&self, number: u64, status: &str) -> Result<()>;

    /// Resolve a milestone title to its id, creating it where the provider
    /// supports that. Providers without milestones return `None`.
    async fn resolve_milestone(&self, title: &str) -> Result<Option<u64>>;

    /// Web URL of the repository.
    fn repo_url(&self) -> String;

    /// Reference to an issue of this repository usable from another repository.
    fn cross_repo_issue_ref(&self, number: u64) -> String;
}
