//! tix - issue-driven git workflow for GitHub and GitLab

pub mod config;
pub mod git;
pub mod github;
pub mod gitlab;
pub mod logging;
pub mod openai;
pub mod provider;
mod rest;

pub use self::config::{DEFAULT_CONFIG_PATH, load_settings};
pub use git::Git;
pub use github::GitHubProvider;
pub use gitlab::GitLabProvider;
pub use logging::LoggingConfig;
pub use openai::OpenAiClient;
pub use provider::{IssueTarget, create_provider, resolve_issue_target};
