//! User settings read from the tix YAML file

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::ProviderKind;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ready_label: Option<String>,
    pub ready_status: Option<String>,
    pub unready_label: Option<String>,
    pub unready_status: Option<String>,
    pub retrieval: RetrievalSettings,
    pub repositories: Vec<Repository>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub name: String,
    /// Local checkout. Repositories without one only track issues.
    pub directory: String,
    /// Comma separated labels offered when creating issues.
    pub default_labels: Option<String>,
    pub ready_label: Option<String>,
    pub ready_status: Option<String>,
    pub unready_label: Option<String>,
    pub unready_status: Option<String>,
    pub github_repo: Option<String>,
    pub gitlab_repo: Option<String>,
    pub default_branch: Option<String>,
    pub worktree: Worktree,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Worktree {
    pub enabled: bool,
    pub default_branch: Option<String>,
}

/// Knobs for AI-generated descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Estimated token count at which a diff is retrieved from instead of
    /// being sent whole.
    pub token_threshold: usize,
    pub top_k: usize,
    pub batch_size: usize,
    pub embedding_model: String,
    pub completion_model: String,
    pub openai_base_url: String,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            token_threshold: 50_000,
            top_k: 15,
            batch_size: 50,
            embedding_model: "text-embedding-3-small".to_string(),
            completion_model: "gpt-4o".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl Repository {
    pub fn is_code_repo(&self) -> bool {
        !self.directory.is_empty()
    }

    pub fn directory_path(&self) -> PathBuf {
        expand_home(&self.directory)
    }

    /// The hosting provider, which must be exactly one of GitHub or GitLab.
    pub fn provider_kind(&self) -> Result<ProviderKind> {
        match (non_empty(&self.github_repo), non_empty(&self.gitlab_repo)) {
            (Some(_), None) => Ok(ProviderKind::GitHub),
            (None, Some(_)) => Ok(ProviderKind::GitLab),
            _ => bail!(
                "repository '{}' must have exactly one of github_repo or gitlab_repo",
                self.name
            ),
        }
    }

    /// `owner/repo` or `group/project` path on the provider.
    pub fn remote_path(&self) -> Result<&str> {
        let path = match self.provider_kind()? {
            ProviderKind::GitHub => non_empty(&self.github_repo),
            ProviderKind::GitLab => non_empty(&self.gitlab_repo),
        };
        path.ok_or_else(|| anyhow::anyhow!("repository '{}' has no remote path", self.name))
    }

    /// Branch new requests target.
    pub fn target_branch(&self) -> &str {
        non_empty(&self.default_branch).unwrap_or("main")
    }

    /// Branch new worktrees start from.
    pub fn worktree_base(&self) -> &str {
        non_empty(&self.worktree.default_branch).unwrap_or_else(|| self.target_branch())
    }

    pub fn default_labels(&self) -> &str {
        non_empty(&self.default_labels).unwrap_or_default()
    }
}

impl Settings {
    pub fn repo_names(&self) -> Vec<&str> {
        self.repositories.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn repo(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// The code repository containing `dir`; the deepest checkout wins when
    /// directories nest.
    pub fn repo_for_dir(&self, dir: &Path) -> Option<&Repository> {
        self.repositories
            .iter()
            .filter(|r| r.is_code_repo())
            .map(|r| (r, r.directory_path()))
            .filter(|(_, path)| dir.starts_with(path))
            .max_by_key(|(_, path)| path.components().count())
            .map(|(r, _)| r)
    }

    /// Rewrite every repository directory with `~/` expanded.
    pub fn expand_directories(&mut self) {
        for repo in self.repositories.iter_mut().filter(|r| r.is_code_repo()) {
            repo.directory = repo.directory_path().to_string_lossy().into_owned();
        }
    }
}
