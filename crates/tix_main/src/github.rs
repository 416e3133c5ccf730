//! GitHub REST provider

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::json;
use tix_domain::{
    IssueParams, IssueResult, MergeRequestParams, ProviderKind, RequestResult, ScmProvider,
};
use tix_services::workflow::{find_request_for_branch, preserve_issue_reference};
use tracing::{debug, info, warn};

use crate::rest::RestClient;

pub const API_URL: &str = "https://api.github.com";
pub const WEB_URL: &str = "https://github.com";

const CLOSING_PREFIXES: [&str; 3] = ["Closes #", "Fixes #", "Resolves #"];

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Label {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Milestone {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct Issue {
    number: u64,
    title: String,
    html_url: String,
    #[serde(default)]
    labels: Vec<Label>,
    milestone: Option<Milestone>,
}

impl From<Issue> for IssueResult {
    fn from(issue: Issue) -> Self {
        Self {
            number: issue.number,
            title: issue.title,
            url: issue.html_url,
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            milestone_id: issue.milestone.map(|m| m.number),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    number: u64,
    title: String,
    html_url: String,
    body: Option<String>,
    #[serde(default)]
    draft: bool,
}

impl From<PullRequest> for RequestResult {
    fn from(pr: PullRequest) -> Self {
        Self { id: pr.number, title: pr.title, url: pr.html_url, is_draft: pr.draft }
    }
}

pub struct GitHubProvider {
    client: RestClient,
    owner: String,
    repo: String,
    web_url: String,
}

impl GitHubProvider {
    /// Provider for `owner/repo`, authenticated with `GITHUB_TOKEN`.
    pub fn from_env(repo: &str) -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .context("GITHUB_TOKEN environment variable is required")?;
        Self::new(repo, token, API_URL, WEB_URL)
    }

    pub fn new(repo: &str, token: String, api_url: &str, web_url: &str) -> Result<Self> {
        let (owner, name) = match repo.split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => {
                (owner.to_string(), name.to_string())
            }
            _ => bail!("invalid GitHub repository '{repo}', expected owner/repo"),
        };

        Ok(Self {
            client: RestClient::new("GitHub", api_url, token)?,
            owner,
            repo: name,
            web_url: web_url.trim_end_matches('/').to_string(),
        })
    }

    fn repo_segments<'a>(&'a self, rest: &[&'a str]) -> Vec<&'a str> {
        let mut segments = vec!["repos", self.owner.as_str(), self.repo.as_str()];
        segments.extend_from_slice(rest);
        segments
    }

    async fn current_user(&self) -> Result<User> {
        self.client.get(&["user"], &[]).await.context("failed to get current user")
    }

    async fn get_pull(&self, number: u64) -> Result<PullRequest> {
        let number = number.to_string();
        self.client
            .get(&self.repo_segments(&["pulls", &number]), &[])
            .await
            .with_context(|| format!("failed to get pull request #{number}"))
    }

    async fn patch_issue(&self, number: u64, body: serde_json::Value) -> Result<()> {
        let number = number.to_string();
        let _: Issue = self
            .client
            .send_json(Method::PATCH, &self.repo_segments(&["issues", &number]), &body)
            .await
            .with_context(|| format!("failed to update issue #{number}"))?;
        Ok(())
    }
}

#[async_trait]
impl ScmProvider for GitHubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    async fn create_issue(&self, params: &IssueParams) -> Result<IssueResult> {
        let mut body = json!({ "title": params.title, "labels": params.labels });
        if params.self_assign {
            body["assignees"] = json!([self.current_user().await?.login]);
        }

        let issue: Issue = self
            .client
            .send_json(Method::POST, &self.repo_segments(&["issues"]), &body)
            .await
            .context("failed to create issue")?;
        info!(number = issue.number, "Created GitHub issue");
        Ok(issue.into())
    }

    async fn get_issue(&self, number: u64) -> Result<IssueResult> {
        let path = number.to_string();
        let issue: Issue = self
            .client
            .get(&self.repo_segments(&["issues", &path]), &[])
            .await
            .with_context(|| format!("failed to get issue #{number}"))?;
        Ok(issue.into())
    }

    async fn open_requests_for_issue(&self, number: u64) -> Result<Vec<RequestResult>> {
        let pulls: Vec<PullRequest> = self
            .client
            .get(&self.repo_segments(&["pulls"]), &[("state", "open"), ("per_page", "100")])
            .await
            .context("failed to list pull requests")?;

        let reference = format!("#{number}");
        Ok(pulls
            .into_iter()
            .filter(|pr| pr.body.as_deref().is_some_and(|b| b.contains(&reference)))
            .map(RequestResult::from)
            .collect())
    }

    async fn create_request(&self, params: &MergeRequestParams) -> Result<RequestResult> {
        let body = json!({
            "title": params.title,
            "head": params.source_branch,
            "base": params.target_branch,
            "body": params.closing_reference(),
            "draft": params.is_draft,
            "maintainer_can_modify": true,
        });

        let created: Result<PullRequest> = self
            .client
            .send_json(Method::POST, &self.repo_segments(&["pulls"]), &body)
            .await;

        let pr = match created {
            Ok(pr) => pr,
            Err(e) if e.to_string().contains("pull request already exists") => {
                let existing = self.open_requests_for_issue(params.issue_number).await.unwrap_or_default();
                match find_request_for_branch(&existing, &params.source_branch) {
                    Some(pr) => bail!(
                        "a pull request already exists for this branch.\nView existing pull request: {}",
                        pr.url
                    ),
                    None => bail!(
                        "a pull request already exists for this branch.\nView your pull requests: {}/pulls",
                        self.repo_url()
                    ),
                }
            }
            Err(e) => return Err(e.context("failed to create pull request")),
        };

        if !params.labels.is_empty() {
            if let Err(e) = self.add_labels(pr.number, &params.labels).await {
                warn!(error = %e, pr = pr.number, "Failed to apply labels to pull request");
            }
        }

        info!(number = pr.number, draft = pr.draft, "Created GitHub pull request");
        Ok(pr.into())
    }

    async fn request_diff(&self, id: u64) -> Result<String> {
        let number = id.to_string();
        let url = self.client.url(&self.repo_segments(&["pulls", &number]))?;
        let request = self
            .client
            .request(Method::GET, url)
            .header(ACCEPT, "application/vnd.github.v3.diff");

        let diff = self
            .client
            .send(request)
            .await
            .with_context(|| format!("failed to get diff of pull request #{id}"))?
            .text()
            .await?;
        debug!(pr = id, bytes = diff.len(), "Fetched pull request diff");
        Ok(diff)
    }

    async fn update_request_description(&self, id: u64, description: &str) -> Result<()> {
        let existing = self.get_pull(id).await?;
        let body = preserve_issue_reference(
            existing.body.as_deref().unwrap_or_default(),
            description,
            &CLOSING_PREFIXES,
        );

        let number = id.to_string();
        let _: PullRequest = self
            .client
            .send_json(
                Method::PATCH,
                &self.repo_segments(&["pulls", &number]),
                &json!({ "body": body }),
            )
            .await
            .with_context(|| format!("failed to update pull request #{id}"))?;
        Ok(())
    }

    async fn update_issue_description(&self, number: u64, description: &str) -> Result<()> {
        self.patch_issue(number, json!({ "body": description })).await
    }

    async fn update_issue_title(&self, number: u64, title: &str) -> Result<()> {
        self.patch_issue(number, json!({ "title": title })).await
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        let number = number.to_string();
        let _: Vec<Label> = self
            .client
            .send_json(
                Method::POST,
                &self.repo_segments(&["issues", &number, "labels"]),
                &json!({ "labels": labels }),
            )
            .await
            .with_context(|| format!("failed to add labels to #{number}"))?;
        Ok(())
    }

    async fn remove_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        let issue = number.to_string();
        for label in labels {
            let url = self.client.url(&self.repo_segments(&["issues", &issue, "labels", label]))?;
            let response = self
                .client
                .request(Method::DELETE, url)
                .send()
                .await
                .with_context(|| format!("failed to remove label '{label}' from #{number}"))?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                debug!(label = %label, issue = number, "Label was not set");
            } else if !status.is_success() {
                bail!("failed to remove label '{label}' from #{number} ({status})");
            }
        }
        Ok(())
    }

    async fn update_issue_status(&self, number: u64, status: &str) -> Result<()> {
        debug!(issue = number, status, "GitHub issues have no status, skipping");
        Ok(())
    }

    async fn resolve_milestone(&self, _title: &str) -> Result<Option<u64>> {
        Ok(None)
    }

    fn repo_url(&self) -> String {
        format!("{}/{}/{}", self.web_url, self.owner, self.repo)
    }

    fn cross_repo_issue_ref(&self, number: u64) -> String {
        format!("{}/{}#{number}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use pretty_assertions::assert_eq;

    use super::*;

    fn provider(server: &mockito::Server) -> GitHubProvider {
        GitHubProvider::new("acme/api", "ghp_test".into(), &server.url(), WEB_URL).unwrap()
    }

    #[test]
    fn test_new_requires_owner_and_repo() {
        for repo in ["acme", "acme/api/extra", "/api", ""] {
            let actual = GitHubProvider::new(repo, "t".into(), API_URL, WEB_URL);
            assert!(actual.is_err(), "repo: {repo:?}");
        }
    }

    #[test]
    fn test_urls_and_references() {
        let fixture = GitHubProvider::new("acme/api", "t".into(), API_URL, WEB_URL).unwrap();

        assert_eq!(fixture.repo_url(), "https://github.com/acme/api");
        assert_eq!(fixture.cross_repo_issue_ref(9), "acme/api#9");
    }

    #[tokio::test]
    async fn test_create_issue_self_assigns() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/user")
            .with_status(200)
            .with_body(r#"{"login": "octocat"}"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/repos/acme/api/issues")
            .match_header("authorization", "Bearer ghp_test")
            .match_body(Matcher::Json(serde_json::json!({
                "title": "Add retries",
                "labels": ["backend"],
                "assignees": ["octocat"]
            })))
            .with_status(201)
            .with_body(
                r#"{"number": 12, "title": "Add retries", "html_url": "https://github.com/acme/api/issues/12",
                    "labels": [{"name": "backend"}], "milestone": null}"#,
            )
            .create_async()
            .await;
        let fixture = provider(&server);

        let actual = fixture
            .create_issue(&IssueParams::new("Add retries").labels(vec!["backend".to_string()]).self_assign(true))
            .await
            .unwrap();

        create.assert_async().await;
        let expected = IssueResult {
            number: 12,
            title: "Add retries".into(),
            url: "https://github.com/acme/api/issues/12".into(),
            labels: vec!["backend".into()],
            milestone_id: None,
        };
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_open_requests_for_issue_filters_by_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/api/pulls")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("state".into(), "open".into()),
                Matcher::UrlEncoded("per_page".into(), "100".into()),
            ]))
            .with_status(200)
            .with_body(
                r##"[
                    {"number": 1, "title": "#12 - Add retries", "html_url": "u1", "body": "Closes #12", "draft": true},
                    {"number": 2, "title": "Other", "html_url": "u2", "body": "Closes #3", "draft": false},
                    {"number": 3, "title": "No body", "html_url": "u3", "body": null}
                ]"##,
            )
            .create_async()
            .await;
        let fixture = provider(&server);

        let actual = fixture.open_requests_for_issue(12).await.unwrap();

        let expected = vec![RequestResult {
            id: 1,
            title: "#12 - Add retries".into(),
            url: "u1".into(),
            is_draft: true,
        }];
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_request_diff_uses_diff_media_type() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/api/pulls/4")
            .match_header("accept", "application/vnd.github.v3.diff")
            .with_status(200)
            .with_body("diff --git a/x b/x\n")
            .create_async()
            .await;
        let fixture = provider(&server);

        let actual = fixture.request_diff(4).await.unwrap();

        assert_eq!(actual, "diff --git a/x b/x\n");
    }

    #[tokio::test]
    async fn test_update_request_description_keeps_closing_line() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/api/pulls/4")
            .with_status(200)
            .with_body(r#"{"number": 4, "title": "t", "html_url": "u", "body": "Closes #12"}"#)
            .create_async()
            .await;
        let update = server
            .mock("PATCH", "/repos/acme/api/pulls/4")
            .match_body(Matcher::Json(serde_json::json!({"body": "Closes #12\n\n### Summary"})))
            .with_status(200)
            .with_body(r#"{"number": 4, "title": "t", "html_url": "u", "body": "Closes #12\n\n### Summary"}"#)
            .create_async()
            .await;
        let fixture = provider(&server);

        fixture.update_request_description(4, "### Summary").await.unwrap();

        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_request_reports_existing_pull_request() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/repos/acme/api/pulls")
            .with_status(422)
            .with_body(r#"{"message": "Validation Failed", "errors": [{"message": "A pull request already exists for acme:12-add-retries."}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/acme/api/pulls")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[]"#)
            .create_async()
            .await;
        let fixture = provider(&server);
        let params = MergeRequestParams::default()
            .title("#12 - Add retries")
            .source_branch("12-add-retries")
            .target_branch("main")
            .issue_number(12u64);

        let actual = fixture.create_request(&params).await.unwrap_err().to_string();

        assert_eq!(
            actual,
            "a pull request already exists for this branch.\nView your pull requests: https://github.com/acme/api/pulls"
        );
    }

    #[tokio::test]
    async fn test_remove_labels_ignores_missing_label() {
        let mut server = mockito::Server::new_async().await;
        let delete = server
            .mock("DELETE", "/repos/acme/api/issues/5/labels/ready%20for%20review")
            .with_status(404)
            .create_async()
            .await;
        let fixture = provider(&server);

        fixture.remove_labels(5, &["ready for review".to_string()]).await.unwrap();

        delete.assert_async().await;
    }
}
