//! GitLab REST provider

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tix_domain::{
    IssueParams, IssueResult, MergeRequestParams, ProviderKind, RequestResult, ScmProvider,
};
use tix_services::workflow::preserve_issue_reference;
use tracing::{debug, info, warn};

use crate::rest::RestClient;

pub const API_URL: &str = "https://gitlab.com/api/v4";
pub const WEB_URL: &str = "https://gitlab.com";

const REFERENCE_PREFIXES: [&str; 2] = ["Closes #", "Related to #"];
const NO_DIFF_VERSIONS: &str = "no diff versions found for merge request";
const EXISTING_REQUEST_MARKER: &str = "already exists for this source branch: !";
const DIFF_RETRY_DELAY: Duration = Duration::from_secs(1);
const DIFF_RETRY_TIMES: usize = 10;

#[derive(Debug, Deserialize)]
struct User {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct Milestone {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct Namespace {
    id: u64,
    kind: String,
}

#[derive(Debug, Deserialize)]
struct Project {
    namespace: Option<Namespace>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    iid: u64,
    title: String,
    web_url: String,
    #[serde(default)]
    labels: Vec<String>,
    milestone: Option<Milestone>,
}

impl From<Issue> for IssueResult {
    fn from(issue: Issue) -> Self {
        Self {
            number: issue.iid,
            title: issue.title,
            url: issue.web_url,
            labels: issue.labels,
            milestone_id: issue.milestone.map(|m| m.id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    iid: u64,
    title: String,
    web_url: String,
    description: Option<String>,
}

impl MergeRequest {
    fn is_draft(&self) -> bool {
        self.title.starts_with("Draft:") || self.title.starts_with("WIP:")
    }
}

impl From<MergeRequest> for RequestResult {
    fn from(mr: MergeRequest) -> Self {
        let is_draft = mr.is_draft();
        Self { id: mr.iid, title: mr.title, url: mr.web_url, is_draft }
    }
}

#[derive(Debug, Deserialize)]
struct DiffVersion {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct FileDiff {
    old_path: String,
    new_path: String,
    diff: String,
}

#[derive(Debug, Deserialize)]
struct VersionDiffs {
    #[serde(default)]
    diffs: Vec<FileDiff>,
}

/// Render file diffs in unified form with the headers the chunker splits on.
fn render_diffs(diffs: &[FileDiff]) -> String {
    diffs
        .iter()
        .map(|d| {
            format!(
                "diff --git a/{old} b/{new}\n--- a/{old}\n+++ b/{new}\n{diff}\n",
                old = d.old_path,
                new = d.new_path,
                diff = d.diff
            )
        })
        .collect()
}

/// IID of the merge request named in GitLab's "already exists" error.
fn existing_request_iid(error: &str) -> Option<u64> {
    let (_, rest) = error.split_once(EXISTING_REQUEST_MARKER)?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

pub struct GitLabProvider {
    client: RestClient,
    project: String,
    web_url: String,
    retry_delay: Duration,
}

impl GitLabProvider {
    /// Provider for the `group/project` path, authenticated with `GITLAB_TOKEN`.
    pub fn from_env(project: &str) -> Result<Self> {
        let token = std::env::var("GITLAB_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .context("GITLAB_TOKEN environment variable is required")?;
        Self::new(project, token, API_URL, WEB_URL)
    }

    pub fn new(project: &str, token: String, api_url: &str, web_url: &str) -> Result<Self> {
        if project.trim_matches('/').is_empty() {
            bail!("GitLab project path must not be empty");
        }
        Ok(Self {
            client: RestClient::new("GitLab", api_url, token)?,
            project: project.trim_matches('/').to_string(),
            web_url: web_url.trim_end_matches('/').to_string(),
            retry_delay: DIFF_RETRY_DELAY,
        })
    }

    /// Delay between polls while GitLab computes a new merge request's diff.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn project_segments<'a>(&'a self, rest: &[&'a str]) -> Vec<&'a str> {
        let mut segments = vec!["projects", self.project.as_str()];
        segments.extend_from_slice(rest);
        segments
    }

    fn request_url(&self, iid: u64) -> String {
        format!("{}/-/merge_requests/{iid}", self.repo_url())
    }

    async fn current_user(&self) -> Result<User> {
        self.client.get(&["user"], &[]).await.context("failed to get current user")
    }

    async fn find_milestone(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Option<u64>> {
        let milestones: Vec<Milestone> = self.client.get(segments, query).await?;
        Ok(milestones.first().map(|m| m.id))
    }

    async fn put_issue(&self, number: u64, body: serde_json::Value) -> Result<()> {
        let iid = number.to_string();
        let _: Issue = self
            .client
            .send_json(Method::PUT, &self.project_segments(&["issues", &iid]), &body)
            .await
            .with_context(|| format!("failed to update issue #{number}"))?;
        Ok(())
    }

    async fn fetch_diff(&self, iid: &str) -> Result<String> {
        let versions: Vec<DiffVersion> = self
            .client
            .get(&self.project_segments(&["merge_requests", iid, "versions"]), &[])
            .await
            .context("failed to get merge request diff versions")?;

        let Some(latest) = versions.first() else {
            bail!(NO_DIFF_VERSIONS);
        };

        let version = latest.id.to_string();
        let diffs: VersionDiffs = self
            .client
            .get(&self.project_segments(&["merge_requests", iid, "versions", &version]), &[])
            .await
            .context("failed to get merge request diff")?;
        Ok(render_diffs(&diffs.diffs))
    }
}

#[async_trait]
impl ScmProvider for GitLabProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitLab
    }

    async fn create_issue(&self, params: &IssueParams) -> Result<IssueResult> {
        let mut body = json!({ "title": params.title, "labels": params.labels.join(",") });
        if params.self_assign {
            body["assignee_ids"] = json!([self.current_user().await?.id]);
        }
        if let Some(title) = params.milestone.as_deref().filter(|t| !t.is_empty()) {
            let id = self
                .resolve_milestone(title)
                .await
                .context("failed to get milestone ID")?;
            if let Some(id) = id {
                body["milestone_id"] = json!(id);
            }
        }

        let issue: Issue = self
            .client
            .send_json(Method::POST, &self.project_segments(&["issues"]), &body)
            .await
            .context("failed to create issue")?;
        info!(number = issue.iid, "Created GitLab issue");
        Ok(issue.into())
    }

    async fn get_issue(&self, number: u64) -> Result<IssueResult> {
        let iid = number.to_string();
        let issue: Issue = self
            .client
            .get(&self.project_segments(&["issues", &iid]), &[])
            .await
            .with_context(|| format!("failed to get issue #{number}"))?;
        Ok(issue.into())
    }

    async fn open_requests_for_issue(&self, number: u64) -> Result<Vec<RequestResult>> {
        let requests: Vec<MergeRequest> = self
            .client
            .get(&self.project_segments(&["merge_requests"]), &[("state", "opened")])
            .await
            .context("failed to list merge requests")?;

        let reference = format!("#{number}");
        Ok(requests
            .into_iter()
            .filter(|mr| mr.description.as_deref().is_some_and(|d| d.contains(&reference)))
            .map(RequestResult::from)
            .collect())
    }

    async fn create_request(&self, params: &MergeRequestParams) -> Result<RequestResult> {
        let title = if params.is_draft {
            format!("Draft: {}", params.title)
        } else {
            params.title.clone()
        };

        let mut body = json!({
            "title": title,
            "source_branch": params.source_branch,
            "target_branch": params.target_branch,
            "description": params.closing_reference(),
            "remove_source_branch": params.remove_source_branch,
            "squash": params.squash,
        });
        if !params.labels.is_empty() {
            body["labels"] = json!(params.labels.join(","));
        }
        if let Some(id) = params.milestone_id.filter(|id| *id > 0) {
            body["milestone_id"] = json!(id);
        }

        let created: Result<MergeRequest> = self
            .client
            .send_json(Method::POST, &self.project_segments(&["merge_requests"]), &body)
            .await;

        match created {
            Ok(mr) => {
                info!(iid = mr.iid, draft = params.is_draft, "Created GitLab merge request");
                let mut result = RequestResult::from(mr);
                result.is_draft = params.is_draft;
                Ok(result)
            }
            Err(e) => match existing_request_iid(&e.to_string()) {
                Some(iid) => bail!(
                    "a merge request already exists for this branch.\nView existing merge request: {}",
                    self.request_url(iid)
                ),
                None => Err(e.context("failed to create merge request")),
            },
        }
    }

    async fn request_diff(&self, id: u64) -> Result<String> {
        let iid = id.to_string();
        let backoff = ConstantBuilder::default()
            .with_delay(self.retry_delay)
            .with_max_times(DIFF_RETRY_TIMES);

        let diff = (|| self.fetch_diff(&iid))
            .retry(backoff)
            .when(|e| e.to_string() == NO_DIFF_VERSIONS)
            .notify(|_, delay| {
                debug!(mr = id, ?delay, "Merge request diff not ready yet, retrying");
            })
            .await?;
        debug!(mr = id, bytes = diff.len(), "Fetched merge request diff");
        Ok(diff)
    }

    async fn update_request_description(&self, id: u64, description: &str) -> Result<()> {
        let iid = id.to_string();
        let existing: MergeRequest = self
            .client
            .get(&self.project_segments(&["merge_requests", &iid]), &[])
            .await
            .with_context(|| format!("failed to get merge request !{id}"))?;

        let description = preserve_issue_reference(
            existing.description.as_deref().unwrap_or_default(),
            description,
            &REFERENCE_PREFIXES,
        );
        let _: MergeRequest = self
            .client
            .send_json(
                Method::PUT,
                &self.project_segments(&["merge_requests", &iid]),
                &json!({ "description": description }),
            )
            .await
            .with_context(|| format!("failed to update merge request !{id}"))?;
        Ok(())
    }

    async fn update_issue_description(&self, number: u64, description: &str) -> Result<()> {
        self.put_issue(number, json!({ "description": description })).await
    }

    async fn update_issue_title(&self, number: u64, title: &str) -> Result<()> {
        self.put_issue(number, json!({ "title": title })).await
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        self.put_issue(number, json!({ "add_labels": labels.join(",") })).await
    }

    async fn remove_labels(&self, number: u64, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        self.put_issue(number, json!({ "remove_labels": labels.join(",") })).await
    }

    async fn update_issue_status(&self, number: u64, status: &str) -> Result<()> {
        self.add_labels(number, &[format!("status::{status}")]).await
    }

    async fn resolve_milestone(&self, title: &str) -> Result<Option<u64>> {
        if title.is_empty() {
            return Ok(None);
        }

        let project_milestones = self
            .find_milestone(&self.project_segments(&["milestones"]), &[("title", title)])
            .await
            .context("failed to list project milestones")?;
        if let Some(id) = project_milestones {
            debug!(milestone = title, id, "Found project milestone");
            return Ok(Some(id));
        }

        let project: Project = self
            .client
            .get(&self.project_segments(&[]), &[])
            .await
            .context("failed to get project details")?;

        if let Some(namespace) = project.namespace.filter(|ns| ns.kind == "group") {
            let group = namespace.id.to_string();
            let group_milestone = self
                .find_milestone(
                    &["groups", &group, "milestones"],
                    &[("title", title), ("include_ancestors", "true")],
                )
                .await
                .context("failed to list group milestones")?;
            if let Some(id) = group_milestone {
                debug!(milestone = title, id, group = namespace.id, "Found group milestone");
                return Ok(Some(id));
            }
        }

        let created: Milestone = self
            .client
            .send_json(
                Method::POST,
                &self.project_segments(&["milestones"]),
                &json!({ "title": title }),
            )
            .await
            .context("failed to create milestone")?;
        warn!(milestone = title, id = created.id, "Created missing project milestone");
        Ok(Some(created.id))
    }

    fn repo_url(&self) -> String {
        format!("{}/{}", self.web_url, self.project)
    }

    fn cross_repo_issue_ref(&self, number: u64) -> String {
        format!("{}#{number}", self.project)
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use tix_services::chunk_diff;

    use super::*;

    const PROJECT: &str = "/projects/acme%2Fapi";

    fn provider(server: &mockito::Server) -> GitLabProvider {
        GitLabProvider::new("acme/api", "glpat".into(), &server.url(), WEB_URL)
            .unwrap()
            .with_retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_existing_request_iid() {
        let fixture = r#"GitLab API request failed (409 Conflict): {"message":["Another open merge request already exists for this source branch: !17"]}"#;

        assert_eq!(existing_request_iid(fixture), Some(17));
        assert_eq!(existing_request_iid("something else"), None);
    }

    #[test]
    fn test_render_diffs() {
        let fixture = vec![FileDiff {
            old_path: "a.rs".into(),
            new_path: "b.rs".into(),
            diff: "@@ -1 +1 @@\n-x\n+y\n".into(),
        }];

        let actual = render_diffs(&fixture);

        assert_eq!(actual, "diff --git a/a.rs b/b.rs\n--- a/a.rs\n+++ b/b.rs\n@@ -1 +1 @@\n-x\n+y\n\n");
    }

    #[test]
    fn test_rendered_diffs_split_per_file() {
        let fixture: Vec<FileDiff> = ["a.rs", "b.rs", "c.rs"]
            .into_iter()
            .map(|path| FileDiff {
                old_path: path.into(),
                new_path: path.into(),
                diff: (0..150).map(|l| format!("+line {l}\n")).collect(),
            })
            .collect();

        let actual = chunk_diff(&render_diffs(&fixture));

        let paths: Vec<&str> = actual.iter().map(|c| c.file_path.as_str()).collect();
        assert_eq!(paths, vec!["a.rs", "b.rs", "c.rs"]);
        assert!(actual.iter().all(|c| c.content.starts_with("diff --git ")));
    }

    #[test]
    fn test_urls_and_references() {
        let fixture = GitLabProvider::new("acme/api", "t".into(), API_URL, WEB_URL).unwrap();

        assert_eq!(fixture.repo_url(), "https://gitlab.com/acme/api");
        assert_eq!(fixture.request_url(3), "https://gitlab.com/acme/api/-/merge_requests/3");
        assert_eq!(fixture.cross_repo_issue_ref(9), "acme/api#9");
    }

    #[tokio::test]
    async fn test_resolve_milestone_falls_back_to_group() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("{PROJECT}/milestones").as_str())
            .match_query(Matcher::UrlEncoded("title".into(), "2026-Q4".into()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        server
            .mock("GET", PROJECT)
            .with_status(200)
            .with_body(r#"{"namespace": {"id": 77, "kind": "group"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/groups/77/milestones")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("title".into(), "2026-Q4".into()),
                Matcher::UrlEncoded("include_ancestors".into(), "true".into()),
            ]))
            .with_status(200)
            .with_body(r#"[{"id": 901}]"#)
            .create_async()
            .await;
        let fixture = provider(&server);

        let actual = fixture.resolve_milestone("2026-Q4").await.unwrap();

        assert_eq!(actual, Some(901));
    }

    #[tokio::test]
    async fn test_resolve_milestone_creates_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("{PROJECT}/milestones").as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        server
            .mock("GET", PROJECT)
            .with_status(200)
            .with_body(r#"{"namespace": {"id": 5, "kind": "user"}}"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", format!("{PROJECT}/milestones").as_str())
            .match_body(Matcher::Json(serde_json::json!({"title": "2026-Q4"})))
            .with_status(201)
            .with_body(r#"{"id": 42}"#)
            .create_async()
            .await;
        let fixture = provider(&server);

        let actual = fixture.resolve_milestone("2026-Q4").await.unwrap();

        create.assert_async().await;
        assert_eq!(actual, Some(42));
    }

    #[tokio::test]
    async fn test_create_request_marks_draft() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", format!("{PROJECT}/merge_requests").as_str())
            .match_body(Matcher::PartialJson(serde_json::json!({
                "title": "Draft: #12 - Add retries",
                "description": "Closes #12",
                "labels": "backend,infra",
                "milestone_id": 901,
                "remove_source_branch": true
            })))
            .with_status(201)
            .with_body(
                r#"{"iid": 3, "title": "Draft: #12 - Add retries", "web_url": "https://gitlab.com/acme/api/-/merge_requests/3", "description": "Closes #12"}"#,
            )
            .create_async()
            .await;
        let fixture = provider(&server);
        let params = MergeRequestParams::default()
            .title("#12 - Add retries")
            .source_branch("12-add-retries")
            .target_branch("main")
            .issue_number(12u64)
            .is_draft(true)
            .labels(vec!["backend".to_string(), "infra".to_string()])
            .milestone_id(901u64)
            .remove_source_branch(true);

        let actual = fixture.create_request(&params).await.unwrap();

        create.assert_async().await;
        let expected = RequestResult {
            id: 3,
            title: "Draft: #12 - Add retries".into(),
            url: "https://gitlab.com/acme/api/-/merge_requests/3".into(),
            is_draft: true,
        };
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_create_request_reports_existing_merge_request() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", format!("{PROJECT}/merge_requests").as_str())
            .with_status(409)
            .with_body(r#"{"message": ["Another open merge request already exists for this source branch: !8"]}"#)
            .create_async()
            .await;
        let fixture = provider(&server);
        let params = MergeRequestParams::default().title("t").issue_number(1u64);

        let actual = fixture.create_request(&params).await.unwrap_err().to_string();

        assert_eq!(
            actual,
            "a merge request already exists for this branch.\nView existing merge request: https://gitlab.com/acme/api/-/merge_requests/8"
        );
    }

    #[tokio::test]
    async fn test_request_diff_renders_latest_version() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("{PROJECT}/merge_requests/3/versions").as_str())
            .with_status(200)
            .with_body(r#"[{"id": 55}, {"id": 54}]"#)
            .create_async()
            .await;
        server
            .mock("GET", format!("{PROJECT}/merge_requests/3/versions/55").as_str())
            .with_status(200)
            .with_body(r#"{"diffs": [{"old_path": "a.rs", "new_path": "a.rs", "diff": "@@ -1 +1 @@\n-x\n+y\n"}]}"#)
            .create_async()
            .await;
        let fixture = provider(&server);

        let actual = fixture.request_diff(3).await.unwrap();

        assert_eq!(actual, "diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n@@ -1 +1 @@\n-x\n+y\n\n");
    }

    #[tokio::test]
    async fn test_request_diff_gives_up_when_versions_never_appear() {
        let mut server = mockito::Server::new_async().await;
        let versions = server
            .mock("GET", format!("{PROJECT}/merge_requests/3/versions").as_str())
            .with_status(200)
            .with_body("[]")
            .expect_at_least(2)
            .create_async()
            .await;
        let fixture = provider(&server);

        let actual = fixture.request_diff(3).await.unwrap_err().to_string();

        versions.assert_async().await;
        assert_eq!(actual, NO_DIFF_VERSIONS);
    }

    #[tokio::test]
    async fn test_request_diff_does_not_retry_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let versions = server
            .mock("GET", format!("{PROJECT}/merge_requests/3/versions").as_str())
            .with_status(404)
            .with_body(r#"{"message": "404 Not found"}"#)
            .expect(1)
            .create_async()
            .await;
        let fixture = provider(&server);

        let actual = fixture.request_diff(3).await;

        versions.assert_async().await;
        assert!(actual.is_err());
    }

    #[tokio::test]
    async fn test_open_requests_for_issue() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("{PROJECT}/merge_requests").as_str())
            .match_query(Matcher::UrlEncoded("state".into(), "opened".into()))
            .with_status(200)
            .with_body(
                r#"[
                    {"iid": 1, "title": "WIP: #12 - Add retries", "web_url": "u1", "description": "Closes #12"},
                    {"iid": 2, "title": "Other", "web_url": "u2", "description": null}
                ]"#,
            )
            .create_async()
            .await;
        let fixture = provider(&server);

        let actual = fixture.open_requests_for_issue(12).await.unwrap();

        let expected = vec![RequestResult {
            id: 1,
            title: "WIP: #12 - Add retries".into(),
            url: "u1".into(),
            is_draft: true,
        }];
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_update_issue_status_adds_scoped_label() {
        let mut server = mockito::Server::new_async().await;
        let update = server
            .mock("PUT", format!("{PROJECT}/issues/4").as_str())
            .match_body(Matcher::Json(serde_json::json!({"add_labels": "status::review"})))
            .with_status(200)
            .with_body(r#"{"iid": 4, "title": "t", "web_url": "u", "labels": ["status::review"]}"#)
            .create_async()
            .await;
        let fixture = provider(&server);

        fixture.update_issue_status(4, "review").await.unwrap();

        update.assert_async().await;
    }
}
