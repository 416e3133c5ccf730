//! Small JSON-over-HTTP helper shared by the SCM providers

use anyhow::{Context, Result, anyhow, bail};
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!("tix/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub(crate) struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    service: &'static str,
}

impl RestClient {
    pub(crate) fn new(service: &'static str, base_url: &str, token: String) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid {service} API URL: {base_url}"))?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base_url, token, service })
    }

    /// Endpoint URL from path segments. Each segment is percent-encoded, so a
    /// `group/project` segment stays one segment.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("{} API URL cannot be a base", self.service))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.token)
    }

    /// Send `request`, turning non-success statuses into errors carrying the
    /// response body.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("{} API request failed", self.service))?;

        let status = response.status();
        debug!(service = self.service, %status, url = %response.url(), "API response");
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            bail!("{} API request failed ({status}): {error_text}", self.service);
        }
        Ok(response)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.url(segments)?;
        let request = self.request(Method::GET, url).query(query).header(ACCEPT, json_accept());
        self.send(request).await?.json().await.context("invalid JSON response")
    }

    pub(crate) async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        let url = self.url(segments)?;
        let request = self.request(method, url).header(ACCEPT, json_accept()).json(body);
        self.send(request).await?.json().await.context("invalid JSON response")
    }
}

fn json_accept() -> HeaderValue {
    HeaderValue::from_static("application/json")
}
