//! OpenAI embeddings and chat completions over reqwest

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tix_domain::{CompletionModel, Embedder, RetrievalSettings};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Client for the OpenAI REST API, usable as both embedder and completion
/// model.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    embedding_model: String,
    completion_model: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, settings: &RetrievalSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
            embedding_model: settings.embedding_model.clone(),
            completion_model: settings.completion_model.clone(),
        }
    }

    /// Build a client from `OPENAI_API_KEY`.
    pub fn from_env(settings: &RetrievalSettings) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .context("OPENAI_API_KEY environment variable is required")?;
        Ok(Self::new(api_key, settings))
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API request failed ({status}): {error_text}");
        }
        Ok(response)
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!(model = %self.embedding_model, inputs = texts.len(), "Requesting embeddings");

        let request = EmbeddingRequest { model: &self.embedding_model, input: texts };
        let mut response: EmbeddingResponse = self
            .post("embeddings", &request)
            .await?
            .json()
            .await
            .context("invalid embeddings response")?;

        response.data.sort_by_key(|d| d.index);
        info!(
            embeddings = response.data.len(),
            dimension = response.data.first().map(|d| d.embedding.len()).unwrap_or(0),
            "OpenAI returned embeddings"
        );
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn name(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl CompletionModel for OpenAiClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<Option<String>> {
        debug!(model = %self.completion_model, prompt_bytes = prompt.len(), "Requesting completion");

        let request = ChatRequest {
            model: &self.completion_model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: prompt },
            ],
        };
        let response: ChatResponse = self
            .post("chat/completions", &request)
            .await?
            .json()
            .await
            .context("invalid chat completion response")?;

        Ok(response.choices.into_iter().next().and_then(|c| c.message.content))
    }

    fn name(&self) -> &str {
        &self.completion_model
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn client(server: &mockito::Server) -> OpenAiClient {
        let settings = RetrievalSettings {
            openai_base_url: format!("{}/v1/", server.url()),
            ..Default::default()
        };
        OpenAiClient::new("sk-test", &settings)
    }

    #[tokio::test]
    async fn test_embed_batch_orders_by_index() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "text-embedding-3-small",
                "input": ["first", "second"]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": [
                        {"index": 1, "embedding": [0.0, 1.0]},
                        {"index": 0, "embedding": [1.0, 0.0]}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let fixture = client(&server);

        let actual = fixture
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(actual, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_batch_surfaces_api_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(429)
            .with_body("Rate limit reached")
            .create_async()
            .await;
        let fixture = client(&server);

        let actual = fixture.embed_batch(&["x".to_string()]).await.unwrap_err();

        assert!(actual.to_string().contains("Rate limit reached"));
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "describe"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "### Summary"}}]})
                    .to_string(),
            )
            .create_async()
            .await;
        let fixture = client(&server);

        let actual = fixture.complete("be brief", "describe").await.unwrap();

        mock.assert_async().await;
        assert_eq!(actual, Some("### Summary".to_string()));
    }

    #[tokio::test]
    async fn test_complete_without_choices() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;
        let fixture = client(&server);

        let actual = fixture.complete("s", "p").await.unwrap();

        assert_eq!(actual, None);
    }
}
