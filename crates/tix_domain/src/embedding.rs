use anyhow::Result;
use async_trait::async_trait;

/// Turns text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. The output has one vector per input, in input
    /// order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let result = self.embed_batch(&[text.to_string()]).await?;
        result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }

    fn name(&self) -> &str;
}

/// A chat-style language model.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Ask the model to answer `prompt` under the `system` instructions.
    ///
    /// `Ok(None)` means the call succeeded but the model produced no message.
    async fn complete(&self, system: &str, prompt: &str) -> Result<Option<String>>;

    fn name(&self) -> &str;
}
