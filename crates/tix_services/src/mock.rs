//! Deterministic model doubles for tests and offline runs

use std::collections::VecDeque;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tix_domain::{CompletionModel, Embedder};

/// Bag-of-words hash embeddings: identical texts embed identically and texts
/// sharing words point in similar directions.
#[derive(Debug, Default)]
pub struct MockEmbedder {
    dimension: usize,
    fail_on_batch: Option<usize>,
    batch_sizes: Mutex<Vec<usize>>,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension: dimension.max(1), ..Default::default() }
    }

    /// Make the `n`th `embed_batch` call (zero based) fail.
    pub fn fail_on_batch(mut self, n: impl Into<usize>) -> Self {
        self.fail_on_batch = Some(n.into());
        self
    }

    /// Sizes of the batches received so far.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().map(|b| b.clone()).unwrap_or_default()
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for word in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = {
            let mut sizes = self
                .batch_sizes
                .lock()
                .map_err(|_| anyhow::anyhow!("mock embedder lock poisoned"))?;
            sizes.push(texts.len());
            sizes.len() - 1
        };

        if self.fail_on_batch == Some(call) {
            anyhow::bail!("mock embedder failed on batch {call}");
        }
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Replays scripted completions in order and records the prompts it saw.
///
/// `None` entries simulate a response without choices.
#[derive(Debug, Default)]
pub struct MockCompletion {
    responses: Mutex<VecDeque<Result<Option<String>, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, text: impl Into<String>) -> Self {
        self.push(Ok(Some(text.into())))
    }

    pub fn respond_empty(self) -> Self {
        self.push(Ok(None))
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()))
    }

    fn push(self, response: Result<Option<String>, String>) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(response);
        }
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionModel for MockCompletion {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<Option<String>> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let next = self
            .responses
            .lock()
            .map_err(|_| anyhow::anyhow!("mock completion lock poisoned"))?
            .pop_front();

        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => anyhow::bail!("mock completion has no scripted response left"),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
