//! Retrieval-augmented context for large diffs
//!
//! Small diffs go to the language model whole. Large ones are chunked,
//! embedded, and only the chunks closest to a fixed summary query are kept.

use std::fmt::Write as _;
use std::sync::Arc;

use derive_setters::Setters;
use tix_domain::{Chunk, Embedder, EmbeddingVector, Error, Result, RetrievalSettings, SearchResult};
use tracing::{debug, info};

use crate::diff_chunker::chunk_diff;
use crate::vector_store::VectorStore;

pub const DEFAULT_TOKEN_THRESHOLD: usize = 50_000;
pub const DEFAULT_TOP_K: usize = 15;
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Bytes per estimated token, shared by the estimate and the context cap.
const BYTES_PER_TOKEN: usize = 4;

/// Query embedded to pick the chunks worth showing the model.
pub const RETRIEVAL_QUERY: &str = "Generate a concise description of these code changes \
covering a summary of what changed, notes for developers about the implementation, \
and notes for quality assurance about what to test.";

/// Rough token count: four bytes per token.
pub fn estimate_token_count(text: &str) -> usize {
    text.len() / BYTES_PER_TOKEN
}

/// Whether `diff` is large enough to need retrieval, using the default
/// threshold. `forced` wins when set.
pub fn should_use_retrieval(diff: &str, forced: Option<bool>) -> bool {
    RetrievalConfig::default().should_use_retrieval(diff, forced)
}

#[derive(Debug, Clone, PartialEq, Eq, Setters)]
pub struct RetrievalConfig {
    /// Estimated tokens at which retrieval kicks in.
    pub token_threshold: usize,
    /// Chunks kept for the prompt.
    pub top_k: usize,
    /// Chunks per embedding request.
    pub batch_size: usize,
    /// Upper bound on the rendered context block, in bytes.
    pub max_context_bytes: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            token_threshold: DEFAULT_TOKEN_THRESHOLD,
            top_k: DEFAULT_TOP_K,
            batch_size: DEFAULT_BATCH_SIZE,
            max_context_bytes: DEFAULT_TOKEN_THRESHOLD * BYTES_PER_TOKEN,
        }
    }
}

impl From<&RetrievalSettings> for RetrievalConfig {
    fn from(settings: &RetrievalSettings) -> Self {
        Self {
            token_threshold: settings.token_threshold,
            top_k: settings.top_k,
            batch_size: settings.batch_size,
            max_context_bytes: settings.token_threshold.saturating_mul(BYTES_PER_TOKEN),
        }
    }
}

impl RetrievalConfig {
    pub fn should_use_retrieval(&self, diff: &str, forced: Option<bool>) -> bool {
        if let Some(forced) = forced {
            return forced;
        }
        estimate_token_count(diff) >= self.token_threshold
    }
}

/// Embeds diff chunks and selects the ones relevant to a description.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, config: RetrievalConfig) -> Self {
        Self { embedder, config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn should_use_retrieval(&self, diff: &str, forced: Option<bool>) -> bool {
        self.config.should_use_retrieval(diff, forced)
    }

    /// Embed every chunk, one request per batch, keeping input order.
    ///
    /// A failing batch fails the whole call.
    pub async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddingVector>> {
        if chunks.is_empty() {
            return Err(Error::empty_input("no chunks to embed"));
        }

        let batch_size = self.config.batch_size.max(1);
        let mut vectors = Vec::with_capacity(chunks.len());
        let mut chunks = chunks.into_iter().peekable();
        let mut batch_start = 0;

        while chunks.peek().is_some() {
            let batch: Vec<Chunk> = chunks.by_ref().take(batch_size).collect();
            let inputs: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            debug!(batch_start, batch_size = batch.len(), "Generating embeddings");

            let embeddings = self.embedder.embed_batch(&inputs).await.map_err(|e| {
                Error::embedding_provider_with_source(
                    format!("{} failed on batch starting at chunk {batch_start}", self.embedder.name()),
                    e,
                )
            })?;

            if embeddings.len() != batch.len() {
                return Err(Error::embedding_provider(format!(
                    "{} returned {} embeddings for {} inputs",
                    self.embedder.name(),
                    embeddings.len(),
                    batch.len()
                )));
            }

            batch_start += batch.len();
            vectors.extend(batch.into_iter().zip(embeddings).map(|(c, e)| EmbeddingVector::new(c, e)));
        }

        info!(total_vectors = vectors.len(), "Generated embeddings");
        Ok(vectors)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embedder.embed(query).await.map_err(|e| {
            Error::embedding_provider_with_source(
                format!("{} failed to embed the retrieval query", self.embedder.name()),
                e,
            )
        })
    }

    /// Chunk, embed and rank `diff`, returning the context block that stands in
    /// for the full diff in a prompt.
    pub async fn retrieve(&self, diff: &str) -> Result<String> {
        let chunks = chunk_diff(diff);
        info!(chunks = chunks.len(), "Retrieving relevant diff chunks");

        let store = VectorStore::new(self.embed_chunks(chunks).await?)?;
        let query = self.embed_query(RETRIEVAL_QUERY).await?;
        let results = store.search(&query, self.config.top_k);

        let block = build_context_block(&results, self.config.max_context_bytes);
        info!(
            selected = results.len(),
            available = store.len(),
            block_bytes = block.len(),
            "Selected diff chunks"
        );
        Ok(block)
    }
}

/// Render search hits as one block, each annotated with its file and score.
///
/// The block never exceeds `max_bytes`: the chunk that would cross the limit
/// is cut at a line boundary and later hits are left out.
pub fn build_context_block(results: &[SearchResult<'_>], max_bytes: usize) -> String {
    let mut block = String::new();
    for (n, result) in results.iter().enumerate() {
        let chunk = &result.vector.chunk;
        let mut header = String::new();
        let _ = writeln!(
            header,
            "--- Chunk {} (file: {}, similarity: {:.3}) ---",
            n + 1,
            chunk.display_path(),
            result.similarity
        );

        // Two bytes for the closing newlines.
        let budget = max_bytes.saturating_sub(block.len() + header.len() + 2);
        let content = truncate_at_line(&chunk.content, budget);
        if content.is_empty() {
            debug!(chunk = n + 1, "Context block full");
            break;
        }

        block.push_str(&header);
        block.push_str(content);
        if !content.ends_with('\n') {
            block.push('\n');
        }
        block.push('\n');

        if content.len() < chunk.content.len() {
            debug!(chunk = n + 1, kept = content.len(), "Truncated chunk to fit context block");
            break;
        }
    }
    block
}

/// The longest prefix of `text` within `max_bytes` that ends on a line
/// boundary. Falls back to a character boundary when not even the first line
/// fits.
fn truncate_at_line(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }

    let mut end = 0;
    for line in text.split_inclusive('\n') {
        if end + line.len() > max_bytes {
            break;
        }
        end += line.len();
    }

    if end == 0 {
        end = max_bytes;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
    }
    &text[..end]
}
