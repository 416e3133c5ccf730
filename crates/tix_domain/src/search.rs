use crate::EmbeddingVector;

/// A ranked match borrowed from a vector store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult<'a> {
    pub vector: &'a EmbeddingVector,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub similarity: f64,
}

impl<'a> SearchResult<'a> {
    pub fn new(vector: &'a EmbeddingVector, similarity: f64) -> Self {
        Self { vector, similarity }
    }
}
