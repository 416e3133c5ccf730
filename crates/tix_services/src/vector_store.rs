//! In-memory vector store ranked by cosine similarity

use std::cmp::Ordering;

use tix_domain::{EmbeddingVector, Error, Result, SearchResult};
use tracing::debug;

/// Cosine similarity of two vectors, computed in `f64`.
///
/// Vectors of different lengths, or with a zero norm, score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0, 0.0, 0.0), |(dot, na, nb), (x, y)| {
        let (x, y) = (f64::from(*x), f64::from(*y));
        (dot + x * y, na + x * x, nb + y * y)
    });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Embeddings of one diff, held for a single retrieval pass.
#[derive(Debug, Clone, Default)]
pub struct VectorStore {
    vectors: Vec<EmbeddingVector>,
}

impl VectorStore {
    /// Build a store, rejecting vectors of mixed dimensionality.
    pub fn new(vectors: Vec<EmbeddingVector>) -> Result<Self> {
        if let Some(first) = vectors.first() {
            let dimension = first.dimension();
            if let Some(odd) = vectors.iter().find(|v| v.dimension() != dimension) {
                return Err(Error::embedding_provider(format!(
                    "chunk {} has {} dimensions, expected {}",
                    odd.chunk.index,
                    odd.dimension(),
                    dimension
                )));
            }
        }
        Ok(Self { vectors })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vectors(&self) -> &[EmbeddingVector] {
        &self.vectors
    }

    /// The `top_k` vectors most similar to `query`, best first.
    ///
    /// Equal scores keep insertion order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<SearchResult<'_>> {
        if top_k == 0 || self.vectors.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<_> = self
            .vectors
            .iter()
            .map(|vector| SearchResult::new(vector, cosine_similarity(query, &vector.embedding)))
            .collect();

        results.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal));
        results.truncate(top_k);

        debug!(
            candidates = self.vectors.len(),
            returned = results.len(),
            best = results.first().map(|r| r.similarity),
            "Vector search complete"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tix_domain::Chunk;

    use super::*;

    fn store(embeddings: &[&[f32]]) -> VectorStore {
        let vectors = embeddings
            .iter()
            .enumerate()
            .map(|(i, e)| EmbeddingVector::new(Chunk::new(format!("chunk {i}\n"), i), e.to_vec()))
            .collect();
        VectorStore::new(vectors).unwrap()
    }

    fn indices(results: &[SearchResult<'_>]) -> Vec<usize> {
        results.iter().map(|r| r.vector.chunk.index).collect()
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let actual = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);

        assert!((actual - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let actual = cosine_similarity(&[1.0, -2.0, 0.5], &[-1.0, 2.0, -0.5]);

        assert!((actual + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let actual = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);

        assert_eq!(actual, 0.0);
    }

    #[test]
    fn test_cosine_similarity_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_search_ranks_by_similarity() {
        let fixture = store(&[&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0], &[0.5, 0.5, 0.0]]);

        let actual = fixture.search(&[0.9, 0.1, 0.0], 2);

        assert_eq!(indices(&actual), vec![0, 2]);
        assert!(actual[0].similarity > actual[1].similarity);
    }

    #[test]
    fn test_search_clamps_top_k_to_store_size() {
        let fixture = store(&[&[1.0, 0.0], &[0.0, 1.0]]);

        let actual = fixture.search(&[1.0, 1.0], 15);

        assert_eq!(actual.len(), 2);
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let fixture = store(&[&[0.0, 1.0], &[1.0, 0.0], &[0.0, 2.0], &[0.0, 3.0]]);

        let actual = fixture.search(&[0.0, 1.0], 4);

        assert_eq!(indices(&actual), vec![0, 2, 3, 1]);
    }

    #[test]
    fn test_search_zero_top_k_or_empty_store() {
        let fixture = store(&[&[1.0, 0.0]]);

        assert!(fixture.search(&[1.0, 0.0], 0).is_empty());
        assert!(VectorStore::default().search(&[1.0, 0.0], 3).is_empty());
    }

    #[test]
    fn test_new_rejects_mixed_dimensions() {
        let vectors = vec![
            EmbeddingVector::new(Chunk::new("a\n", 0), vec![1.0, 0.0]),
            EmbeddingVector::new(Chunk::new("b\n", 1), vec![1.0, 0.0, 0.0]),
        ];

        let actual = VectorStore::new(vectors);

        assert!(matches!(actual, Err(Error::EmbeddingProvider { .. })));
    }
}
