use derive_setters::Setters;
use serde::{Deserialize, Serialize};

/// A contiguous slice of unified-diff text.
///
/// Chunks produced from one diff are numbered from zero and, concatenated in
/// index order, reproduce the diff they were cut from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Setters)]
#[setters(into)]
pub struct Chunk {
    /// Raw diff text, headers included.
    pub content: String,
    /// Position among the chunks of one diff.
    pub index: usize,
    /// Path from the most recent `+++ b/<path>` header, empty when unknown.
    pub file_path: String,
    /// Number of lines in `content`.
    pub line_count: usize,
}

impl Chunk {
    pub fn new(content: impl Into<String>, index: usize) -> Self {
        let content = content.into();
        let line_count = content.split_inclusive('\n').count();
        Self { content, index, file_path: String::new(), line_count }
    }

    /// File path suitable for display.
    pub fn display_path(&self) -> &str {
        if self.file_path.is_empty() { "unknown" } else { &self.file_path }
    }
}

/// A chunk paired with the embedding the provider returned for it.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

impl EmbeddingVector {
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self { chunk, embedding }
    }

    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_new_counts_lines() {
        let fixture = "diff --git a/x b/x\n+added\n-removed";

        let actual = Chunk::new(fixture, 0);

        assert_eq!(actual.line_count, 3);
        assert_eq!(actual.file_path, "");
    }

    #[test]
    fn test_display_path() {
        let fixture = Chunk::new("+x\n", 0);

        assert_eq!(fixture.display_path(), "unknown");
        assert_eq!(fixture.file_path("src/lib.rs").display_path(), "src/lib.rs");
    }
}
