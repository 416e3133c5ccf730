//! Failures of the description-generation core

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Nothing to embed: {message}")]
    EmptyInput { message: String },

    #[error("Embedding provider failed: {message}")]
    EmbeddingProvider {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Completion provider failed: {message}")]
    CompletionProvider {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("No response from completion provider: {message}")]
    NoResponse { message: String },
}

impl Error {
    pub fn empty_input(message: impl Into<String>) -> Self {
        Self::EmptyInput { message: message.into() }
    }

    pub fn embedding_provider(message: impl Into<String>) -> Self {
        Self::EmbeddingProvider { message: message.into(), source: None }
    }

    /// Create an embedding provider error wrapping the underlying failure
    pub fn embedding_provider_with_source(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::EmbeddingProvider { message: message.into(), source: Some(source.into()) }
    }

    pub fn completion_provider(message: impl Into<String>) -> Self {
        Self::CompletionProvider { message: message.into(), source: None }
    }

    /// Create a completion provider error wrapping the underlying failure
    pub fn completion_provider_with_source(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::CompletionProvider { message: message.into(), source: Some(source.into()) }
    }

    pub fn no_response(message: impl Into<String>) -> Self {
        Self::NoResponse { message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_display_messages() {
        let fixture = [
            (Error::empty_input("no chunks"), "Nothing to embed: no chunks"),
            (
                Error::embedding_provider("batch 2"),
                "Embedding provider failed: batch 2",
            ),
            (
                Error::completion_provider("gpt-4o"),
                "Completion provider failed: gpt-4o",
            ),
            (
                Error::no_response("zero choices"),
                "No response from completion provider: zero choices",
            ),
        ];

        for (error, expected) in fixture {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_source_is_preserved() {
        let fixture = anyhow::anyhow!("rate limited");

        let actual = Error::embedding_provider_with_source("batch 1", fixture);

        let source = actual.source().map(|e| e.to_string());
        assert_eq!(source, Some("rate limited".to_string()));
    }
}
