//! Diff chunking, embedding retrieval and description generation for tix

pub mod description;
pub mod diff_chunker;
pub mod mock;
pub mod retrieval;
pub mod vector_store;
pub mod workflow;

pub use description::{DescriptionContext, DiffContext, IssueDescription, parse_title};
pub use diff_chunker::chunk_diff;
pub use retrieval::{RetrievalConfig, Retriever, estimate_token_count, should_use_retrieval};
pub use vector_store::{VectorStore, cosine_similarity};
