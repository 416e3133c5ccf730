//! Domain types shared by the tix workflow: diff chunks, embeddings,
//! model traits, SCM provider contracts and repository settings.

mod chunk;
mod embedding;
mod error;
mod scm;
mod search;
mod settings;

pub use chunk::*;
pub use embedding::*;
pub use error::{Error, Result};
pub use scm::*;
pub use search::*;
pub use settings::*;
