//! Seams between the orchestrator and its backends.

pub mod embedding;
pub mod provider;
pub mod tool;
pub mod vector_store;

pub use embedding::Embedder;
pub use provider::{GenerateParams, Provider};
pub use tool::Tool;
pub use vector_store::VectorIndex;
