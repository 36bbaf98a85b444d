//! # Lectern Agent
//!
//! The query engine. For each question it resolves the session, loads a
//! bounded slice of history, and lets the LLM call course tools for a
//! capped number of rounds before answering. The answer, the sources the
//! tools cited and the session id come back together.

pub mod engine;
pub mod prompt;

pub use engine::{QueryEngine, QueryResponse};
pub use lectern_knowledge::ingest::IngestOptions;
