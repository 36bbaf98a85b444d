//! # Lectern Core
//!
//! Shared vocabulary for every Lectern crate: configuration, the error
//! taxonomy, plain data types and the traits that sit at the seams between
//! the query pipeline and its backends.
//!
//! ```text
//! Provider   — LLM chat completion with tool calling
//! Embedder   — text → fixed-length vector
//! VectorIndex — embedded chunk storage + nearest-neighbour search
//! Tool       — schema-described capability the LLM may invoke
//! ```

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::LecternConfig;
pub use error::{LecternError, Result};
