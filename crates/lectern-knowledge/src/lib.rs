//! # Lectern Knowledge
//!
//! Everything between a course file on disk and a ranked list of excerpts.
//!
//! ```text
//! course.txt ──parse──▶ Course ──chunk──▶ [Chunk] ──embed──▶ SQLite
//!                                                            │
//! question ─────────────────────embed──▶ cosine top-k ◀──────┘
//! ```
//!
//! The index is a plain SQLite file holding chunk text, metadata and the
//! embedding as a little-endian `f32` blob. Search is brute-force cosine
//! similarity, which is plenty for a course catalogue.

pub mod chunker;
pub mod document;
pub mod ingest;
pub mod similarity;
pub mod store;

pub use chunker::{ChunkOrigin, Chunker};
pub use document::parse_course;
pub use ingest::{IngestionSummary, Ingestor, RawDocument};
pub use store::SqliteVectorStore;
