//! Vector index trait: chunk storage plus course metadata.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Chunk, IndexStats, SearchFilter, SearchResults, SourceRecord};

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace course metadata. Idempotent.
    async fn upsert_source(&self, record: &SourceRecord) -> Result<()>;

    /// Insert or replace chunks by their content address. Returns how many were written.
    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<usize>;

    /// Swap in a course and its full chunk set as one unit: chunks not in
    /// `chunks` are dropped. On error the previous copy is left as it was.
    async fn replace_source(&self, record: &SourceRecord, chunks: &[Chunk]) -> Result<usize>;

    /// Top-k chunks most similar to `text` that satisfy `filter`, best first.
    ///
    /// A course filter that matches no known course yields empty results with
    /// a reason rather than an error.
    async fn query(&self, text: &str, top_k: usize, filter: &SearchFilter) -> Result<SearchResults>;

    async fn stats(&self) -> Result<IndexStats>;

    /// All course titles in insertion order.
    async fn source_titles(&self) -> Result<Vec<String>>;

    /// Best-matching course for a possibly partial name.
    async fn resolve_source(&self, name: &str) -> Result<Option<SourceRecord>>;

    /// Drop a course and its chunks. Returns whether it existed.
    async fn remove_source(&self, source_id: &str) -> Result<bool>;

    async fn clear(&self) -> Result<()>;
}
