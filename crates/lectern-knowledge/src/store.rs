//! SQLite-backed vector index.
//!
//! One connection behind a `Mutex`: reads and writes are serialized by the
//! lock, which SQLite needs anyway for a single handle. Embedding calls run
//! before the lock is taken so slow backends never hold it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use lectern_core::error::{LecternError, Result};
use lectern_core::traits::{Embedder, VectorIndex};
use lectern_core::types::{
    Chunk, IndexStats, SearchFilter, SearchHit, SearchResults, SectionRecord, SourceRecord,
    SourceStats,
};
use rusqlite::{Connection, OptionalExtension, params};

use crate::similarity::{cosine_similarity, decode_vector, encode_vector, resolve_title};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sources (
    source_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    link TEXT,
    instructor TEXT,
    sections TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    source_title TEXT NOT NULL,
    section_id INTEGER,
    section_title TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL,
    sequence_index INTEGER NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    embedding BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id, section_id);
";

/// SQLite failures surface as an unavailable index backend.
fn store_err(e: impl std::fmt::Display) -> LecternError {
    LecternError::backend("index", e.to_string())
}

fn write_source(conn: &Connection, record: &SourceRecord) -> Result<()> {
    let sections = serde_json::to_string(&record.sections)?;
    conn.execute(
        "INSERT INTO sources (source_id, title, link, instructor, sections, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(source_id) DO UPDATE SET
            title = excluded.title,
            link = excluded.link,
            instructor = excluded.instructor,
            sections = excluded.sections",
        params![
            record.source_id,
            record.title,
            record.link,
            record.instructor,
            sections,
            chrono::Utc::now().to_rfc3339(),
        ],
    )
    .map_err(store_err)?;
    Ok(())
}

fn write_chunks(conn: &Connection, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
    let mut stmt = conn
        .prepare(
            "INSERT OR REPLACE INTO chunks
             (id, source_id, source_title, section_id, section_title, content,
              sequence_index, metadata, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .map_err(store_err)?;
    for (chunk, vector) in chunks.iter().zip(vectors) {
        stmt.execute(params![
            chunk.id(),
            chunk.source_id,
            chunk.source_title,
            chunk.section_id,
            chunk.section_title,
            chunk.content,
            chunk.sequence_index as i64,
            serde_json::to_string(&chunk.metadata)?,
            encode_vector(vector),
        ])
        .map_err(store_err)?;
    }
    Ok(())
}

/// What a course-title filter resolved to.
enum FilterTarget {
    Any,
    Source(String),
    Missing(String),
}

pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorStore {
    /// Open (or create) the index file at `path`.
    pub fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        tracing::info!("📦 Vector index opened at {}", path.display());
        Self::with_connection(conn, embedder)
    }

    pub fn open_in_memory(embedder: Arc<dyn Embedder>) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::with_connection(conn, embedder)
    }

    fn with_connection(conn: Connection, embedder: Arc<dyn Embedder>) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(store_err)
    }

    fn chunk_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))
            .map_err(store_err)?;
        Ok(n as usize)
    }

    fn load_records(&self) -> Result<Vec<SourceRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT source_id, title, link, instructor, sections
                 FROM sources ORDER BY created_at, rowid",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(store_err)?;

        let mut records = Vec::new();
        for row in rows {
            let (source_id, title, link, instructor, sections) = row.map_err(store_err)?;
            let sections: Vec<SectionRecord> = serde_json::from_str(&sections)?;
            records.push(SourceRecord {
                source_id,
                title,
                link,
                instructor,
                sections,
            });
        }
        Ok(records)
    }

    /// One vector per chunk, computed before any row is touched.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(LecternError::backend(
                self.embedder.name(),
                format!("expected {} embeddings, got {}", chunks.len(), vectors.len()),
            ));
        }
        Ok(vectors)
    }

    fn resolve_filter(&self, filter: &SearchFilter) -> Result<FilterTarget> {
        let Some(name) = filter.source_title.as_deref().filter(|n| !n.trim().is_empty()) else {
            return Ok(FilterTarget::Any);
        };
        let records = self.load_records()?;
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        Ok(match resolve_title(name, &titles) {
            Some(i) => FilterTarget::Source(records[i].source_id.clone()),
            None => FilterTarget::Missing(format!("No course found matching '{name}'")),
        })
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorStore {
    async fn upsert_source(&self, record: &SourceRecord) -> Result<()> {
        let conn = self.lock()?;
        write_source(&conn, record)
    }

    async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let vectors = self.embed_chunks(chunks).await?;

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(store_err)?;
        write_chunks(&tx, chunks, &vectors)?;
        tx.commit().map_err(store_err)?;
        tracing::debug!("Upserted {} chunks", chunks.len());
        Ok(chunks.len())
    }

    async fn replace_source(&self, record: &SourceRecord, chunks: &[Chunk]) -> Result<usize> {
        let vectors = self.embed_chunks(chunks).await?;

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(store_err)?;
        tx.execute("DELETE FROM chunks WHERE source_id = ?1", params![record.source_id])
            .map_err(store_err)?;
        write_source(&tx, record)?;
        write_chunks(&tx, chunks, &vectors)?;
        tx.commit().map_err(store_err)?;
        tracing::debug!("Replaced '{}' with {} chunks", record.title, chunks.len());
        Ok(chunks.len())
    }

    async fn query(&self, text: &str, top_k: usize, filter: &SearchFilter) -> Result<SearchResults> {
        if top_k == 0 || self.chunk_count()? == 0 {
            return Ok(SearchResults::default());
        }
        let source_id = match self.resolve_filter(filter)? {
            FilterTarget::Any => None,
            FilterTarget::Source(id) => Some(id),
            FilterTarget::Missing(reason) => return Ok(SearchResults::empty(reason)),
        };

        let query_vec = self.embedder.embed(text).await?;

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT source_id, source_title, section_id, section_title, content,
                        sequence_index, metadata, embedding
                 FROM chunks
                 WHERE (?1 IS NULL OR source_id = ?1)
                   AND (?2 IS NULL OR section_id = ?2)",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![source_id, filter.section_id], |row| {
                Ok((
                    Chunk {
                        source_id: row.get(0)?,
                        source_title: row.get(1)?,
                        section_id: row.get(2)?,
                        section_title: row.get(3)?,
                        content: row.get(4)?,
                        sequence_index: row.get::<_, i64>(5)? as usize,
                        metadata: BTreeMap::new(),
                    },
                    row.get::<_, String>(6)?,
                    row.get::<_, Vec<u8>>(7)?,
                ))
            })
            .map_err(store_err)?;

        let mut hits = Vec::new();
        for row in rows {
            let (mut chunk, metadata, blob) = row.map_err(store_err)?;
            let vector = decode_vector(&blob);
            if vector.len() != query_vec.len() {
                tracing::warn!(
                    "⚠️ Index holds {}-dim vectors but '{}' embeds to {}",
                    vector.len(),
                    self.embedder.name(),
                    query_vec.len()
                );
                return Err(LecternError::Store(format!(
                    "embedding dimension mismatch: index holds {}-dim vectors, query embedder '{}' produced {}; re-ingest the courses",
                    vector.len(),
                    self.embedder.name(),
                    query_vec.len()
                )));
            }
            chunk.metadata = serde_json::from_str(&metadata)?;
            hits.push(SearchHit {
                score: cosine_similarity(&query_vec, &vector),
                chunk,
            });
        }

        // Ties fall back to document order so results are reproducible.
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.source_id.cmp(&b.chunk.source_id))
                .then_with(|| a.chunk.section_id.cmp(&b.chunk.section_id))
                .then_with(|| a.chunk.sequence_index.cmp(&b.chunk.sequence_index))
        });
        hits.truncate(top_k);
        Ok(SearchResults::new(hits))
    }

    async fn stats(&self) -> Result<IndexStats> {
        let records = self.load_records()?;
        let counts: BTreeMap<String, usize> = {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare("SELECT source_id, COUNT(*) FROM chunks GROUP BY source_id")
                .map_err(store_err)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
                .map_err(store_err)?;
            let mut counts = BTreeMap::new();
            for row in rows {
                let (id, n) = row.map_err(store_err)?;
                counts.insert(id, n as usize);
            }
            counts
        };

        let per_source: Vec<SourceStats> = records
            .iter()
            .map(|r| SourceStats {
                title: r.title.clone(),
                sections: r.sections.len(),
                chunks: counts.get(&r.source_id).copied().unwrap_or(0),
            })
            .collect();

        Ok(IndexStats {
            total_sources: records.len(),
            total_sections: per_source.iter().map(|s| s.sections).sum(),
            total_chunks: counts.values().sum(),
            per_source,
        })
    }

    async fn source_titles(&self) -> Result<Vec<String>> {
        Ok(self.load_records()?.into_iter().map(|r| r.title).collect())
    }

    async fn resolve_source(&self, name: &str) -> Result<Option<SourceRecord>> {
        let mut records = self.load_records()?;
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        Ok(resolve_title(name, &titles).map(|i| records.swap_remove(i)))
    }

    async fn remove_source(&self, source_id: &str) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(store_err)?;
        tx.execute("DELETE FROM chunks WHERE source_id = ?1", params![source_id])
            .map_err(store_err)?;
        let removed = tx
            .execute("DELETE FROM sources WHERE source_id = ?1", params![source_id])
            .map_err(store_err)?;
        tx.commit().map_err(store_err)?;
        Ok(removed > 0)
    }

    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM chunks; DELETE FROM sources;")
            .map_err(store_err)?;
        tracing::info!("🗑️ Vector index cleared");
        Ok(())
    }
}

impl SqliteVectorStore {
    /// Look up one course by id.
    pub fn source(&self, source_id: &str) -> Result<Option<SourceRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT title, link, instructor, sections FROM sources WHERE source_id = ?1",
                params![source_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(store_err)?;
        match row {
            Some((title, link, instructor, sections)) => Ok(Some(SourceRecord {
                source_id: source_id.to_string(),
                title,
                link,
                instructor,
                sections: serde_json::from_str(&sections)?,
            })),
            None => Ok(None),
        }
    }
}
