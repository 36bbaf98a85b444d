//! Turning course documents into indexed chunks.

use std::path::Path;
use std::sync::Arc;

use lectern_core::error::{LecternError, Result};
use lectern_core::traits::VectorIndex;
use lectern_core::types::{Chunk, Course};
use serde::{Deserialize, Serialize};

use crate::chunker::{ChunkOrigin, Chunker};
use crate::document::parse_course;

/// File extensions picked up by folder ingestion.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md"];

/// An unparsed document: a display name (used when the text has no title) plus its text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Wipe the whole index first.
    pub clear_existing: bool,
    /// Leave courses whose title is already indexed untouched instead of replacing them.
    pub skip_existing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionSummary {
    pub sources_added: usize,
    pub chunks_added: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Ingestor {
    index: Arc<dyn VectorIndex>,
    chunker: Chunker,
}

impl Ingestor {
    pub fn new(index: Arc<dyn VectorIndex>, chunker: Chunker) -> Self {
        Self { index, chunker }
    }

    /// Every chunk for a course: the body without a section, then each lesson.
    pub fn chunk_course(&self, course: &Course) -> Vec<Chunk> {
        let source_id = course.source_id();
        let mut base = ChunkOrigin {
            source_id: source_id.clone(),
            source_title: course.title.clone(),
            ..ChunkOrigin::default()
        };
        if let Some(link) = &course.link {
            base.metadata.insert("course_link".into(), link.clone());
        }
        if let Some(instructor) = &course.instructor {
            base.metadata.insert("instructor".into(), instructor.clone());
        }

        let mut chunks = self.chunker.chunk(&course.body, &base);
        for lesson in &course.lessons {
            let mut origin = base.clone();
            origin.section_id = Some(lesson.number);
            origin.section_title = format!("Lesson {}", lesson.number);
            origin.metadata.insert("lesson_title".into(), lesson.title.clone());
            if let Some(link) = &lesson.link {
                origin.metadata.insert("lesson_link".into(), link.clone());
            }
            chunks.extend(self.chunker.chunk(&lesson.content, &origin));
        }
        chunks
    }

    /// Index one parsed course, replacing any previous copy. Returns chunks written.
    /// A failure leaves the previous copy in place.
    pub async fn ingest_course(&self, course: &Course) -> Result<usize> {
        let chunks = self.chunk_course(course);
        let written = self.index.replace_source(&course.to_record(), &chunks).await?;
        tracing::info!("📚 Indexed '{}' ({} lessons, {} chunks)", course.title, course.lessons.len(), written);
        Ok(written)
    }

    /// Parse and index raw documents. Unparseable documents are counted, not fatal.
    pub async fn ingest_documents(&self, docs: &[RawDocument], opts: IngestOptions) -> Result<IngestionSummary> {
        if opts.clear_existing {
            tracing::info!("🗑️ Clearing existing index before ingestion");
            self.index.clear().await?;
        }
        let known = if opts.skip_existing {
            self.index.source_titles().await?
        } else {
            Vec::new()
        };

        let mut summary = IngestionSummary::default();
        for doc in docs {
            let course = match parse_course(&doc.text, &doc.name) {
                Ok(course) => course,
                Err(e) => {
                    tracing::warn!("⚠️ Skipping '{}': {}", doc.name, e);
                    summary.failed += 1;
                    continue;
                }
            };
            if known.contains(&course.title) {
                tracing::debug!("Course already indexed: {}", course.title);
                summary.skipped += 1;
                continue;
            }
            summary.chunks_added += self.ingest_course(&course).await?;
            summary.sources_added += 1;
        }
        Ok(summary)
    }

    /// Ingest every supported file directly inside `dir`, in name order.
    pub async fn ingest_folder(&self, dir: &Path, opts: IngestOptions) -> Result<IngestionSummary> {
        if !dir.is_dir() {
            return Err(LecternError::InvalidArgument(format!(
                "not a directory: {}",
                dir.display()
            )));
        }

        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let supported = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if path.is_file() && supported {
                paths.push(path);
            }
        }
        paths.sort();

        let mut docs = Vec::with_capacity(paths.len());
        let mut unreadable = 0;
        for path in paths {
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => docs.push(RawDocument {
                    name: path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    text,
                }),
                Err(e) => {
                    tracing::warn!("⚠️ Cannot read {}: {}", path.display(), e);
                    unreadable += 1;
                }
            }
        }

        let mut summary = self.ingest_documents(&docs, opts).await?;
        summary.failed += unreadable;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteVectorStore;
    use async_trait::async_trait;
    use lectern_core::traits::Embedder;
    use lectern_core::types::SearchFilter;
    use sha2::{Digest, Sha256};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct DigestEmbedder {
        down: AtomicBool,
    }

    #[async_trait]
    impl Embedder for DigestEmbedder {
        fn name(&self) -> &str {
            "digest"
        }
        fn dimension(&self) -> usize {
            32
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.down.load(Ordering::SeqCst) {
                return Err(LecternError::backend("digest", "connection refused"));
            }
            Ok(Sha256::digest(text.as_bytes()).iter().map(|b| *b as f32).collect())
        }
    }

    const COURSE: &str = "Course Title: Intro to MCP
Course Link: https://example.com/mcp
Course Instructor: Elie

Lesson 0: Welcome
Welcome to the course on the Model Context Protocol.

Lesson 1: Servers
Servers expose tools, resources and prompts to clients.
";

    fn ingestor() -> (Arc<SqliteVectorStore>, Ingestor) {
        let (store, ingestor, _) = ingestor_with_embedder();
        (store, ingestor)
    }

    fn ingestor_with_embedder() -> (Arc<SqliteVectorStore>, Ingestor, Arc<DigestEmbedder>) {
        let embedder = Arc::new(DigestEmbedder::default());
        let store = Arc::new(SqliteVectorStore::open_in_memory(embedder.clone()).unwrap());
        let ingestor = Ingestor::new(store.clone(), Chunker::new(800, 100).unwrap());
        (store, ingestor, embedder)
    }

    fn doc(name: &str, text: &str) -> RawDocument {
        RawDocument {
            name: name.into(),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn test_ingest_documents() {
        let (store, ingestor) = ingestor();
        let summary = ingestor
            .ingest_documents(&[doc("mcp", COURSE), doc("notes", "Loose notes.")], IngestOptions::default())
            .await
            .unwrap();
        assert_eq!(
            summary,
            IngestionSummary {
                sources_added: 2,
                chunks_added: 3,
                skipped: 0,
                failed: 0
            }
        );

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_sources, 2);
        assert_eq!(stats.total_sections, 2);

        let filter = SearchFilter {
            source_title: Some("MCP".into()),
            section_id: Some(1),
        };
        let hits = store.query("servers", 5, &filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        let chunk = &hits.hits[0].chunk;
        assert_eq!(chunk.label(), "Intro to MCP - Lesson 1");
        assert_eq!(chunk.metadata["lesson_title"], "Servers");
        assert_eq!(chunk.metadata["course_link"], "https://example.com/mcp");
    }

    #[tokio::test]
    async fn test_reingest_replaces() {
        let (store, ingestor) = ingestor();
        ingestor.ingest_documents(&[doc("mcp", COURSE)], IngestOptions::default()).await.unwrap();
        let trimmed = COURSE.split("Lesson 1").next().unwrap();
        ingestor.ingest_documents(&[doc("mcp", trimmed)], IngestOptions::default()).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_sources, 1);
        assert_eq!(stats.total_chunks, 1);
    }

    #[tokio::test]
    async fn test_lookalike_titles_are_separate_courses() {
        let (store, ingestor) = ingestor();
        let summary = ingestor
            .ingest_documents(
                &[
                    doc("cpp", "Course Title: C++ Basics\nLesson 1: Pointers\nPointers hold addresses."),
                    doc("c", "Course Title: C Basics\nLesson 1: Pointers\nPointers in plain C."),
                ],
                IngestOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(summary.sources_added, 2);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_sources, 2);
        assert_eq!(stats.total_chunks, 2);
        assert_eq!(
            store.source_titles().await.unwrap(),
            vec!["C++ Basics".to_string(), "C Basics".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_reingest_keeps_previous_copy() {
        let (store, ingestor, embedder) = ingestor_with_embedder();
        ingestor.ingest_documents(&[doc("mcp", COURSE)], IngestOptions::default()).await.unwrap();
        let before = store.stats().await.unwrap();
        assert_eq!(before.total_chunks, 2);

        embedder.down.store(true, Ordering::SeqCst);
        let err = ingestor
            .ingest_documents(&[doc("mcp", COURSE)], IngestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::BackendUnavailable { .. }));
        assert_eq!(store.stats().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_skip_existing_and_failures() {
        let (_store, ingestor) = ingestor();
        ingestor.ingest_documents(&[doc("mcp", COURSE)], IngestOptions::default()).await.unwrap();
        let opts = IngestOptions {
            skip_existing: true,
            ..IngestOptions::default()
        };
        let summary = ingestor
            .ingest_documents(&[doc("mcp", COURSE), doc("", "")], opts)
            .await
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.sources_added, 0);
    }

    #[tokio::test]
    async fn test_ingest_folder() {
        let dir = std::env::temp_dir().join(format!("lectern-ingest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("course1_script.txt"), COURSE).unwrap();
        std::fs::write(dir.join("readme.md"), "Course Title: Readme\nSome text").unwrap();
        std::fs::write(dir.join("image.png"), [0u8, 1, 2]).unwrap();

        let (store, ingestor) = ingestor();
        let opts = IngestOptions {
            clear_existing: true,
            ..IngestOptions::default()
        };
        let summary = ingestor.ingest_folder(&dir, opts).await.unwrap();
        assert_eq!(summary.sources_added, 2);
        assert_eq!(
            store.source_titles().await.unwrap(),
            vec!["Intro to MCP".to_string(), "Readme".to_string()]
        );

        let err = ingestor.ingest_folder(&dir.join("missing"), opts).await.unwrap_err();
        assert!(matches!(err, LecternError::InvalidArgument(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
