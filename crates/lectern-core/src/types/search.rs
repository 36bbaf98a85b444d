//! Search filters, ranked results and index statistics.

use serde::{Deserialize, Serialize};

use super::document::Chunk;

/// Optional metadata restriction for a vector query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Course title, resolved loosely against known titles.
    pub source_title: Option<String>,
    /// Lesson number.
    pub section_id: Option<u32>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.source_title.is_none() && self.section_id.is_none()
    }

    /// Human-readable suffix, e.g. ` in course 'MCP' in lesson 2`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        if let Some(title) = self.source_title.as_deref().filter(|t| !t.is_empty()) {
            out.push_str(&format!(" in course '{title}'"));
        }
        if let Some(section) = self.section_id {
            out.push_str(&format!(" in lesson {section}"));
        }
        out
    }
}

/// One ranked hit. `score` is cosine similarity: higher is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// Ranked hits, best first. Empty results may explain themselves via `reason`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub reason: Option<String>,
}

impl SearchResults {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits, reason: None }
    }

    pub fn empty(reason: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_sources: usize,
    pub total_sections: usize,
    pub total_chunks: usize,
    pub per_source: Vec<SourceStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    pub title: String,
    pub sections: usize,
    pub chunks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_describe() {
        assert_eq!(SearchFilter::default().describe(), "");
        let filter = SearchFilter {
            source_title: Some("Test Course".into()),
            section_id: Some(1),
        };
        assert_eq!(filter.describe(), " in course 'Test Course' in lesson 1");
        assert!(!filter.is_empty());
    }

    #[test]
    fn test_empty_results_carry_reason() {
        let results = SearchResults::empty("No course found matching 'Rust'");
        assert!(results.is_empty());
        assert_eq!(results.len(), 0);
        assert_eq!(results.reason.as_deref(), Some("No course found matching 'Rust'"));
    }
}
