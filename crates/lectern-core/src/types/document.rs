//! Course documents, their stored metadata, and the chunks cut from them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A parsed course ready for chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    pub link: Option<String>,
    pub instructor: Option<String>,
    /// Text outside any lesson block. Indexed without a section.
    #[serde(default)]
    pub body: String,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub number: u32,
    pub title: String,
    pub link: Option<String>,
    pub content: String,
}

/// Course-level metadata kept by the index next to the chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_id: String,
    pub title: String,
    pub link: Option<String>,
    pub instructor: Option<String>,
    /// Ordered by section id.
    pub sections: Vec<SectionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub section_id: u32,
    pub title: String,
    pub link: Option<String>,
}

impl Course {
    pub fn source_id(&self) -> String {
        source_id_for(&self.title)
    }

    pub fn to_record(&self) -> SourceRecord {
        let mut sections: Vec<SectionRecord> = self
            .lessons
            .iter()
            .filter(|l| !l.title.is_empty())
            .map(|l| SectionRecord {
                section_id: l.number,
                title: l.title.clone(),
                link: l.link.clone(),
            })
            .collect();
        sections.sort_by_key(|s| s.section_id);
        sections.dedup_by_key(|s| s.section_id);
        SourceRecord {
            source_id: self.source_id(),
            title: self.title.clone(),
            link: self.link.clone(),
            instructor: self.instructor.clone(),
            sections,
        }
    }
}

/// Stable id for a course title: a lowercase slug plus a digest of the exact
/// (trimmed) title, so titles that slug alike ("C++ Basics", "C Basics") stay apart.
pub fn source_id_for(title: &str) -> String {
    let slug = title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    let digest = Sha256::digest(title.trim().as_bytes());
    let suffix: String = digest[..6].iter().map(|b| format!("{b:02x}")).collect();
    if slug.is_empty() {
        suffix
    } else {
        format!("{slug}-{suffix}")
    }
}

/// A bounded span of course text with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub source_id: String,
    pub source_title: String,
    pub section_id: Option<u32>,
    pub section_title: String,
    pub content: String,
    pub sequence_index: usize,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    /// Content address: SHA-256 over source id, section id and position.
    pub fn id(&self) -> String {
        let section = self
            .section_id
            .map(|s| s.to_string())
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(self.source_id.as_bytes());
        hasher.update([0x1f]);
        hasher.update(section.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.sequence_index.to_string().as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Citation label: `"<source> - <section>"`, or just the source.
    pub fn label(&self) -> String {
        if self.section_title.is_empty() {
            self.source_title.clone()
        } else {
            format!("{} - {}", self.source_title, self.section_title)
        }
    }
}
