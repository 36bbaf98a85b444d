//! Overlapping, word-boundary aware text windows.
//!
//! Sizes are counted in `char`s so multi-byte text is never split inside a
//! code point.

use std::collections::BTreeMap;

use lectern_core::error::{LecternError, Result};
use lectern_core::types::Chunk;

/// Provenance copied onto every chunk cut from one document section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkOrigin {
    pub source_id: String,
    pub source_title: String,
    pub section_id: Option<u32>,
    pub section_title: String,
    pub metadata: BTreeMap<String, String>,
}

/// Metadata keys recording each chunk's char span in its section text.
pub const CHAR_START: &str = "char_start";
pub const CHAR_END: &str = "char_end";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(LecternError::InvalidArgument(
                "chunk_size must be greater than 0".into(),
            ));
        }
        if overlap >= chunk_size {
            return Err(LecternError::InvalidArgument(format!(
                "chunk_overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Char spans `(start, end)` of every window over `text`.
    pub fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let mut spans = Vec::new();
        if len == 0 {
            return spans;
        }

        let mut start = 0;
        loop {
            let window_end = (start + self.chunk_size).min(len);
            if window_end == len {
                spans.push((start, len));
                break;
            }

            let end = self.trim_to_boundary(&chars, start, window_end);
            spans.push((start, end));

            // Always make progress, even when overlap eats most of a trimmed window.
            start = end.saturating_sub(self.overlap).max(start + 1);
        }
        spans
    }

    /// Last whitespace in the trailing 20% of the window, if it lies past 80%.
    fn trim_to_boundary(&self, chars: &[char], start: usize, window_end: usize) -> usize {
        if chars[window_end].is_whitespace() {
            return window_end;
        }
        (start + 1..window_end)
            .rev()
            .take_while(|&i| (i - start) * 5 > self.chunk_size * 4)
            .find(|&i| chars[i].is_whitespace())
            .unwrap_or(window_end)
    }

    /// Cut `text` into chunks carrying `origin`'s provenance.
    pub fn chunk(&self, text: &str, origin: &ChunkOrigin) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        self.spans(text)
            .into_iter()
            .enumerate()
            .map(|(sequence_index, (start, end))| {
                let mut metadata = origin.metadata.clone();
                metadata.insert(CHAR_START.into(), start.to_string());
                metadata.insert(CHAR_END.into(), end.to_string());
                Chunk {
                    source_id: origin.source_id.clone(),
                    source_title: origin.source_title.clone(),
                    section_id: origin.section_id,
                    section_title: origin.section_title.clone(),
                    content: chars[start..end].iter().collect(),
                    sequence_index,
                    metadata,
                }
            })
            .collect()
    }
}

/// One-shot form: validate parameters then chunk.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize, origin: &ChunkOrigin) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(chunk_size, overlap)?.chunk(text, origin))
}
