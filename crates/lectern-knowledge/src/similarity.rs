//! Vector similarity and loose course-title matching.

/// Cosine similarity in `[-1, 1]`. Zero-magnitude or mismatched vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Encode an embedding as little-endian `f32` bytes.
pub fn encode_vector(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

pub fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Pick the known title that best matches `name`.
///
/// Tried in order: exact, case-insensitive, substring (either direction,
/// shortest title wins), then the largest word overlap. Returns the index
/// into `titles`.
pub fn resolve_title<S: AsRef<str>>(name: &str, titles: &[S]) -> Option<usize> {
    let name = name.trim();
    if name.is_empty() || titles.is_empty() {
        return None;
    }

    if let Some(i) = titles.iter().position(|t| t.as_ref() == name) {
        return Some(i);
    }

    let lower = name.to_lowercase();
    if let Some(i) = titles.iter().position(|t| t.as_ref().to_lowercase() == lower) {
        return Some(i);
    }

    let substring = titles
        .iter()
        .enumerate()
        .filter(|(_, t)| {
            let t = t.as_ref().to_lowercase();
            t.contains(&lower) || lower.contains(&t)
        })
        .min_by_key(|(_, t)| t.as_ref().len())
        .map(|(i, _)| i);
    if substring.is_some() {
        return substring;
    }

    let query_words = words(&lower);
    titles
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let title_words = words(&t.as_ref().to_lowercase());
            let shared = query_words.iter().filter(|w| title_words.contains(w)).count();
            (i, shared)
        })
        .filter(|&(_, shared)| shared > 0)
        // max_by_key keeps the last maximum; prefer the earliest title instead.
        .fold(None, |best: Option<(usize, usize)>, (i, shared)| match best {
            Some((_, s)) if s >= shared => best,
            _ => Some((i, shared)),
        })
        .map(|(i, _)| i)
}

const STOP_WORDS: &[&str] = &["a", "an", "and", "the", "of", "to", "in", "on", "for", "with"];

fn words(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .map(String::from)
        .collect()
}
