//! Per-query record of which sources the tools drew on.

/// Latest sources per tool for one query, in invocation order.
///
/// A tool invoked again replaces its earlier entry and moves to the end, so
/// a follow-up search that finds nothing wipes what the first one found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceLedger {
    entries: Vec<(String, Vec<String>)>,
}

impl SourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tool_name: &str, sources: Vec<String>) {
        self.entries.retain(|(name, _)| name != tool_name);
        self.entries.push((tool_name.to_string(), sources));
    }

    /// All recorded sources, deduplicated, first occurrence wins.
    pub fn last_sources(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for source in self.entries.iter().flat_map(|(_, s)| s) {
            if !out.contains(source) {
                out.push(source.clone());
            }
        }
        out
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, s)| s.is_empty())
    }
}
