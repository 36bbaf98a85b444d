//! `search_course_content`: semantic search over lesson text.

use std::sync::Arc;

use async_trait::async_trait;
use lectern_core::error::{LecternError, Result};
use lectern_core::traits::{Tool, VectorIndex};
use lectern_core::types::{SearchFilter, SearchResults, ToolDefinition, ToolOutput};
use serde::Deserialize;
use serde_json::{Value, json};

pub const NAME: &str = "search_course_content";

#[derive(Debug, Clone, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub lesson_number: Option<u32>,
}

pub struct CourseSearchTool {
    index: Arc<dyn VectorIndex>,
    max_results: usize,
}

impl CourseSearchTool {
    pub fn new(index: Arc<dyn VectorIndex>, max_results: usize) -> Self {
        Self { index, max_results }
    }

    pub async fn search(&self, args: &SearchArgs) -> Result<ToolOutput> {
        if args.query.trim().is_empty() {
            return Ok(ToolOutput::message(
                "Error: Query cannot be empty. Please provide a search query.",
            ));
        }
        let filter = SearchFilter {
            source_title: args.course_name.clone().filter(|c| !c.trim().is_empty()),
            section_id: args.lesson_number,
        };
        let results = self.index.query(&args.query, self.max_results, &filter).await?;
        tracing::debug!("🔎 '{}'{} → {} hits", args.query, filter.describe(), results.len());
        Ok(format_results(&results, &filter))
    }
}

/// `[label]\ncontent` blocks separated by blank lines; one source per hit.
pub fn format_results(results: &SearchResults, filter: &SearchFilter) -> ToolOutput {
    if results.is_empty() {
        let text = match &results.reason {
            Some(reason) => format!("{reason}."),
            None => format!("No relevant content found{}.", filter.describe()),
        };
        return ToolOutput::message(text);
    }

    let mut blocks = Vec::with_capacity(results.len());
    let mut sources = Vec::with_capacity(results.len());
    for hit in &results.hits {
        let label = hit.chunk.label();
        blocks.push(format!("[{label}]\n{}", hit.chunk.content));
        sources.push(label);
    }
    ToolOutput::with_sources(blocks.join("\n\n"), sources)
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn name(&self) -> &str {
        NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.into(),
            description: "Search course materials with smart course name matching and lesson filtering".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> Result<ToolOutput> {
        let args: SearchArgs = serde_json::from_value(args.clone())
            .map_err(|e| LecternError::InvalidArgument(e.to_string()))?;
        self.search(&args).await
    }
}
