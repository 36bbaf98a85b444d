//! `get_course_outline`: course title, link and lesson list.

use std::sync::Arc;

use async_trait::async_trait;
use lectern_core::error::{LecternError, Result};
use lectern_core::traits::{Tool, VectorIndex};
use lectern_core::types::{SourceRecord, ToolDefinition, ToolOutput};
use serde::Deserialize;
use serde_json::{Value, json};

pub const NAME: &str = "get_course_outline";

#[derive(Debug, Clone, Deserialize)]
pub struct OutlineArgs {
    pub course_title: String,
}

pub struct CourseOutlineTool {
    index: Arc<dyn VectorIndex>,
}

impl CourseOutlineTool {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    pub async fn outline(&self, args: &OutlineArgs) -> Result<ToolOutput> {
        let title = args.course_title.trim();
        match self.index.resolve_source(title).await? {
            Some(record) => Ok(ToolOutput::with_sources(
                format_outline(&record),
                vec![record.title.clone()],
            )),
            None => Ok(ToolOutput::message(format!(
                "No course found matching '{title}'. Please check the course title and try again."
            ))),
        }
    }
}

pub fn format_outline(record: &SourceRecord) -> String {
    let mut parts = vec![format!("**Course Title:** {}", record.title)];
    if let Some(link) = record.link.as_deref().filter(|l| !l.is_empty()) {
        parts.push(format!("**Course Link:** {link}"));
    }
    if let Some(instructor) = record.instructor.as_deref().filter(|i| !i.is_empty()) {
        parts.push(format!("**Instructor:** {instructor}"));
    }
    if record.sections.is_empty() {
        parts.push("**Lessons:** No lesson information available".into());
    } else {
        parts.push(format!("**Total Lessons:** {}", record.sections.len()));
        parts.push("\n**Course Outline:**".into());
        for section in &record.sections {
            parts.push(format!("  {}. {}", section.section_id, section.title));
        }
    }
    parts.join("\n")
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn name(&self) -> &str {
        NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.into(),
            description: "Get complete course outline including course title, link, and all lessons with their numbers and titles".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "course_title": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction', 'Build Rich-Context AI Apps')"
                    }
                },
                "required": ["course_title"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> Result<ToolOutput> {
        let args: OutlineArgs = serde_json::from_value(args.clone())
            .map_err(|e| LecternError::InvalidArgument(e.to_string()))?;
        self.outline(&args).await
    }
}
