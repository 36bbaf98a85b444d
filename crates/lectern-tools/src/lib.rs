//! # Lectern Tools
//!
//! Tools the LLM may call while answering, plus the bookkeeping around them.
//!
//! | Tool | Purpose |
//! |------|---------|
//! | `search_course_content` | Semantic search over lesson text, optionally filtered by course/lesson |
//! | `get_course_outline` | Course title, link and ordered lesson list |
//!
//! Every tool returns a [`ToolOutput`](lectern_core::types::ToolOutput)
//! carrying its own sources; the [`SourceLedger`] gathers them per query.

pub mod course_outline;
pub mod course_search;
pub mod ledger;
pub mod registry;

use std::sync::Arc;

use lectern_core::traits::VectorIndex;

pub use course_outline::CourseOutlineTool;
pub use course_search::CourseSearchTool;
pub use ledger::SourceLedger;
pub use registry::{ToolInvocation, ToolManager, validate_args};

/// Manager with both course tools registered.
pub fn course_tools(index: Arc<dyn VectorIndex>, max_results: usize) -> ToolManager {
    let mut manager = ToolManager::new();
    manager.register(Box::new(CourseSearchTool::new(index.clone(), max_results)));
    manager.register(Box::new(CourseOutlineTool::new(index)));
    manager
}
