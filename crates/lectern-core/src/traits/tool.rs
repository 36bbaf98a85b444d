//! Tool trait for LLM-callable functions.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{ToolDefinition, ToolOutput};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn definition(&self) -> ToolDefinition;

    /// Run with an already-decoded argument object.
    async fn execute(&self, args: &Value) -> Result<ToolOutput>;
}
