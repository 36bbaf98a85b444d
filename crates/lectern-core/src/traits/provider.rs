//! LLM provider trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Message, ProviderResponse, ToolDefinition};

/// Sampling parameters for one chat call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-latest".into(),
            temperature: 0.0,
            max_tokens: 800,
        }
    }
}

/// A chat-completion backend that may request tool calls.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// One completion. An empty `tools` slice means the model must answer in text.
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        params: &GenerateParams,
    ) -> Result<ProviderResponse>;

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
