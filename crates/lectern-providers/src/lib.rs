//! # Lectern Providers
//!
//! LLM chat and embedding backends.
//!
//! All chat providers (Anthropic, OpenAI, DeepSeek, Groq, Ollama and
//! `custom:<url>`) go through one `OpenAiCompatibleProvider`. Both factory
//! functions wrap what they build in bounded retry.

pub mod embedding;
pub mod openai_compatible;
pub mod provider_registry;
pub mod retry;

use std::sync::Arc;

use lectern_core::config::{EmbeddingConfig, LlmConfig};
use lectern_core::error::{LecternError, Result};
use lectern_core::traits::{Embedder, Provider};

pub use embedding::{HashingEmbedder, OpenAiEmbedder};
pub use openai_compatible::OpenAiCompatibleProvider;
pub use retry::{RetryPolicy, RetryingEmbedder, RetryingProvider, with_retry};

/// Create the chat provider named by `config.provider`.
pub fn create_provider(config: &LlmConfig) -> Result<Box<dyn Provider>> {
    let name = config.provider.as_str();
    let inner: Box<dyn Provider> = match name {
        other if other.starts_with("custom:") => {
            Box::new(OpenAiCompatibleProvider::custom(other, config)?)
        }
        _ => {
            let registry = provider_registry::get_provider_config(name)
                .ok_or_else(|| LecternError::ProviderNotFound(name.into()))?;
            Box::new(OpenAiCompatibleProvider::from_registry(registry, config)?)
        }
    };
    tracing::info!("🤖 LLM provider: {} (model {})", inner.name(), config.model);
    Ok(Box::new(RetryingProvider::new(
        inner,
        RetryPolicy::with_attempts(config.max_attempts),
    )))
}

/// Create the embedder named by `config.provider`.
pub fn create_embedder(config: &EmbeddingConfig, max_attempts: u32) -> Result<Arc<dyn Embedder>> {
    if config.provider == "hashing" {
        tracing::info!("🧮 Embeddings: local hashing ({} dims)", config.dimension);
        return Ok(Arc::new(HashingEmbedder::new(config.dimension)?));
    }
    let remote = OpenAiEmbedder::from_config(config)?;
    tracing::info!("🧮 Embeddings: {} ({})", remote.name(), config.model);
    Ok(Arc::new(RetryingEmbedder::new(
        Arc::new(remote),
        RetryPolicy::with_attempts(max_attempts),
    )))
}

/// List all available chat provider names.
pub fn available_providers() -> Vec<&'static str> {
    let mut names = provider_registry::all_provider_names();
    names.push("custom");
    names
}
