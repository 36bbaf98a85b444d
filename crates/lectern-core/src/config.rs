//! Lectern configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LecternError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LecternConfig {
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl LecternConfig {
    /// Load config from the default path (~/.lectern/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LecternError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| LecternError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the given path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| LecternError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject option combinations the pipeline cannot honour.
    pub fn validate(&self) -> Result<()> {
        let rag = &self.rag;
        if rag.chunk_size == 0 {
            return Err(LecternError::InvalidArgument("rag.chunk_size must be positive".into()));
        }
        if rag.chunk_overlap >= rag.chunk_size {
            return Err(LecternError::InvalidArgument(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                rag.chunk_overlap, rag.chunk_size
            )));
        }
        if rag.max_search_results == 0 {
            return Err(LecternError::Config("rag.max_search_results must be positive".into()));
        }
        if rag.tool_call_iteration_cap == 0 {
            return Err(LecternError::Config(
                "rag.tool_call_iteration_cap must be positive".into(),
            ));
        }
        if self.embedding.provider == "hashing" && self.embedding.dimension == 0 {
            return Err(LecternError::Config("embedding.dimension must be positive".into()));
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Lectern home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".lectern")
    }
}

/// Retrieval and orchestration knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
    /// Exchanges (user + assistant pairs) shown to the LLM.
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
    #[serde(default = "default_tool_call_iteration_cap")]
    pub tool_call_iteration_cap: usize,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Inject top search results before the first LLM call.
    #[serde(default)]
    pub prefetch_context: bool,
    /// Stored transcript cap per session, 0 = unbounded.
    #[serde(default = "default_max_retained_messages")]
    pub max_retained_messages: usize,
}

fn default_chunk_size() -> usize { 800 }
fn default_chunk_overlap() -> usize { 100 }
fn default_max_search_results() -> usize { 5 }
fn default_max_history_turns() -> usize { 2 }
fn default_tool_call_iteration_cap() -> usize { 3 }
fn default_query_timeout_secs() -> u64 { 60 }
fn default_max_retained_messages() -> usize { 200 }

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_search_results: default_max_search_results(),
            max_history_turns: default_max_history_turns(),
            tool_call_iteration_cap: default_tool_call_iteration_cap(),
            query_timeout_secs: default_query_timeout_secs(),
            prefetch_context: false,
            max_retained_messages: default_max_retained_messages(),
        }
    }
}

/// Chat model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    /// Overrides the registry base URL when non-empty.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Attempts per backend call, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_llm_provider() -> String { "anthropic".into() }
fn default_llm_model() -> String { "claude-3-5-sonnet-latest".into() }
fn default_max_tokens() -> u32 { 800 }
fn default_max_attempts() -> u32 { 3 }
fn default_request_timeout_secs() -> u64 { 30 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key: String::new(),
            endpoint: String::new(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            max_attempts: default_max_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Embedding backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "hashing" (offline), "openai", "ollama" or "custom:<url>".
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

fn default_embedding_provider() -> String { "hashing".into() }
fn default_embedding_model() -> String { "all-MiniLM-L6-v2".into() }
fn default_embedding_dimension() -> usize { 384 }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            api_key: String::new(),
            endpoint: String::new(),
            dimension: default_embedding_dimension(),
        }
    }
}

/// Vector store persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String { "~/.lectern/index.db".into() }

impl StoreConfig {
    /// Store path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 { 8000 }
fn default_host() -> String { "127.0.0.1".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LecternConfig::default();
        assert_eq!(config.rag.chunk_size, 800);
        assert_eq!(config.rag.chunk_overlap, 100);
        assert_eq!(config.rag.max_search_results, 5);
        assert_eq!(config.rag.max_history_turns, 2);
        assert_eq!(config.rag.tool_call_iteration_cap, 3);
        assert_eq!(config.embedding.provider, "hashing");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [rag]
            chunk_size = 400
            chunk_overlap = 50
            prefetch_context = true

            [llm]
            provider = "deepseek"
            model = "deepseek-chat"
        "#;

        let config: LecternConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.rag.chunk_size, 400);
        assert_eq!(config.rag.chunk_overlap, 50);
        assert!(config.rag.prefetch_context);
        assert_eq!(config.rag.max_search_results, 5);
        assert_eq!(config.llm.provider, "deepseek");
        assert_eq!(config.llm.max_tokens, 800);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: LecternConfig = toml::from_str("").unwrap();
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.store.path, "~/.lectern/index.db");
    }

    #[test]
    fn test_validate_rejects_overlap_not_smaller() {
        let mut config = LecternConfig::default();
        config.rag.chunk_overlap = config.rag.chunk_size;
        assert!(matches!(config.validate(), Err(LecternError::InvalidArgument(_))));

        config.rag.chunk_size = 0;
        config.rag.chunk_overlap = 0;
        assert!(matches!(config.validate(), Err(LecternError::InvalidArgument(_))));

        let mut config = LecternConfig::default();
        config.rag.tool_call_iteration_cap = 0;
        assert!(matches!(config.validate(), Err(LecternError::Config(_))));
    }

    #[test]
    fn test_load_from_rejects_invalid_file() {
        let dir = std::env::temp_dir().join("lectern-config-test");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "[rag]\nchunk_size = 10\nchunk_overlap = 20\n").unwrap();
        assert!(LecternConfig::load_from(&path).is_err());

        let good = dir.join("good.toml");
        LecternConfig::default().save_to(&good).unwrap();
        let loaded = LecternConfig::load_from(&good).unwrap();
        assert_eq!(loaded.rag.chunk_size, 800);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_home_dir() {
        let home = LecternConfig::home_dir();
        assert!(home.to_string_lossy().contains("lectern"));
    }
}
