//! Provider registry — maps provider names to endpoint configurations.
//!
//! Every supported LLM speaks the OpenAI chat-completions dialect, so a
//! provider is nothing more than a base URL, an auth style and the env vars
//! that may hold its key.

/// How to attach auth credentials to requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// No authentication required (local servers).
    None,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: &'static str,
    pub base_url: &'static str,
    /// Appended to `base_url` for chat completions.
    pub chat_path: &'static str,
    /// Appended to `base_url` for embeddings, when the provider offers them.
    pub embeddings_path: Option<&'static str>,
    /// Environment variables to try for the API key, in order.
    pub env_keys: &'static [&'static str],
    pub auth_style: AuthStyle,
    /// Environment variable overriding the base URL (e.g. `OLLAMA_HOST`).
    pub base_url_env: Option<&'static str>,
    pub default_model: &'static str,
}

static PROVIDERS: &[ProviderConfig] = &[
    ProviderConfig {
        name: "anthropic",
        base_url: "https://api.anthropic.com/v1",
        chat_path: "/chat/completions",
        embeddings_path: None,
        env_keys: &["ANTHROPIC_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: None,
        default_model: "claude-3-5-sonnet-latest",
    },
    ProviderConfig {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        chat_path: "/chat/completions",
        embeddings_path: Some("/embeddings"),
        env_keys: &["OPENAI_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: None,
        default_model: "gpt-4o-mini",
    },
    ProviderConfig {
        name: "deepseek",
        base_url: "https://api.deepseek.com/v1",
        chat_path: "/chat/completions",
        embeddings_path: None,
        env_keys: &["DEEPSEEK_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: None,
        default_model: "deepseek-chat",
    },
    ProviderConfig {
        name: "groq",
        base_url: "https://api.groq.com/openai/v1",
        chat_path: "/chat/completions",
        embeddings_path: None,
        env_keys: &["GROQ_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: None,
        default_model: "llama-3.3-70b-versatile",
    },
    ProviderConfig {
        name: "ollama",
        base_url: "http://localhost:11434/v1",
        chat_path: "/chat/completions",
        embeddings_path: Some("/embeddings"),
        env_keys: &[],
        auth_style: AuthStyle::None,
        base_url_env: Some("OLLAMA_HOST"),
        default_model: "llama3.1",
    },
];

pub fn get_provider_config(name: &str) -> Option<&'static ProviderConfig> {
    PROVIDERS.iter().find(|p| p.name == name)
}

pub fn all_provider_names() -> Vec<&'static str> {
    PROVIDERS.iter().map(|p| p.name).collect()
}

impl ProviderConfig {
    /// Key from config if set, else the first env var present.
    pub fn resolve_api_key(&self, configured: &str) -> String {
        if !configured.is_empty() {
            return configured.to_string();
        }
        self.env_keys
            .iter()
            .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
            .unwrap_or_default()
    }

    /// Endpoint from config if set, else the env override, else the default.
    pub fn resolve_base_url(&self, configured: &str) -> String {
        if !configured.is_empty() {
            return configured.trim_end_matches('/').to_string();
        }
        self.base_url_env
            .and_then(|env_key| {
                let val = std::env::var(env_key).ok()?;
                // OLLAMA_HOST is usually given without the /v1 suffix
                if val.ends_with("/v1") {
                    Some(val)
                } else {
                    Some(format!("{}/v1", val.trim_end_matches('/')))
                }
            })
            .unwrap_or_else(|| self.base_url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_providers() {
        for name in ["anthropic", "openai", "deepseek", "groq", "ollama"] {
            assert!(get_provider_config(name).is_some(), "{name}");
        }
        assert!(get_provider_config("nonexistent").is_none());
        assert_eq!(all_provider_names().len(), 5);
    }

    #[test]
    fn test_local_provider_needs_no_auth() {
        let ollama = get_provider_config("ollama").unwrap();
        assert_eq!(ollama.auth_style, AuthStyle::None);
        assert!(ollama.env_keys.is_empty());
    }

    #[test]
    fn test_configured_values_win() {
        let openai = get_provider_config("openai").unwrap();
        assert_eq!(openai.resolve_api_key("sk-test"), "sk-test");
        assert_eq!(openai.resolve_base_url("http://proxy:8080/v1/"), "http://proxy:8080/v1");
        let deepseek = get_provider_config("deepseek").unwrap();
        assert_eq!(deepseek.resolve_base_url(""), "https://api.deepseek.com/v1");
    }
}
