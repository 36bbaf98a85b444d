//! Unified OpenAI-compatible chat provider.
//!
//! One struct serves every backend in the registry; they differ only in
//! endpoint URL, auth style and API key. Anthropic gets its system prompt as
//! a top-level `system` block with `cache_control`, so the long instruction
//! prompt is cached between queries.

use std::time::Duration;

use async_trait::async_trait;
use lectern_core::config::LlmConfig;
use lectern_core::error::{LecternError, Result};
use lectern_core::traits::provider::{GenerateParams, Provider};
use lectern_core::types::{
    FunctionCall, Message, ProviderResponse, Role, ToolCall, ToolDefinition, Usage,
};
use serde_json::{Value, json};

use crate::provider_registry::{AuthStyle, ProviderConfig};

pub struct OpenAiCompatibleProvider {
    name: String,
    api_key: String,
    base_url: String,
    chat_path: String,
    auth_style: AuthStyle,
    client: reqwest::Client,
}

fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .unwrap_or_default()
}

impl OpenAiCompatibleProvider {
    /// Resolution order: API key `llm.api_key` > env vars; base URL `llm.endpoint` > env override > registry default.
    pub fn from_registry(registry: &ProviderConfig, config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            name: registry.name.to_string(),
            api_key: registry.resolve_api_key(&config.api_key),
            base_url: registry.resolve_base_url(&config.endpoint),
            chat_path: registry.chat_path.to_string(),
            auth_style: registry.auth_style,
            client: http_client(config.request_timeout_secs),
        })
    }

    /// Custom endpoint, e.g. `custom:https://my-server.com/v1`.
    pub fn custom(endpoint: &str, config: &LlmConfig) -> Result<Self> {
        let base_url = endpoint
            .strip_prefix("custom:")
            .unwrap_or(endpoint)
            .trim_end_matches('/')
            .to_string();
        if base_url.is_empty() {
            return Err(LecternError::Config("custom provider needs a URL".into()));
        }

        let api_key = if !config.api_key.is_empty() {
            config.api_key.clone()
        } else {
            std::env::var("CUSTOM_API_KEY").unwrap_or_default()
        };
        let auth_style = if api_key.is_empty() {
            AuthStyle::None
        } else {
            AuthStyle::Bearer
        };

        Ok(Self {
            name: "custom".to_string(),
            api_key,
            base_url,
            chat_path: "/chat/completions".to_string(),
            auth_style,
            client: http_client(config.request_timeout_secs),
        })
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_style {
            AuthStyle::Bearer if !self.api_key.is_empty() => {
                req.header("Authorization", format!("Bearer {}", self.api_key))
            }
            _ => req,
        }
    }

    fn is_anthropic(&self) -> bool {
        self.name == "anthropic" || self.base_url.contains("anthropic")
    }

    /// Request body in the chat-completions shape.
    pub fn build_body(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        params: &GenerateParams,
    ) -> Result<Value> {
        let anthropic = self.is_anthropic();
        let mut body = json!({
            "model": params.model,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        if anthropic {
            let mut system_blocks = Vec::new();
            let mut rest = Vec::new();
            for msg in messages {
                if msg.role == Role::System {
                    system_blocks.push(json!({
                        "type": "text",
                        "text": msg.content,
                        "cache_control": { "type": "ephemeral" }
                    }));
                } else {
                    rest.push(serde_json::to_value(msg)?);
                }
            }
            if !system_blocks.is_empty() {
                body["system"] = Value::Array(system_blocks);
            }
            body["messages"] = Value::Array(rest);
        } else {
            body["messages"] = serde_json::to_value(messages)?;
        }

        if !tools.is_empty() {
            let defs = tools
                .iter()
                .map(|t| {
                    let mut def = json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    });
                    if anthropic {
                        def["cache_control"] = json!({ "type": "ephemeral" });
                    }
                    def
                })
                .collect();
            body["tools"] = Value::Array(defs);
        }
        Ok(body)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response> {
        let req = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        self.apply_auth(req).send().await.map_err(|e| {
            LecternError::Http(format!("{} connection failed ({}): {}", self.name, url, e))
        })
    }
}

/// Parse a chat-completions response.
pub fn parse_response(json: &Value) -> Result<ProviderResponse> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| LecternError::Provider("No choices in response".into()))?;

    let content = choice["message"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(String::from);

    let tool_calls = choice["message"]["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .enumerate()
                .filter_map(|(i, t)| {
                    let id = t["id"]
                        .as_str()
                        .map(String::from)
                        .unwrap_or_else(|| format!("call_{i}"));
                    // Some servers send arguments as an object rather than a string.
                    let arguments = match &t["function"]["arguments"] {
                        Value::String(s) => s.clone(),
                        Value::Null => "{}".to_string(),
                        other => other.to_string(),
                    };
                    Some(ToolCall {
                        id,
                        r#type: "function".to_string(),
                        function: FunctionCall {
                            name: t["function"]["name"].as_str()?.to_string(),
                            arguments,
                        },
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let usage = json["usage"].as_object().map(|u| {
        let n = |k: &str| u.get(k).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        Usage {
            prompt_tokens: n("prompt_tokens"),
            completion_tokens: n("completion_tokens"),
            total_tokens: n("total_tokens"),
        }
    });

    Ok(ProviderResponse {
        content,
        tool_calls,
        finish_reason: choice["finish_reason"].as_str().map(String::from),
        usage,
    })
}

fn rejects_tools(text: &str) -> bool {
    text.contains("does not support tools")
        || text.contains("tool_use is not supported")
        || text.contains("does not support function")
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        params: &GenerateParams,
    ) -> Result<ProviderResponse> {
        if self.auth_style != AuthStyle::None && self.api_key.is_empty() {
            return Err(LecternError::ApiKeyMissing(self.name.clone()));
        }

        let mut body = self.build_body(messages, tools, params)?;
        let url = format!("{}{}", self.base_url, self.chat_path);
        let mut resp = self.post(&url, &body).await?;

        if resp.status().as_u16() == 400 && !tools.is_empty() {
            let text = resp.text().await.unwrap_or_default();
            if !rejects_tools(&text) {
                return Err(LecternError::Provider(format!(
                    "{} API error 400 Bad Request: {}",
                    self.name, text
                )));
            }
            tracing::warn!(
                "⚠️ Model '{}' doesn't support tools — retrying without tools",
                params.model
            );
            if let Some(obj) = body.as_object_mut() {
                obj.remove("tools");
            }
            resp = self.post(&url, &body).await?;
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(LecternError::Provider(format!(
                "{} API error {}: {}",
                self.name, status, text
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| LecternError::Http(e.to_string()))?;
        parse_response(&json)
    }

    async fn health_check(&self) -> Result<bool> {
        if self.auth_style != AuthStyle::None {
            return Ok(!self.api_key.is_empty());
        }
        let url = format!("{}/models", self.base_url);
        Ok(self.client.get(&url).send().await.is_ok())
    }
}
