//! Embedding providers.
//!
//! - `hashing`: feature-hashed word unigrams, L2-normalised. Offline and
//!   deterministic; ranks by shared vocabulary.
//! - `openai` / `ollama` / `custom:<url>`: any `/embeddings` endpoint in the
//!   OpenAI shape.

use std::time::Duration;

use async_trait::async_trait;
use lectern_core::config::EmbeddingConfig;
use lectern_core::error::{LecternError, Result};
use lectern_core::traits::Embedder;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::provider_registry::{AuthStyle, get_provider_config};

/// Inputs per `/embeddings` request.
const BATCH_SIZE: usize = 64;

pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(LecternError::Config("embedding dimension must be > 0".into()));
        }
        Ok(Self { dimension })
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let digest = Sha256::digest(word.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}

/// Remote `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    name: String,
    url: String,
    api_key: String,
    auth_style: AuthStyle,
    model: String,
    dimension: usize,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let (name, url, api_key, auth_style) =
            if let Some(endpoint) = config.provider.strip_prefix("custom:") {
                let key = config.api_key.clone();
                let auth = if key.is_empty() { AuthStyle::None } else { AuthStyle::Bearer };
                (
                    "custom".to_string(),
                    format!("{}/embeddings", endpoint.trim_end_matches('/')),
                    key,
                    auth,
                )
            } else {
                let registry = get_provider_config(&config.provider)
                    .ok_or_else(|| LecternError::ProviderNotFound(config.provider.clone()))?;
                let path = registry.embeddings_path.ok_or_else(|| {
                    LecternError::Config(format!("{} does not offer embeddings", registry.name))
                })?;
                (
                    registry.name.to_string(),
                    format!("{}{}", registry.resolve_base_url(&config.endpoint), path),
                    registry.resolve_api_key(&config.api_key),
                    registry.auth_style,
                )
            };

        Ok(Self {
            name,
            url,
            api_key,
            auth_style,
            model: config.model.clone(),
            dimension: config.dimension,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        })
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.auth_style != AuthStyle::None && self.api_key.is_empty() {
            return Err(LecternError::ApiKeyMissing(self.name.clone()));
        }
        let mut req = self
            .client
            .post(&self.url)
            .json(&json!({ "model": self.model, "input": inputs }));
        if self.auth_style == AuthStyle::Bearer && !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| LecternError::Http(format!("{} embeddings failed: {}", self.name, e)))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(LecternError::Provider(format!(
                "{} embeddings error {}: {}",
                self.name, status, text
            )));
        }
        let json: Value = resp
            .json()
            .await
            .map_err(|e| LecternError::Http(e.to_string()))?;
        parse_embeddings(&json, inputs.len())
    }
}

/// Pull `data[].embedding` out of a response, ordered by `index`.
pub fn parse_embeddings(json: &Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json["data"]
        .as_array()
        .ok_or_else(|| LecternError::Provider("No data in embeddings response".into()))?;

    let mut rows: Vec<(usize, Vec<f32>)> = data
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let index = item["index"].as_u64().map(|n| n as usize).unwrap_or(i);
            let vector = item["embedding"]
                .as_array()
                .map(|xs| xs.iter().filter_map(|x| x.as_f64()).map(|x| x as f32).collect())
                .unwrap_or_default();
            (index, vector)
        })
        .collect();
    rows.sort_by_key(|(i, _)| *i);

    if rows.len() != expected {
        return Err(LecternError::Provider(format!(
            "expected {expected} embeddings, got {}",
            rows.len()
        )));
    }
    Ok(rows.into_iter().map(|(_, v)| v).collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| LecternError::Provider("empty embeddings response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            out.extend(self.request(batch).await?);
        }
        Ok(out)
    }
}
