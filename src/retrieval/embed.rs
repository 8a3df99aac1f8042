//! Embedding functions: local feature hashing and a remote endpoint.

use super::{l2_normalize, Embedder, RetrievalError};
use crate::config::EmbeddingConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Signed feature hashing over lowercase word unigrams and bigrams.
/// Deterministic and offline; similar vocabulary gives similar vectors.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let h = Sha256::digest(token.as_bytes());
        let mut idx = [0u8; 8];
        idx.copy_from_slice(&h[..8]);
        let idx = u64::from_le_bytes(idx) as usize % self.dimension;
        let sign = if h[8] & 1 == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();
        let mut v = vec![0.0f32; self.dimension];
        for t in &tokens {
            let (i, s) = self.bucket(t);
            v[i] += s;
        }
        for pair in tokens.windows(2) {
            let (i, s) = self.bucket(&format!("{} {}", pair[0], pair[1]));
            v[i] += 0.5 * s;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI-compatible `/embeddings` endpoint.
pub struct RemoteEmbedder {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl RemoteEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, RetrievalError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                RetrievalError::Embedding(format!("API key variable `{}` is not set", config.api_key_env))
            })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }
}

impl Embedder for RemoteEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let url = format!("{}/embeddings", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().unwrap_or_default();
            return Err(RetrievalError::Embedding(format!("{} {}", status, text)));
        }
        let mut parsed: EmbeddingResponse = res
            .json()
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;
        if parsed.data.len() != texts.len() {
            return Err(RetrievalError::CountMismatch {
                expected: texts.len(),
                got: parsed.data.len(),
            });
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed
            .data
            .into_iter()
            .map(|d| {
                let mut v = d.embedding;
                l2_normalize(&mut v);
                v
            })
            .collect())
    }
}
