//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]** — absent/no-op; used when embeddings are not configured.
//! - **[`OpenAIProvider`]** — calls the OpenAI embeddings API with batching, retry, and backoff.
//! - **[`OllamaProvider`]** — calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`LocalProvider`]** — runs models locally via fastembed (primary) or tract (musl/Intel Mac).
//!
//! [`embed_one`] and [`embed_batch`] are the entry points the rest of the
//! crate uses: they apply the 32,000-char truncation, the cache key scheme
//! `embedding:{model}:{hash_text}`, and absent-on-empty-input semantics
//! (grounded on `original_source/backend/src/services/embedding_service.py`),
//! then delegate to the provider dispatch below.
//!
//! Also provides vector utilities for the vector store:
//! - [`cosine_similarity`] — compute similarity between two embedding vectors
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes for SQLite BLOB storage
//! - [`blob_to_vec`] — decode a SQLite BLOB back into a `Vec<f32>`

#[cfg(feature = "local-embeddings-tract")]
mod local_tract;

use anyhow::{bail, Result};
use std::time::Duration;

use crate::cache::{self, Cache, EMBEDDING_TTL};
use crate::config::EmbeddingConfig;
use crate::errors::AppError;
use crate::retry::{self, Classify, RetryConfig};

/// Texts longer than this are truncated before being sent to the provider
/// (`embedding_service.py`'s `text[:32000]`).
const MAX_EMBED_CHARS: usize = 32_000;

pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;
}

struct EmbedError {
    message: String,
    retryable: bool,
    retry_after_secs: Option<u64>,
}

impl Classify for EmbedError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl Default for EmbedError {
    fn default() -> Self {
        EmbedError {
            message: String::new(),
            retryable: false,
            retry_after_secs: None,
        }
    }
}

impl From<reqwest::Error> for EmbedError {
    fn from(e: reqwest::Error) -> Self {
        EmbedError {
            message: e.to_string(),
            retryable: true,
            retry_after_secs: None,
        }
    }
}

/// Parse a `Retry-After` response header (seconds form) into a retry hint.
fn retry_after_from_headers(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

/// Embed one piece of text. Returns `None` (not an error) when the text is
/// empty/blank or the provider is disabled — callers tolerate holes in the
/// resulting index rather than treating them as failures.
pub async fn embed_one(
    cache: &Cache,
    config: &EmbeddingConfig,
    text: &str,
) -> Result<Option<Vec<f32>>> {
    if text.trim().is_empty() || !config.is_enabled() {
        return Ok(None);
    }
    let truncated = truncate_chars(text, MAX_EMBED_CHARS);
    let model = config.model.clone().unwrap_or_default();
    let key = format!("embedding:{}:{}", model, cache::hash_text(&truncated));

    if let Some(cached) = cache.get::<Vec<f32>>(&key).await {
        return Ok(Some(cached));
    }

    let results = embed_texts_retried(config, &[truncated]).await?;
    let vector = results.into_iter().next();
    if let Some(ref v) = vector {
        cache.set(&key, v, EMBEDDING_TTL).await;
    }
    Ok(vector)
}

/// Embed a batch of texts, aligned with the input: empty/blank texts and a
/// disabled provider produce `None` in the corresponding slot; a total
/// provider failure produces `None` for the whole batch (non-fatal to the
/// caller, per the source contract).
pub async fn embed_batch(
    cache: &Cache,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Vec<Option<Vec<f32>>> {
    if !config.is_enabled() {
        return vec![None; texts.len()];
    }

    let mut to_fetch_idx = Vec::new();
    let mut to_fetch_text = Vec::new();
    let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
    let model = config.model.clone().unwrap_or_default();

    for (i, text) in texts.iter().enumerate() {
        if text.trim().is_empty() {
            continue;
        }
        let truncated = truncate_chars(text, MAX_EMBED_CHARS);
        let key = format!("embedding:{}:{}", model, cache::hash_text(&truncated));
        if let Some(cached) = cache.get::<Vec<f32>>(&key).await {
            out[i] = Some(cached);
        } else {
            to_fetch_idx.push(i);
            to_fetch_text.push(truncated);
        }
    }

    if to_fetch_text.is_empty() {
        return out;
    }

    match embed_texts_retried(config, &to_fetch_text).await {
        Ok(vectors) => {
            for ((slot, truncated), vector) in to_fetch_idx
                .into_iter()
                .zip(to_fetch_text.into_iter())
                .zip(vectors.into_iter())
            {
                let key = format!("embedding:{}:{}", model, cache::hash_text(&truncated));
                cache.set(&key, &vector, EMBEDDING_TTL).await;
                out[slot] = Some(vector);
            }
            out
        }
        Err(e) => {
            crate::logging::warn("embedding_batch_failed", &e.to_string());
            vec![None; texts.len()]
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

async fn embed_texts_retried(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let retry_cfg = RetryConfig::embedding();
    retry::with_retry(&retry_cfg, || embed_texts_once(config, texts))
        .await
        .map_err(|e| {
            AppError::from_external_failure(
                format!("embedding:{}", config.provider),
                e.retryable,
                e.retry_after_secs,
                e.message,
            )
            .into()
        })
}

async fn embed_texts_once(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
    match config.provider.as_str() {
        "openai" => embed_openai(config, texts).await,
        "ollama" => embed_ollama(config, texts).await,
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => embed_local_fastembed(config, texts)
            .await
            .map_err(|e| EmbedError { message: e.to_string(), ..Default::default() }),
        #[cfg(all(feature = "local-embeddings-tract", not(feature = "local-embeddings-fastembed")))]
        "local" => embed_local_tract(config, texts)
            .await
            .map_err(|e| EmbedError { message: e.to_string(), retryable: false, retry_after_secs: None }),
        #[cfg(not(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract")))]
        "local" => Err(EmbedError {
            message: "local embedding provider requires a local-embeddings feature".to_string(),
            retryable: false,
            retry_after_secs: None,
        }),
        "disabled" => Err(EmbedError {
            message: "embedding provider is disabled".to_string(),
            retryable: false,
            retry_after_secs: None,
        }),
        other => Err(EmbedError {
            message: format!("unknown embedding provider: {}", other),
            retryable: false,
            retry_after_secs: None,
        }),
    }
}

// ============ Disabled Provider ============

pub struct DisabledProvider;

impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
}

// ============ OpenAI Provider ============

pub struct OpenAIProvider {
    model: String,
    dims: usize,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }
        Ok(Self { model, dims })
    }
}

impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

async fn embed_openai(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
    let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| EmbedError {
        message: "OPENAI_API_KEY not set".to_string(),
        retryable: false,
        retry_after_secs: None,
    })?;
    let model = config.model.as_deref().ok_or_else(|| EmbedError {
        message: "embedding.model required".to_string(),
        retryable: false,
        retry_after_secs: None,
    })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({ "model": model, "input": texts });

    let response = client
        .post("https://api.openai.com/v1/embeddings")
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EmbedError { message: e.to_string(), retryable: true, retry_after_secs: None })?;
        return parse_openai_response(&json);
    }

    let retryable = status.as_u16() == 429 || status.is_server_error();
    let retry_after_secs = if status.as_u16() == 429 {
        retry_after_from_headers(&response)
    } else {
        None
    };
    let body_text = response.text().await.unwrap_or_default();
    Err(EmbedError {
        message: format!("OpenAI API error {}: {}", status, body_text),
        retryable,
        retry_after_secs,
    })
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EmbedError {
            message: "invalid OpenAI response: missing data array".to_string(),
            retryable: false,
            retry_after_secs: None,
        })?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| EmbedError {
                message: "invalid OpenAI response: missing embedding".to_string(),
                retryable: false,
                retry_after_secs: None,
            })?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }
    Ok(embeddings)
}

// ============ Ollama Provider ============

pub struct OllamaProvider {
    model: String,
    dims: usize,
    #[allow(dead_code)]
    url: String,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        Ok(Self { model, dims, url })
    }
}

impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

async fn embed_ollama(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
    let model = config.model.as_deref().ok_or_else(|| EmbedError {
        message: "embedding.model required".to_string(),
        retryable: false,
        retry_after_secs: None,
    })?;
    let url = config.url.as_deref().unwrap_or("http://localhost:11434");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({ "model": model, "input": texts });

    let response = client
        .post(format!("{}/api/embed", url))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| EmbedError {
            message: format!("Ollama connection error (is Ollama running at {}?): {}", url, e),
            retryable: true,
            retry_after_secs: None,
        })?;

    let status = response.status();
    if status.is_success() {
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EmbedError { message: e.to_string(), retryable: true, retry_after_secs: None })?;
        return parse_ollama_response(&json);
    }

    let retryable = status.as_u16() == 429 || status.is_server_error();
    let retry_after_secs = if status.as_u16() == 429 {
        retry_after_from_headers(&response)
    } else {
        None
    };
    let body_text = response.text().await.unwrap_or_default();
    Err(EmbedError {
        message: format!("Ollama API error {}: {}", status, body_text),
        retryable,
        retry_after_secs,
    })
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| EmbedError {
            message: "invalid Ollama response: missing embeddings array".to_string(),
            retryable: false,
            retry_after_secs: None,
        })?;

    let mut result = Vec::with_capacity(embeddings.len());
    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| EmbedError {
                message: "invalid Ollama response: embedding is not an array".to_string(),
                retryable: false,
                retry_after_secs: None,
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }
    Ok(result)
}

// ============ Local Provider (fastembed or tract) ============

#[cfg(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"))]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
}

#[cfg(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"))]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config)?;
        Ok(Self { model_name, dims })
    }
}

#[cfg(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"))]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

#[cfg(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"))]
fn resolve_local_model(config: &EmbeddingConfig) -> Result<(String, usize)> {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| "all-minilm-l6-v2".to_string());

    let dims = config.dims.unwrap_or(match model_name.as_str() {
        "all-minilm-l6-v2" => 384,
        "bge-small-en-v1.5" => 384,
        "bge-base-en-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "multilingual-e5-small" => 384,
        "multilingual-e5-base" => 768,
        "multilingual-e5-large" => 1024,
        _ => 384,
    });

    Ok((model_name, dims))
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => bail!("Unknown local embedding model: '{}'", other),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
async fn embed_local_fastembed(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| "all-minilm-l6-v2".to_string());

    let fastembed_model = config_to_fastembed_model(&model_name)?;
    let batch_size = config.batch_size;
    let texts = texts.to_vec();

    tokio::task::spawn_blocking(move || {
        let mut model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
        )
        .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))?;

        model
            .embed(texts, Some(batch_size))
            .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
    })
    .await?
}

#[cfg(all(feature = "local-embeddings-tract", not(feature = "local-embeddings-fastembed")))]
async fn embed_local_tract(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    local_tract::embed_local_tract(config, texts).await
}

pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        #[cfg(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"))]
        "local" => Ok(Box::new(LocalProvider::new(config)?)),
        #[cfg(not(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract")))]
        "local" => bail!("local embedding provider requires a local-embeddings feature"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty() {
        let sim = cosine_similarity(&[], &[]);
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_cosine_different_lengths() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0];
        let sim = cosine_similarity(&a, &b);
        assert_eq!(sim, 0.0);
    }

    #[tokio::test]
    async fn embed_one_empty_text_is_absent() {
        let cache = Cache::in_memory();
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            ..EmbeddingConfig::default()
        };
        let result = embed_one(&cache, &config, "   ").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn embed_one_disabled_provider_is_absent() {
        let cache = Cache::in_memory();
        let config = EmbeddingConfig::default();
        assert!(!config.is_enabled());
        let result = embed_one(&cache, &config, "hello").await.unwrap();
        assert!(result.is_none());
    }
}
