//! Structured-output chat completion client.
//!
//! Shared by the structure extractor, clause extractor, deduplicator, and
//! RAG generator — every place that needs the LLM to return JSON matching
//! a known shape rather than free text. The teacher's tree never calls a
//! chat/completions endpoint (only embeddings), so this module is net new;
//! it is grounded on the various `instructor.patch(OpenAI(...))` call sites
//! across `original_source/backend/src/services/*.py`, re-expressed with
//! this crate's own retry/backoff (C1) instead of `instructor`'s built-in
//! retry, and on the reqwest-based request idiom already used for
//! embeddings in `src/embedding/mod.rs`.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::config::LlmConfig;
use crate::errors::AppError;
use crate::retry::{self, Classify, RetryConfig};

pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

struct LlmError {
    message: String,
    retryable: bool,
    retry_after_secs: Option<u64>,
}

impl Classify for LlmError {
    fn is_retryable(&self) -> bool {
        self.retryable
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

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set")?;
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.clone(),
        })
    }

    /// Is a model configured and an API key present? Callers that treat the
    /// LLM as optional (e.g. falling back to deterministic-only extraction)
    /// check this before calling [`Self::complete_json`].
    pub fn is_available() -> bool {
        std::env::var("OPENAI_API_KEY").is_ok()
    }

    /// Run a chat completion constrained to JSON output and deserialize the
    /// response content into `T`. Retries transient failures through C1;
    /// a response that parses but fails schema validation is treated as
    /// non-retryable, since retrying the exact same prompt will not fix a
    /// malformed structured output.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<T> {
        let retry_cfg = RetryConfig::default();
        let raw = retry::with_retry(&retry_cfg, || {
            self.complete_once(system_prompt, user_prompt)
        })
        .await
        .map_err(|e| {
            anyhow::Error::from(AppError::from_external_failure(
                "llm",
                e.retryable,
                e.retry_after_secs,
                e.message,
            ))
        })?;

        serde_json::from_str(&raw)
            .with_context(|| format!("LLM response did not match expected schema: {}", raw))
    }

    async fn complete_once(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "response_format": {"type": "json_object"},
            "temperature": 0.0,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError {
                message: format!("LLM request failed: {}", e),
                retryable: true,
                retry_after_secs: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            let retryable = status.as_u16() == 429 || status.is_server_error();
            let retry_after_secs = if status.as_u16() == 429 {
                retry_after_from_headers(&response)
            } else {
                None
            };
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError {
                message: format!("LLM API error {}: {}", status, text),
                retryable,
                retry_after_secs,
            });
        }

        let json: serde_json::Value = response.json().await.map_err(|e| LlmError {
            message: format!("LLM response was not valid JSON: {}", e),
            retryable: true,
            retry_after_secs: None,
        })?;

        json.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError {
                message: "LLM response missing choices[0].message.content".to_string(),
                retryable: false,
                retry_after_secs: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct Dummy {
        #[allow(dead_code)]
        ok: bool,
    }

    #[test]
    fn is_available_reflects_env() {
        std::env::remove_var("OPENAI_API_KEY");
        assert!(!LlmClient::is_available());
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        assert!(LlmClient::is_available());
        std::env::remove_var("OPENAI_API_KEY");
    }

    #[test]
    fn new_requires_api_key() {
        std::env::remove_var("OPENAI_API_KEY");
        let config = LlmConfig {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        };
        assert!(LlmClient::new(&config).is_err());
    }
}
