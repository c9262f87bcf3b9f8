//! Configuration parsing and validation.
//!
//! Loaded from a TOML file, the same way the teacher's `config.rs` does,
//! with every option additionally overridable by an environment variable
//! of the same name upper-cased (matching the original Python service's
//! env-first `pydantic-settings` behavior).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    #[serde(default = "default_max_pages_per_document")]
    pub max_pages_per_document: u32,
    #[serde(default = "default_allowed_file_types")]
    pub allowed_file_types: Vec<String>,
    #[serde(default = "default_vector_dir")]
    pub chroma_persist_directory: PathBuf,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_cache_default_ttl")]
    pub cache_default_ttl: u64,
    #[serde(default = "default_cache_workspace_stats_ttl")]
    pub cache_workspace_stats_ttl: u64,
    #[serde(default = "default_cache_vector_search_ttl")]
    pub cache_vector_search_ttl: u64,
    #[serde(default = "default_cache_embedding_ttl")]
    pub cache_embedding_ttl: u64,
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    #[serde(default = "default_token_expire_minutes")]
    pub access_token_expire_minutes: i64,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: Some("text-embedding-3-small".to_string()),
            dims: Some(1536),
            batch_size: default_embedding_batch_size(),
            max_retries: default_embedding_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            base_url: default_llm_base_url(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./data/uploads")
}
fn default_max_file_size_mb() -> u64 {
    50
}
fn default_max_pages_per_document() -> u32 {
    100
}
fn default_allowed_file_types() -> Vec<String> {
    vec!["pdf".to_string(), "docx".to_string()]
}
fn default_vector_dir() -> PathBuf {
    PathBuf::from("./data/vectors.db")
}
fn default_cache_default_ttl() -> u64 {
    300
}
fn default_cache_workspace_stats_ttl() -> u64 {
    60
}
fn default_cache_vector_search_ttl() -> u64 {
    3600
}
fn default_cache_embedding_ttl() -> u64 {
    604_800
}
fn default_secret_key() -> String {
    "dev-secret-change-me".to_string()
}
fn default_token_expire_minutes() -> i64 {
    60 * 24
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_batch_size() -> usize {
    64
}
fn default_embedding_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

/// Environment-variable names that overlay onto the parsed TOML. Applied as
/// a second pass over the raw TOML table so the usual serde defaulting
/// still applies to anything left unset.
const ENV_OVERLAY_KEYS: &[&str] = &[
    "database_url",
    "openai_api_key",
    "upload_dir",
    "max_file_size_mb",
    "max_pages_per_document",
    "chroma_persist_directory",
    "redis_url",
    "cache_default_ttl",
    "cache_workspace_stats_ttl",
    "cache_vector_search_ttl",
    "cache_embedding_ttl",
    "secret_key",
    "access_token_expire_minutes",
    "environment",
    "log_level",
    "log_file",
];

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut value: toml::Value =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if let toml::Value::Table(table) = &mut value {
        for key in ENV_OVERLAY_KEYS {
            if let Ok(env_val) = std::env::var(key.to_ascii_uppercase()) {
                let parsed = if let Ok(i) = env_val.parse::<i64>() {
                    toml::Value::Integer(i)
                } else {
                    toml::Value::String(env_val)
                };
                table.insert(key.to_string(), parsed);
            }
        }
    }

    let config: Config = value
        .try_into()
        .with_context(|| "Failed to apply environment overlay to config")?;

    if config.max_file_size_mb == 0 {
        anyhow::bail!("max_file_size_mb must be > 0");
    }
    if config.max_pages_per_document == 0 {
        anyhow::bail!("max_pages_per_document must be > 0");
    }
    if config.embedding.is_enabled() && config.embedding.dims.is_none() {
        anyhow::bail!(
            "embedding.dims must be set when provider is '{}'",
            config.embedding.provider
        );
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!("Unknown embedding provider: '{}'", other),
    }

    Ok(config)
}
