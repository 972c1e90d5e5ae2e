//! Application configuration for LexRisk.
//!
//! User config lives at `~/.lexrisk/lexrisk.toml`.
//! Missing sections and fields fall back to built-in defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LexRiskError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "lexrisk.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".lexrisk";

/// Default history database file name inside the config directory.
const HISTORY_DB_NAME: &str = "history.db";

// ---------------------------------------------------------------------------
// Config structs (matching lexrisk.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chunking and document limits.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Indexing / similarity-search microservice.
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Analysis history storage.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[analysis]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum characters per chunk sent to the reasoning service.
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Documents longer than this are rejected before any call is made.
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            max_document_chars: default_max_document_chars(),
        }
    }
}

fn default_max_chunk_chars() -> usize {
    12_000
}
fn default_max_document_chars() -> usize {
    1_000_000
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for chunk analysis.
    #[serde(default = "default_model")]
    pub model: String,

    /// Chat-completions endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_reasoning_timeout")]
    pub timeout_secs: u64,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Upper bound on generated tokens per chunk.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Value of the `HTTP-Referer` attribution header.
    #[serde(default = "default_referer")]
    pub referer: String,

    /// Value of the `X-Title` attribution header.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_reasoning_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            referer: default_referer(),
            title: default_title(),
        }
    }
}

impl OpenRouterConfig {
    /// Parse the configured endpoint.
    pub fn endpoint_url(&self) -> Result<Url> {
        Url::parse(&self.endpoint).map_err(|e| {
            LexRiskError::config(format!("invalid OpenRouter endpoint '{}': {e}", self.endpoint))
        })
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "deepseek/deepseek-r1-0528:free".into()
}
fn default_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".into()
}
fn default_reasoning_timeout() -> u64 {
    120
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_referer() -> String {
    "https://legally.kz".into()
}
fn default_title() -> String {
    "Legally AI Risk Analyzer".into()
}

/// `[indexing]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Whether completed analyses are pushed to the embedding service.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the embedding/search microservice.
    #[serde(default = "default_indexing_endpoint")]
    pub endpoint: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_indexing_timeout")]
    pub timeout_secs: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_indexing_endpoint(),
            timeout_secs: default_indexing_timeout(),
        }
    }
}

impl IndexingConfig {
    /// Parse the configured base URL.
    pub fn endpoint_url(&self) -> Result<Url> {
        Url::parse(&self.endpoint).map_err(|e| {
            LexRiskError::config(format!("invalid indexing endpoint '{}': {e}", self.endpoint))
        })
    }
}

fn default_true() -> bool {
    true
}
fn default_indexing_endpoint() -> String {
    "http://localhost:8081".into()
}
fn default_indexing_timeout() -> u64 {
    30
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// History database path. Defaults to `~/.lexrisk/history.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_db: Option<String>,
}

impl StorageConfig {
    /// Resolve the history database path.
    pub fn history_db_path(&self) -> Result<PathBuf> {
        match &self.history_db {
            Some(p) => Ok(PathBuf::from(p)),
            None => Ok(config_dir()?.join(HISTORY_DB_NAME)),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.lexrisk/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LexRiskError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.lexrisk/lexrisk.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LexRiskError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        LexRiskError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    if config.analysis.max_chunk_chars == 0 {
        return Err(LexRiskError::config("analysis.max_chunk_chars must be > 0"));
    }

    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LexRiskError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LexRiskError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LexRiskError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the OpenRouter API key from the configured env var.
///
/// Fails with a config error when the variable is unset or empty.
pub fn validate_api_key(config: &OpenRouterConfig) -> Result<String> {
    let var_name = &config.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(LexRiskError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}
