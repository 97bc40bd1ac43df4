//! Intentd configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main intentd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gemini provider configuration
    pub gemini: GeminiConfig,

    /// Sampling configuration sent with every generation request
    pub sampling: SamplingConfig,

    /// Retry and backoff bounds
    pub retry: RetryConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Prompt template configuration
    pub prompts: PromptsConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .intentd.yml
        let local_config = PathBuf::from(".intentd.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/intentd/intentd.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("intentd").join("intentd.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load only the log level, before logging is initialized
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variables holding API keys, checked in order.
    /// Unset or empty variables are skipped, not an error.
    #[serde(rename = "api-key-env")]
    pub api_key_env: Vec<String>,

    /// Model candidates in fallback order, cheapest first
    pub models: Vec<String>,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: vec![
                "GEMINI_API_KEY".to_string(),
                "GEMINI_API_KEY_2".to_string(),
                "GEMINI_API_KEY_3".to_string(),
            ],
            models: vec![
                "gemini-2.0-flash-lite".to_string(),
                "gemini-2.5-flash-lite".to_string(),
                "gemini-2.0-flash".to_string(),
                "gemini-2.5-flash".to_string(),
            ],
            timeout_ms: 30_000,
        }
    }
}

impl GeminiConfig {
    /// Read the configured environment variables and return the keys that
    /// are actually set. An empty result is not an error here; generation
    /// attempts fail later if no credentials are available.
    pub fn load_keys(&self) -> Vec<String> {
        self.api_key_env
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .filter(|key| !key.trim().is_empty())
            .collect()
    }
}

/// Sampling configuration sent with every generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Sampling temperature
    pub temperature: f32,

    /// Nucleus sampling parameter
    #[serde(rename = "top-p")]
    pub top_p: f32,

    /// Top-k sampling parameter
    #[serde(rename = "top-k")]
    pub top_k: u32,

    /// Output token cap, sized to avoid truncated JSON
    #[serde(rename = "max-output-tokens")]
    pub max_output_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 4000,
        }
    }
}

/// Retry and backoff bounds for the generation client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries per model when the provider reports overload
    #[serde(rename = "overload-retries")]
    pub overload_retries: u32,

    /// Linear backoff step for overload retries (2s, 4s, 6s by default)
    #[serde(rename = "overload-backoff-ms")]
    pub overload_backoff_ms: u64,

    /// Retries per model on a generic retryable rate-limit signal
    #[serde(rename = "rate-limit-retries")]
    pub rate_limit_retries: u32,

    /// Fixed delay between rate-limit retries
    #[serde(rename = "rate-limit-delay-ms")]
    pub rate_limit_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            overload_retries: 3,
            overload_backoff_ms: 2_000,
            rate_limit_retries: 2,
            rate_limit_delay_ms: 2_000,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Prompt template configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Optional override directory for `.pmt` templates
    pub dir: Option<PathBuf>,
}
