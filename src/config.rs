//! Configuration management for Clonar
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ClonarError, Result};
use crate::planner::PlanMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on concurrently issued sub-queries per action invocation
pub const MAX_SUB_QUERIES: usize = 3;

/// Main configuration structure for Clonar
///
/// Holds provider settings plus one section per pipeline component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// LLM provider configuration
    pub provider: ProviderConfig,

    /// Query repair settings
    #[serde(default)]
    pub normalizer: NormalizerConfig,

    /// Query planning settings
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Retrieval action settings
    #[serde(default)]
    pub actions: ActionsConfig,

    /// Session cache settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Provider configuration
///
/// Specifies which LLM provider to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model to use for Ollama
    #[serde(default = "default_ollama_model")]
    pub model: String,

    /// HTTP request timeout (seconds)
    #[serde(default = "default_ollama_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_timeout() -> u64 {
    120
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
            request_timeout_seconds: default_ollama_timeout(),
        }
    }
}

/// Query repair configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Sampling temperature for the repair prompt
    #[serde(default = "default_normalizer_temperature")]
    pub temperature: f32,

    /// Maximum completion tokens for the corrected query
    #[serde(default = "default_normalizer_max_tokens")]
    pub max_tokens: u32,

    /// Per-call timeout (seconds); on expiry the original query is kept
    #[serde(default = "default_normalizer_timeout")]
    pub timeout_seconds: u64,

    /// Apply the known-split dictionary when the provider fails
    #[serde(default)]
    pub heuristic_fallback: bool,
}

fn default_normalizer_temperature() -> f32 {
    0.1
}

fn default_normalizer_max_tokens() -> u32 {
    128
}

fn default_normalizer_timeout() -> u64 {
    5
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            temperature: default_normalizer_temperature(),
            max_tokens: default_normalizer_max_tokens(),
            timeout_seconds: default_normalizer_timeout(),
            heuristic_fallback: false,
        }
    }
}

impl NormalizerConfig {
    /// Per-call timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Query planning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Sampling temperature for the classification prompt
    #[serde(default)]
    pub temperature: f32,

    /// Maximum completion tokens for the plan JSON
    #[serde(default = "default_planner_max_tokens")]
    pub max_tokens: u32,

    /// Per-call timeout (seconds)
    #[serde(default = "default_planner_timeout")]
    pub timeout_seconds: u64,

    /// Mode used when the caller does not pick one: "quick" or "deep"
    #[serde(default = "default_planner_mode")]
    pub default_mode: String,

    /// Number of trailing history messages included in the prompt
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_planner_max_tokens() -> u32 {
    1024
}

fn default_planner_timeout() -> u64 {
    15
}

fn default_planner_mode() -> String {
    "deep".to_string()
}

fn default_history_window() -> usize {
    6
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: default_planner_max_tokens(),
            timeout_seconds: default_planner_timeout(),
            default_mode: default_planner_mode(),
            history_window: default_history_window(),
        }
    }
}

impl PlannerConfig {
    /// Per-call timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Retrieval action configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// Maximum sub-queries accepted per action call
    #[serde(default = "default_max_sub_queries")]
    pub max_sub_queries: usize,

    /// Results requested from the backend per sub-query
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,

    /// SerpAPI catalog search settings
    #[serde(default)]
    pub serpapi: SerpApiConfig,
}

fn default_max_sub_queries() -> usize {
    MAX_SUB_QUERIES
}

fn default_results_per_query() -> usize {
    5
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            max_sub_queries: default_max_sub_queries(),
            results_per_query: default_results_per_query(),
            serpapi: SerpApiConfig::default(),
        }
    }
}

/// SerpAPI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpApiConfig {
    /// Search endpoint
    #[serde(default = "default_serpapi_endpoint")]
    pub endpoint: String,

    /// API key (prefer env var SERPAPI_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Interface language (`hl`)
    #[serde(default = "default_serpapi_language")]
    pub language: String,

    /// Country (`gl`)
    #[serde(default = "default_serpapi_country")]
    pub country: String,

    /// Request timeout (seconds)
    #[serde(default = "default_serpapi_timeout")]
    pub timeout_seconds: u64,
}

fn default_serpapi_endpoint() -> String {
    "https://serpapi.com/search.json".to_string()
}

fn default_serpapi_language() -> String {
    "en".to_string()
}

fn default_serpapi_country() -> String {
    "us".to_string()
}

fn default_serpapi_timeout() -> u64 {
    30
}

impl Default for SerpApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_serpapi_endpoint(),
            api_key: None,
            language: default_serpapi_language(),
            country: default_serpapi_country(),
            timeout_seconds: default_serpapi_timeout(),
        }
    }
}

/// Session cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of live sessions
    #[serde(default = "default_session_capacity")]
    pub capacity: usize,

    /// Sessions idle longer than this are swept (seconds)
    #[serde(default = "default_session_ttl")]
    pub ttl_seconds: u64,

    /// Period of the background staleness sweep (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_session_capacity() -> usize {
    1000
}

fn default_session_ttl() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: default_session_capacity(),
            ttl_seconds: default_session_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl SessionConfig {
    /// Maximum idle age as a `Duration`
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Sweep period as a `Duration`
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON-formatted logs
    #[serde(default)]
    pub json_format: bool,

    /// Log file path (if None, STDERR only)
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default_config()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn default_config() -> Self {
        Self {
            provider: ProviderConfig {
                provider_type: "ollama".to_string(),
                ollama: OllamaConfig::default(),
            },
            normalizer: NormalizerConfig::default(),
            planner: PlannerConfig::default(),
            actions: ActionsConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ClonarError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ClonarError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(provider_type) = std::env::var("CLONAR_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        if let Ok(host) = std::env::var("CLONAR_OLLAMA_HOST") {
            self.provider.ollama.host = host;
        }

        if let Ok(model) = std::env::var("CLONAR_OLLAMA_MODEL") {
            self.provider.ollama.model = model;
        }

        if let Ok(mode) = std::env::var("CLONAR_PLANNER_MODE") {
            self.planner.default_mode = mode;
        }

        if let Ok(capacity) = std::env::var("CLONAR_SESSION_CAPACITY") {
            match capacity.parse() {
                Ok(value) => self.session.capacity = value,
                Err(_) => tracing::warn!("Ignoring invalid CLONAR_SESSION_CAPACITY: {}", capacity),
            }
        }

        if let Ok(ttl) = std::env::var("CLONAR_SESSION_TTL_SECONDS") {
            match ttl.parse() {
                Ok(value) => self.session.ttl_seconds = value,
                Err(_) => tracing::warn!("Ignoring invalid CLONAR_SESSION_TTL_SECONDS: {}", ttl),
            }
        }

        if let Ok(level) = std::env::var("CLONAR_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json_logs) = std::env::var("CLONAR_JSON_LOGS") {
            match json_logs.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.logging.json_format = true,
                "0" | "false" | "no" => self.logging.json_format = false,
                other => tracing::warn!("Ignoring invalid CLONAR_JSON_LOGS: {}", other),
            }
        }

        if let Ok(api_key) = std::env::var("SERPAPI_KEY") {
            self.actions.serpapi.api_key = Some(api_key);
        }

        if let Ok(endpoint) = std::env::var("SERPAPI_ENDPOINT") {
            self.actions.serpapi.endpoint = endpoint;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type.is_empty() {
            return Err(ClonarError::Config("Provider type cannot be empty".to_string()).into());
        }

        let valid_providers = ["ollama"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(ClonarError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        if !(0.0..=2.0).contains(&self.normalizer.temperature) {
            return Err(ClonarError::Config(
                "normalizer.temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        if self.normalizer.timeout_seconds == 0 || self.planner.timeout_seconds == 0 {
            return Err(ClonarError::Config(
                "normalizer and planner timeouts must be greater than 0".to_string(),
            )
            .into());
        }

        if self.planner.default_mode.parse::<PlanMode>().is_err() {
            return Err(ClonarError::Config(format!(
                "Invalid planner.default_mode: {}. Must be one of: quick, deep",
                self.planner.default_mode
            ))
            .into());
        }

        if self.actions.max_sub_queries == 0 || self.actions.max_sub_queries > MAX_SUB_QUERIES {
            return Err(ClonarError::Config(format!(
                "actions.max_sub_queries must be between 1 and {}",
                MAX_SUB_QUERIES
            ))
            .into());
        }

        if self.actions.results_per_query == 0 {
            return Err(ClonarError::Config(
                "actions.results_per_query must be greater than 0".to_string(),
            )
            .into());
        }

        if url::Url::parse(&self.actions.serpapi.endpoint).is_err() {
            return Err(ClonarError::Config(format!(
                "actions.serpapi.endpoint is not a valid URL: {}",
                self.actions.serpapi.endpoint
            ))
            .into());
        }

        if self.session.capacity == 0 {
            return Err(
                ClonarError::Config("session.capacity must be greater than 0".to_string()).into(),
            );
        }

        if self.session.ttl_seconds == 0 || self.session.sweep_interval_seconds == 0 {
            return Err(ClonarError::Config(
                "session.ttl_seconds and session.sweep_interval_seconds must be greater than 0"
                    .to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Planner mode configured as the default
    ///
    /// Falls back to `PlanMode::Deep` when the configured value does not parse;
    /// `validate` rejects such values up front.
    pub fn default_plan_mode(&self) -> PlanMode {
        self.planner.default_mode.parse().unwrap_or(PlanMode::Deep)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
