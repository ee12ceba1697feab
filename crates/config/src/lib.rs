//! Configuration loading, validation, and management for the research agent.
//!
//! Loads configuration from `~/.sgr-research/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.sgr-research/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM endpoint and sampling settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Web search backend
    #[serde(default)]
    pub search: SearchConfig,

    /// Content truncation limits
    #[serde(default)]
    pub scraping: ScrapingConfig,

    /// Budgets and output directories
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// System prompt customization
    #[serde(default)]
    pub prompts: PromptsConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible endpoint root
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Optional HTTP(S) proxy for LLM requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_max_tokens() -> u32 {
    8000
}
fn default_temperature() -> f32 {
    0.4
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            proxy: None,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("proxy", &self.proxy)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Results per search when the model does not ask for a count
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_search_base_url() -> String {
    "https://api.tavily.com".into()
}
fn default_max_results() -> usize {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_search_base_url(),
            max_results: default_max_results(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("max_results", &self.max_results)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingConfig {
    /// Characters per source shown in search results
    #[serde(default = "default_content_limit")]
    pub content_limit: usize,

    /// Characters per page shown in extraction results
    #[serde(default = "default_extraction_limit")]
    pub extraction_limit: usize,
}

fn default_content_limit() -> usize {
    1500
}
fn default_extraction_limit() -> usize {
    5000
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            content_limit: default_content_limit(),
            extraction_limit: default_extraction_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_max_searches")]
    pub max_searches: u32,

    #[serde(default = "default_max_clarifications")]
    pub max_clarifications: u32,

    /// Searches kept verbatim in the context after pruning
    #[serde(default = "default_searches_to_keep")]
    pub max_searches_to_keep: usize,

    #[serde(default = "default_true")]
    pub allow_clarification: bool,

    /// Give up waiting for a clarification after this many seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_timeout_secs: Option<u64>,

    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
}

fn default_max_iterations() -> u32 {
    6
}
fn default_max_searches() -> u32 {
    4
}
fn default_max_clarifications() -> u32 {
    3
}
fn default_searches_to_keep() -> usize {
    1
}
fn default_true() -> bool {
    true
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_searches: default_max_searches(),
            max_clarifications: default_max_clarifications(),
            max_searches_to_keep: default_searches_to_keep(),
            allow_clarification: true,
            clarification_timeout_secs: None,
            reports_dir: default_reports_dir(),
            logs_dir: default_logs_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Replace the built-in system prompt template. Supports the
    /// `{user_request}`, `{current_date}`, `{available_tools}`,
    /// `{sources_formatted}` and `{previous_searches}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.sgr-research/config.toml).
    ///
    /// Environment variables override the file:
    /// - `SGR_RESEARCH_API_KEY`, then `OPENAI_API_KEY`
    /// - `TAVILY_API_KEY`
    /// - `SGR_RESEARCH_MODEL`
    /// - `SGR_RESEARCH_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load a specific file, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("SGR_RESEARCH_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(key) = lookup("TAVILY_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(model) = lookup("SGR_RESEARCH_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("SGR_RESEARCH_BASE_URL") {
            self.llm.base_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sgr-research")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.llm.max_tokens == 0 {
            return Err(ConfigError::ValidationError("llm.max_tokens must be > 0".into()));
        }

        let exec = &self.execution;
        if exec.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "execution.max_iterations must be > 0".into(),
            ));
        }
        if exec.max_searches_to_keep == 0 {
            return Err(ConfigError::ValidationError(
                "execution.max_searches_to_keep must be > 0".into(),
            ));
        }
        if exec.clarification_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "execution.clarification_timeout_secs must be > 0 when set".into(),
            ));
        }

        if self.search.max_results == 0 {
            return Err(ConfigError::ValidationError("search.max_results must be > 0".into()));
        }

        if self.scraping.content_limit == 0 || self.scraping.extraction_limit == 0 {
            return Err(ConfigError::ValidationError(
                "scraping limits must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an LLM API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.llm.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
