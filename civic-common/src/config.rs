//! Configuration management for the civic report pipeline.
//!
//! The service reads a single configuration file at `~/.civic/config.json`,
//! with credentials optionally split out into `~/.civic/secrets.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (CIVIC_* prefix, plus `HF_API_KEY`)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `CIVIC_HOST` → server.host
//! - `CIVIC_PORT` → server.port
//! - `CIVIC_LOG_LEVEL` → observability.log_level
//! - `CIVIC_LOG_FORMAT` → observability.log_format
//! - `CIVIC_CLASSIFIER_URL` → moderation.endpoint
//! - `CIVIC_SUMMARIZER_URL` → summarizer.endpoint
//! - `CIVIC_MAX_CONCURRENCY` → digest.max_concurrency
//! - `HF_API_KEY` → secrets.inference_token

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config_loader::load_modular_config;

/// Hosted hate-speech classification model.
pub const DEFAULT_CLASSIFIER_URL: &str =
    "https://api-inference.huggingface.co/models/facebook/roberta-hate-speech-dynabench-r4-target";

/// Hosted abstractive summarization model.
pub const DEFAULT_SUMMARIZER_URL: &str =
    "https://api-inference.huggingface.co/models/facebook/bart-large-cnn";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".civic"),
        |dirs| dirs.home_dir().join(".civic"),
    )
}

// ============================================================================
// Server
// ============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default: "127.0.0.1" (local only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ============================================================================
// Secrets
// ============================================================================

/// Credentials for the hosted inference endpoints.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    /// Bearer token sent to both the classifier and the summarizer
    #[serde(default)]
    pub inference_token: Option<String>,
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsConfig")
            .field(
                "inference_token",
                &self.inference_token.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

// ============================================================================
// Moderation
// ============================================================================

/// Text classification and keyword fallback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Classification endpoint URL
    #[serde(default = "default_classifier_url")]
    pub endpoint: String,

    /// Per-attempt deadline for a classification call
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,

    /// Classifier labels that mark a report as a policy violation
    #[serde(default = "default_violation_labels")]
    pub violation_labels: Vec<String>,

    /// Tokens checked (case-insensitive substring) when the classifier is unusable
    #[serde(default = "default_deny_list")]
    pub deny_list: Vec<String>,

    /// Extra classification attempts before falling back. 0 disables retries.
    #[serde(default)]
    pub max_retries: u32,

    /// Base delay between attempts; doubles per attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_classifier_url(),
            timeout_ms: default_classifier_timeout_ms(),
            violation_labels: default_violation_labels(),
            deny_list: default_deny_list(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl ModerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ============================================================================
// Summarizer
// ============================================================================

/// Abstractive summarization endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Summarization endpoint URL
    #[serde(default = "default_summarizer_url")]
    pub endpoint: String,

    /// Deadline for a single summarization call
    #[serde(default = "default_summarizer_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_summarizer_url(),
            timeout_ms: default_summarizer_timeout_ms(),
        }
    }
}

impl SummarizerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ============================================================================
// Digest
// ============================================================================

/// Leadership digest aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Upper bound on in-flight summarization calls
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Summary length ceiling passed to the summarizer
    #[serde(default = "default_digest_max_length")]
    pub max_length: usize,

    /// Summary length floor passed to the summarizer
    #[serde(default = "default_digest_min_length")]
    pub min_length: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_length: default_digest_max_length(),
            min_length: default_digest_min_length(),
        }
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets forced to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub moderation: ModerationConfig,

    #[serde(default)]
    pub summarizer: SummarizerConfig,

    #[serde(default)]
    pub digest: DigestConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default directory.
    pub fn load() -> Result<Self> {
        Self::load_from_dir(&config_dir())
    }

    /// Load `config.json` (and `secrets.json`, if present) from a directory.
    ///
    /// Missing files fall back to defaults.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let value = load_modular_config(Some(dir.to_path_buf()))?;
        serde_json::from_value(value)
            .with_context(|| format!("Failed to parse config from {}", dir.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("CIVIC_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("CIVIC_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(level) = lookup("CIVIC_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("CIVIC_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(url) = lookup("CIVIC_CLASSIFIER_URL") {
            self.moderation.endpoint = url;
        }
        if let Some(url) = lookup("CIVIC_SUMMARIZER_URL") {
            self.summarizer.endpoint = url;
        }
        if let Some(n) = lookup("CIVIC_MAX_CONCURRENCY").and_then(|n| n.parse().ok()) {
            self.digest.max_concurrency = n;
        }
        if let Some(token) = lookup("HF_API_KEY").filter(|t| !t.is_empty()) {
            self.secrets.inference_token = Some(token);
        }
    }

    /// Socket address string for the HTTP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    4460
}
fn default_classifier_url() -> String {
    DEFAULT_CLASSIFIER_URL.into()
}
fn default_summarizer_url() -> String {
    DEFAULT_SUMMARIZER_URL.into()
}
fn default_classifier_timeout_ms() -> u64 {
    3_000
}
fn default_summarizer_timeout_ms() -> u64 {
    10_000
}
fn default_violation_labels() -> Vec<String> {
    vec!["hate".into()]
}
fn default_deny_list() -> Vec<String> {
    vec!["gali".into(), "abuse".into(), "spam".into()]
}
fn default_retry_backoff_ms() -> u64 {
    200
}
fn default_max_concurrency() -> usize {
    4
}
fn default_digest_max_length() -> usize {
    150
}
fn default_digest_min_length() -> usize {
    30
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
