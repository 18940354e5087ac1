//! Configuration loading, validation, and management for Hopdesk.
//!
//! Loads configuration from `~/.hopdesk/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.hopdesk/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Hop loop and pipeline settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Ticketing system settings
    #[serde(default)]
    pub ticketing: TicketingConfig,

    /// Response validation service settings
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Hop loop and pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Hop ceiling per run. Must be positive.
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,

    /// Plan generation attempts per hop (initial + regenerations after a
    /// validator rejection). Must be positive.
    #[serde(default = "default_max_plan_attempts")]
    pub max_plan_attempts: u32,

    /// Timeout for plan generation, in seconds.
    #[serde(default = "default_plan_timeout_secs")]
    pub plan_timeout_secs: u64,

    /// Timeout per retrieval action, in seconds.
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,

    /// Timeout for coverage judgment, in seconds.
    #[serde(default = "default_coverage_timeout_secs")]
    pub coverage_timeout_secs: u64,

    /// Timeout for draft generation, in seconds.
    #[serde(default = "default_draft_timeout_secs")]
    pub draft_timeout_secs: u64,
}

fn default_max_hops() -> usize {
    2
}
fn default_max_plan_attempts() -> u32 {
    2
}
fn default_plan_timeout_secs() -> u64 {
    60
}
fn default_action_timeout_secs() -> u64 {
    30
}
fn default_coverage_timeout_secs() -> u64 {
    60
}
fn default_draft_timeout_secs() -> u64 {
    90
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            max_plan_attempts: default_max_plan_attempts(),
            plan_timeout_secs: default_plan_timeout_secs(),
            action_timeout_secs: default_action_timeout_secs(),
            coverage_timeout_secs: default_coverage_timeout_secs(),
            draft_timeout_secs: default_draft_timeout_secs(),
        }
    }
}

impl OrchestratorConfig {
    pub fn plan_timeout(&self) -> Duration {
        Duration::from_secs(self.plan_timeout_secs)
    }
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }
    pub fn coverage_timeout(&self) -> Duration {
        Duration::from_secs(self.coverage_timeout_secs)
    }
    pub fn draft_timeout(&self) -> Duration {
        Duration::from_secs(self.draft_timeout_secs)
    }
}

/// Ticketing system settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct TicketingConfig {
    /// Base URL of the ticketing API.
    #[serde(default = "default_ticketing_url")]
    pub api_url: String,

    /// API key. Usually supplied via `HOPDESK_TICKETING_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout, in seconds.
    #[serde(default = "default_ticketing_timeout_secs")]
    pub timeout_secs: u64,

    /// Custom attribute key updated with the terminal status.
    #[serde(default = "default_status_attribute")]
    pub status_attribute: String,

    /// How long to suspend agent activity at finalize, in seconds.
    #[serde(default = "default_snooze_secs")]
    pub snooze_duration_secs: u64,
}

fn default_ticketing_url() -> String {
    "https://api.ticketing.example.com".into()
}
fn default_ticketing_timeout_secs() -> u64 {
    30
}
fn default_status_attribute() -> String {
    "agent_status".into()
}
fn default_snooze_secs() -> u64 {
    300
}

impl Default for TicketingConfig {
    fn default() -> Self {
        Self {
            api_url: default_ticketing_url(),
            api_key: None,
            timeout_secs: default_ticketing_timeout_secs(),
            status_attribute: default_status_attribute(),
            snooze_duration_secs: default_snooze_secs(),
        }
    }
}

/// Response validation service settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Validation endpoint URL. Usually supplied via `HOPDESK_VALIDATION_ENDPOINT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// API key sent as `x-api-key`. Usually via `HOPDESK_VALIDATION_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout, in seconds.
    #[serde(default = "default_validation_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_validation_timeout_secs() -> u64 {
    120
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_validation_timeout_secs(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("orchestrator", &self.orchestrator)
            .field("ticketing", &self.ticketing)
            .field("validation", &self.validation)
            .finish()
    }
}

impl std::fmt::Debug for TicketingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketingConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("status_attribute", &self.status_attribute)
            .field("snooze_duration_secs", &self.snooze_duration_secs)
            .finish()
    }
}

impl std::fmt::Debug for ValidationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.hopdesk/config.toml).
    ///
    /// Environment variable overrides (highest priority):
    /// - `HOPDESK_TICKETING_API_KEY`
    /// - `HOPDESK_VALIDATION_ENDPOINT`
    /// - `HOPDESK_VALIDATION_API_KEY`
    /// - `HOPDESK_MAX_HOPS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.ticketing.api_key.is_none() {
            config.ticketing.api_key = std::env::var("HOPDESK_TICKETING_API_KEY").ok();
        }
        if config.validation.endpoint.is_none() {
            config.validation.endpoint = std::env::var("HOPDESK_VALIDATION_ENDPOINT").ok();
        }
        if config.validation.api_key.is_none() {
            config.validation.api_key = std::env::var("HOPDESK_VALIDATION_API_KEY").ok();
        }
        if let Ok(max_hops) = std::env::var("HOPDESK_MAX_HOPS") {
            config.orchestrator.max_hops = max_hops
                .parse()
                .map_err(|_| ConfigError::ValidationError("HOPDESK_MAX_HOPS must be a positive integer".into()))?;
            config.validate()?;
        }

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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".hopdesk")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.max_hops == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_hops must be positive".into(),
            ));
        }
        if self.orchestrator.max_plan_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_plan_attempts must be positive".into(),
            ));
        }
        if self.ticketing.status_attribute.is_empty() {
            return Err(ConfigError::ValidationError(
                "ticketing.status_attribute must not be empty".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            ticketing: TicketingConfig::default(),
            validation: ValidationConfig::default(),
        }
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
