//! Configuration loading, validation, and management for deskhand.
//!
//! Loads configuration from `deskhand.toml` with environment variable
//! overrides (`DESKHAND_*`). Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// The root configuration structure.
///
/// Maps directly to `deskhand.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Chat-completion endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Optional API key for the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Default temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Default max tokens per model response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Maximum reason-act-observe iterations per run.
    #[serde(default = "default_step_budget")]
    pub step_budget: u32,

    /// Streaming request timeout, measured from connection start.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Audit configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

fn default_endpoint() -> String {
    "http://localhost:11434/api/chat".into()
}
fn default_model() -> String {
    "llama3.2".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_step_budget() -> u32 {
    6
}
fn default_request_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether capability failures are recorded to the audit sink.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            step_budget: default_step_budget(),
            request_timeout_secs: default_request_timeout_secs(),
            audit: AuditConfig::default(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("step_budget", &self.step_budget)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("audit", &self.audit)
            .finish()
    }
}

/// Errors from configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl EngineConfig {
    /// Load configuration from a TOML file, then apply environment
    /// overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&raw)?;
        debug!(path = %path.display(), "Loaded configuration");
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from the given path if it exists, otherwise use defaults.
    /// Environment overrides apply either way.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            _ => {
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Apply `DESKHAND_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("DESKHAND_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("DESKHAND_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("DESKHAND_MODEL") {
            self.model = model;
        }
        if let Ok(budget) = std::env::var("DESKHAND_STEP_BUDGET")
            && let Ok(parsed) = budget.parse()
        {
            self.step_budget = parsed;
        }
        if let Ok(timeout) = std::env::var("DESKHAND_REQUEST_TIMEOUT_SECS")
            && let Ok(parsed) = timeout.parse()
        {
            self.request_timeout_secs = parsed;
        }
    }

    /// Validate all settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::Invalid {
                message: "endpoint must not be empty".into(),
            });
        }
        if self.model.is_empty() {
            return Err(ConfigError::Invalid {
                message: "model must not be empty".into(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid {
                message: format!("temperature must be in 0.0..=2.0, got {}", self.temperature),
            });
        }
        if self.step_budget == 0 {
            return Err(ConfigError::Invalid {
                message: "step_budget must be at least 1".into(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "request_timeout_secs must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.step_budget, 6);
        assert_eq!(config.request_timeout_secs, 120);
        assert!(config.audit.enabled);
    }

    #[test]
    fn parse_full_toml() {
        let raw = r#"
            endpoint = "https://inference.internal/api/chat"
            api_key = "sk-test"
            model = "qwen2.5:14b"
            temperature = 0.2
            max_tokens = 2048
            step_budget = 4
            request_timeout_secs = 30

            [audit]
            enabled = false
        "#;
        let config: EngineConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.endpoint, "https://inference.internal/api/chat");
        assert_eq!(config.model, "qwen2.5:14b");
        assert_eq!(config.step_budget, 4);
        assert_eq!(config.max_tokens, Some(2048));
        assert!(!config.audit.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str(r#"model = "llama3.1""#).unwrap();
        assert_eq!(config.model, "llama3.1");
        assert_eq!(config.step_budget, 6);
        assert_eq!(config.endpoint, default_endpoint());
    }

    #[test]
    fn zero_step_budget_rejected() {
        let config: EngineConfig = toml::from_str("step_budget = 0").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("step_budget"));
    }

    #[test]
    fn out_of_range_temperature_rejected() {
        let config: EngineConfig = toml::from_str("temperature = 3.5").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskhand.toml");
        std::fs::write(&path, r#"model = "phi3""#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.model, "phi3");
    }

    #[test]
    fn load_or_default_without_file() {
        let config = EngineConfig::load_or_default(None).unwrap();
        assert_eq!(config.step_budget, 6);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = EngineConfig {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
