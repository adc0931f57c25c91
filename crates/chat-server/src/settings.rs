//! Application Settings
//!
//! Loads the service configuration from the process environment, with a
//! local `.env` file as development override. Validates at startup so a
//! misconfigured process never reaches the serving loop.

use thiserror::Error;

/// Configuration loading errors - fatal at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {0} must not be empty")]
    Empty(&'static str),

    #[error("Invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Immutable configuration snapshot, shared read-only across requests
#[derive(Clone, Debug)]
pub struct Settings {
    /// LLM provider name (e.g., "ollama")
    pub provider: String,

    /// Model identifier (e.g., "llama3")
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens per response
    pub max_tokens: u32,

    /// Deployment environment label (local, dev, prod)
    pub environment: String,
}

impl Settings {
    /// Load settings from the environment
    ///
    /// A `.env` file fills in missing variables; values already set in
    /// the shell always win (`dotenvy` never overrides existing vars).
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    ///
    /// Missing keys fall back to defaults; present-but-invalid values
    /// are hard errors rather than silent defaults.
    fn from_source(source: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let provider = source("LLM_PROVIDER").unwrap_or_else(|| "ollama".into());
        let model = source("LLM_MODEL").unwrap_or_else(|| "llama3".into());
        let environment = source("APP_ENV").unwrap_or_else(|| "local".into());

        let temperature = match source("LLM_TEMPERATURE") {
            None => 0.2,
            Some(raw) => raw.trim().parse::<f32>().map_err(|e| ConfigError::Invalid {
                var: "LLM_TEMPERATURE",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
        };

        let max_tokens = match source("LLM_MAX_TOKENS") {
            None => 1024,
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                var: "LLM_MAX_TOKENS",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
        };

        let settings = Self {
            provider,
            model,
            temperature,
            max_tokens,
            environment,
        };
        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.trim().is_empty() {
            return Err(ConfigError::Empty("LLM_PROVIDER"));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Empty("LLM_MODEL"));
        }
        Ok(())
    }
}
