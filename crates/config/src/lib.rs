//! Configuration management for the telephony voice agent
//!
//! Supports loading configuration from:
//! - TOML files (`config/default.toml`, `config/{env}.toml`)
//! - Environment variables (`VOICE_CALL__SECTION__KEY`)

pub mod constants;
pub mod pipeline;
pub mod settings;

pub use pipeline::{AudioConfig, EchoConfig, PipelineConfig, ResampleQuality, TurnConfig};
pub use settings::{
    load_settings, load_settings_from, ConversationConfig, LlmConfig, ObservabilityConfig,
    ProvidersConfig, RuntimeEnvironment, ServerConfig, Settings, TelephonyConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
