//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{audio, conversation, endpoints, llm, server};
use crate::{ConfigError, PipelineConfig};

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Relaxed validation, warnings only
    #[default]
    Development,
    Staging,
    /// All validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Telephony leg audio format
    #[serde(default)]
    pub telephony: TelephonyConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    /// Recognizer and synthesizer endpoints
    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_telephony()?;
        self.pipeline.validate()?;
        self.validate_conversation()?;
        self.validate_llm()?;
        self.validate_providers()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.port == 0 {
            return Err(ConfigError::invalid("server.port", "Port cannot be 0"));
        }

        if server.max_calls == 0 {
            return Err(ConfigError::invalid(
                "server.max_calls",
                "Max calls must be at least 1",
            ));
        }

        if server.connect_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "server.connect_timeout_ms",
                "Connect timeout must be positive",
            ));
        }

        if !server.ws_path.starts_with('/') {
            return Err(ConfigError::invalid(
                "server.ws_path",
                format!("Must start with '/', got '{}'", server.ws_path),
            ));
        }

        Ok(())
    }

    fn validate_telephony(&self) -> Result<(), ConfigError> {
        if !matches!(self.telephony.sample_rate, 8000 | 16000) {
            return Err(ConfigError::invalid(
                "telephony.sample_rate",
                format!("Must be 8000 or 16000, got {}", self.telephony.sample_rate),
            ));
        }

        if self.telephony.content_type != audio::CONTENT_TYPE {
            return Err(ConfigError::invalid(
                "telephony.content_type",
                format!(
                    "Only {} playback is supported, got '{}'",
                    audio::CONTENT_TYPE,
                    self.telephony.content_type
                ),
            ));
        }

        Ok(())
    }

    fn validate_conversation(&self) -> Result<(), ConfigError> {
        let conversation = &self.conversation;

        if conversation.max_history < 2 {
            return Err(ConfigError::invalid(
                "conversation.max_history",
                "Must hold at least one user/assistant pair",
            ));
        }

        if conversation.max_history % 2 != 0 {
            tracing::warn!(
                max_history = conversation.max_history,
                "conversation.max_history is odd, a user turn may be kept without its reply"
            );
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        let llm = &self.llm;

        if llm.endpoint.is_empty() {
            return Err(ConfigError::MissingField("llm.endpoint".to_string()));
        }

        if llm.model.is_empty() {
            return Err(ConfigError::MissingField("llm.model".to_string()));
        }

        if llm.initial_backoff_ms == 0 || llm.max_backoff_ms < llm.initial_backoff_ms {
            return Err(ConfigError::invalid(
                "llm.max_backoff_ms",
                format!(
                    "Backoff must satisfy 0 < initial ({}) <= max ({})",
                    llm.initial_backoff_ms, llm.max_backoff_ms
                ),
            ));
        }

        if llm.fallback_reply.trim().is_empty() {
            return Err(ConfigError::invalid(
                "llm.fallback_reply",
                "Fallback reply cannot be empty",
            ));
        }

        if self.environment.is_production() && llm.api_key.is_none() {
            tracing::warn!("llm.api_key is not set in production");
        }

        Ok(())
    }

    fn validate_providers(&self) -> Result<(), ConfigError> {
        let providers = &self.providers;

        if !(providers.recognizer_url.starts_with("ws://")
            || providers.recognizer_url.starts_with("wss://"))
        {
            return Err(ConfigError::invalid(
                "providers.recognizer_url",
                format!("Must be a ws:// or wss:// URL, got '{}'", providers.recognizer_url),
            ));
        }

        if !(providers.synthesizer_url.starts_with("http://")
            || providers.synthesizer_url.starts_with("https://"))
        {
            return Err(ConfigError::invalid(
                "providers.synthesizer_url",
                format!(
                    "Must be an http:// or https:// URL, got '{}'",
                    providers.synthesizer_url
                ),
            ));
        }

        if providers.synthesizer_sample_rate == 0 {
            return Err(ConfigError::invalid(
                "providers.synthesizer_sample_rate",
                "Sample rate cannot be 0",
            ));
        }

        if self.environment.is_strict() && providers.api_key.is_none() {
            tracing::warn!("providers.api_key is not set outside development");
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Telephony media stream WebSocket path
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Maximum concurrent calls
    #[serde(default = "default_max_calls")]
    pub max_calls: usize,

    /// Timeout for opening recognizer/synthesizer connections
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    server::PORT
}

fn default_ws_path() -> String {
    server::WS_PATH.to_string()
}

fn default_max_calls() -> usize {
    server::MAX_CALLS
}

fn default_connect_timeout_ms() -> u64 {
    server::CONNECT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
            max_calls: default_max_calls(),
            connect_timeout_ms: default_connect_timeout_ms(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// Telephony leg audio format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    /// 8000 or 16000
    #[serde(default = "default_telephony_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_telephony_sample_rate() -> u32 {
    audio::TELEPHONY_SAMPLE_RATE
}

fn default_content_type() -> String {
    audio::CONTENT_TYPE.to_string()
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_telephony_sample_rate(),
            content_type: default_content_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Cap on stored history entries
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Spoken once when the call starts; not recorded in history
    #[serde(default)]
    pub greeting: Option<String>,
}

fn default_max_history() -> usize {
    conversation::MAX_HISTORY
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            greeting: None,
        }
    }
}

/// Language model backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Spoken when every attempt fails
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

fn default_llm_endpoint() -> String {
    endpoints::LLM_DEFAULT.to_string()
}

fn default_llm_model() -> String {
    "qwen2.5:1.5b-instruct".to_string()
}

fn default_system_prompt() -> String {
    llm::SYSTEM_PROMPT.to_string()
}

fn default_max_tokens() -> u32 {
    llm::MAX_TOKENS
}

fn default_temperature() -> f32 {
    llm::TEMPERATURE
}

fn default_llm_timeout_secs() -> u64 {
    llm::TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    llm::MAX_RETRIES
}

fn default_initial_backoff_ms() -> u64 {
    llm::INITIAL_BACKOFF_MS
}

fn default_max_backoff_ms() -> u64 {
    llm::MAX_BACKOFF_MS
}

fn default_fallback_reply() -> String {
    llm::FALLBACK_REPLY.to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: None,
            system_prompt: default_system_prompt(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

/// Speech provider endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Streaming recognizer WebSocket URL
    #[serde(default = "default_recognizer_url")]
    pub recognizer_url: String,

    /// Streaming synthesizer HTTP URL
    #[serde(default = "default_synthesizer_url")]
    pub synthesizer_url: String,

    /// Native output rate of the synthesizer
    #[serde(default = "default_synthesizer_sample_rate")]
    pub synthesizer_sample_rate: u32,

    #[serde(default)]
    pub voice: Option<String>,

    #[serde(default)]
    pub language: Option<String>,

    /// Sent as `Authorization: Token <key>` to both providers
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_recognizer_url() -> String {
    endpoints::RECOGNIZER_DEFAULT.to_string()
}

fn default_synthesizer_url() -> String {
    endpoints::SYNTHESIZER_DEFAULT.to_string()
}

fn default_synthesizer_sample_rate() -> u32 {
    audio::SYNTHESIZER_SAMPLE_RATE
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            recognizer_url: default_recognizer_url(),
            synthesizer_url: default_synthesizer_url(),
            synthesizer_sample_rate: default_synthesizer_sample_rate(),
            voice: None,
            language: None,
            api_key: None,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from `config/` and the environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (`VOICE_CALL__` prefix, `__` separator)
/// 2. config/{env}.toml (if env specified)
/// 3. config/default.toml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Same as [`load_settings`] with an explicit config directory
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder
        .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false));

    if let Some(env_name) = env {
        builder = builder
            .add_source(File::with_name(&dir.join(env_name).to_string_lossy()).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICE_CALL")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.ws_path, "/ws/telephony");
        assert_eq!(settings.telephony.sample_rate, 8000);
        assert_eq!(settings.telephony.content_type, "audio/x-l16");
        assert_eq!(settings.conversation.max_history, 20);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_telephony_rate_validation() {
        let mut settings = Settings::default();
        settings.telephony.sample_rate = 16000;
        assert!(settings.validate().is_ok());

        settings.telephony.sample_rate = 22050;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_server_validation() {
        let mut settings = Settings::default();
        settings.server.max_calls = 0;
        assert!(settings.validate().is_err());

        settings.server.max_calls = 10;
        settings.server.ws_path = "ws".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_llm_backoff_validation() {
        let mut settings = Settings::default();
        settings.llm.max_backoff_ms = settings.llm.initial_backoff_ms - 1;
        assert!(settings.validate().is_err());

        settings.llm.max_backoff_ms = settings.llm.initial_backoff_ms;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_history_cap_validation() {
        let mut settings = Settings::default();
        settings.conversation.max_history = 1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_provider_url_schemes() {
        let mut settings = Settings::default();
        settings.providers.recognizer_url = "http://localhost".to_string();
        assert!(settings.validate().is_err());

        settings.providers.recognizer_url = "wss://stt.example.com/v1/listen".to_string();
        settings.providers.synthesizer_url = "ws://localhost".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_files_layers_environment() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
[server]
port = 9000

[telephony]
sample_rate = 16000

[pipeline.echo]
window_ms = 3200
"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("staging.toml"),
            r#"
environment = "staging"

[server]
port = 9100
"#,
        )
        .unwrap();

        let settings = load_settings_from(dir.path(), Some("staging")).unwrap();
        assert_eq!(settings.environment, RuntimeEnvironment::Staging);
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.telephony.sample_rate, 16000);
        assert_eq!(settings.pipeline.echo.window_ms, 3200);
        assert_eq!(settings.pipeline.turn.silence_ms, 500);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            "[telephony]\nsample_rate = 44100\n",
        )
        .unwrap();

        let err = load_settings_from(dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_settings_serialize_to_toml() {
        let rendered = toml::to_string(&Settings::default()).unwrap();
        assert!(rendered.contains("ws_path"));
    }
}
