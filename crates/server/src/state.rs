//! Application State
//!
//! Shared across all handlers. Provider clients are created once and shared
//! by every call; each call gets its own session and connections.

use std::sync::Arc;
use std::time::Duration;

use voice_call_agent::{CallSessionConfig, Capabilities};
use voice_call_config::Settings;
use voice_call_llm::{OpenAiChatModel, OpenAiConfig, ResilientModel};
use voice_call_pipeline::{HttpSynthesizer, HttpSynthesizerConfig, WsRecognizer, WsRecognizerConfig};

use crate::session::CallRegistry;
use crate::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub capabilities: Capabilities,
    pub calls: Arc<CallRegistry>,
    session_config: Arc<CallSessionConfig>,
}

impl AppState {
    pub fn new(settings: Settings, capabilities: Capabilities) -> Self {
        let session_config = CallSessionConfig::from_settings(&settings);
        Self {
            calls: Arc::new(CallRegistry::new(settings.server.max_calls)),
            settings: Arc::new(settings),
            capabilities,
            session_config: Arc::new(session_config),
        }
    }

    /// Build the configured provider clients
    pub fn from_settings(settings: Settings) -> Result<Self, ServerError> {
        let connect_timeout = Duration::from_millis(settings.server.connect_timeout_ms);

        let recognizer = WsRecognizer::new(WsRecognizerConfig::from_settings(
            &settings.providers,
            connect_timeout,
        ));
        let synthesizer = HttpSynthesizer::new(HttpSynthesizerConfig::from_settings(
            &settings.providers,
            connect_timeout,
        ))?;
        let model = OpenAiChatModel::new(OpenAiConfig::from(&settings.llm))
            .map_err(|e| ServerError::Config(e.to_string()))?;
        let model = ResilientModel::from_config(model, &settings.llm);

        tracing::info!(
            recognizer = %settings.providers.recognizer_url,
            synthesizer = %settings.providers.synthesizer_url,
            llm = %settings.llm.endpoint,
            model = %settings.llm.model,
            "Provider clients initialized"
        );

        let capabilities = Capabilities {
            recognizer: Arc::new(recognizer),
            model: Arc::new(model),
            synthesizer: Arc::new(synthesizer),
        };
        Ok(Self::new(settings, capabilities))
    }

    pub fn session_config(&self) -> CallSessionConfig {
        (*self.session_config).clone()
    }
}
