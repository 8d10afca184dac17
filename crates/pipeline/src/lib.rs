//! Per-call audio pipeline
//!
//! - `resampler`: PCM16 sample-rate conversion and outbound padding
//! - `turn_detection`: transcript-driven turn completion and barge-in
//! - `echo_guard`: suppression of the agent's own speech in recognizer output
//! - `providers`: WebSocket recognizer and HTTP streaming synthesizer

pub mod echo_guard;
pub mod providers;
pub mod resampler;
pub mod turn_detection;

pub use echo_guard::{EchoGuard, EchoGuardConfig, EchoPolicy};
pub use providers::{HttpSynthesizer, HttpSynthesizerConfig, WsRecognizer, WsRecognizerConfig};
pub use resampler::{resample, silence, Resampler};
pub use turn_detection::{TurnDecision, TurnDetectionConfig, TurnDetector, TurnState};
pub use voice_call_config::ResampleQuality;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid sample rate conversion {source_rate}Hz -> {target_rate}Hz")]
    InvalidSampleRate { source_rate: u32, target_rate: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl From<PipelineError> for voice_call_core::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Provider(msg) => voice_call_core::Error::Provider(msg),
            other => voice_call_core::Error::Config(other.to_string()),
        }
    }
}
