//! Language model integration
//!
//! Features:
//! - OpenAI-compatible chat completions backend
//! - Bounded exponential backoff on rate limits and transient failures
//! - Fixed fallback reply so a call never goes silent on model errors

pub mod backend;
pub mod resilient;

pub use backend::{OpenAiChatModel, OpenAiConfig};
pub use resilient::{ResilientModel, RetryPolicy};

use std::time::Duration;
use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<LlmError> for voice_call_core::Error {
    fn from(err: LlmError) -> Self {
        use voice_call_core::Error;
        match err {
            LlmError::Api(msg) => Error::Provider(msg),
            LlmError::Network(msg) => Error::Connection(msg),
            LlmError::RateLimited { retry_after } => Error::RateLimited { retry_after },
            LlmError::InvalidResponse(msg) => Error::MalformedMessage(msg),
            LlmError::Timeout(after) => Error::Timeout(after),
            LlmError::Configuration(msg) => Error::Config(msg),
        }
    }
}
