//! Voice Call Server
//!
//! Accepts telephony media streams over WebSocket and runs one call session
//! per connection. Also serves health, readiness and Prometheus metrics.

pub mod http;
pub mod metrics;
pub mod session;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use metrics::{init_metrics, metrics_handler};
pub use session::{CallInfo, CallRegistry};
pub use state::AppState;

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Call error: {0}")]
    Call(String),

    #[error("Call capacity reached ({0} active calls)")]
    CapacityExceeded(usize),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Call(_) => axum::http::StatusCode::NOT_FOUND,
            ServerError::CapacityExceeded(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            ServerError::WebSocket(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::InvalidRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::Config(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<voice_call_core::Error> for ServerError {
    fn from(err: voice_call_core::Error) -> Self {
        match err {
            voice_call_core::Error::Config(msg) => ServerError::Config(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}
