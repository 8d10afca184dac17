//! Error types shared by every crate in the call pipeline

use std::time::Duration;
use thiserror::Error;

/// Result alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by capabilities and the call session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A provider socket or HTTP connection failed or dropped
    #[error("connection error: {0}")]
    Connection(String),

    /// Provider asked us to slow down
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// Payload could not be decoded; never fatal for a call
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Telephony socket is already closed
    #[error("transport not open")]
    TransportNotOpen,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Capability was closed before the operation completed
    #[error("closed: {0}")]
    Closed(String),

    /// Provider returned an error response we cannot retry
    #[error("provider error: {0}")]
    Provider(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimited { .. } | Error::Connection(_) | Error::Timeout(_)
        )
    }

    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Connection(_) => "connection",
            Error::RateLimited { .. } => "rate_limited",
            Error::MalformedMessage(_) => "malformed_message",
            Error::TransportNotOpen => "transport_not_open",
            Error::Timeout(_) => "timeout",
            Error::Closed(_) => "closed",
            Error::Provider(_) => "provider",
            Error::Config(_) => "config",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedMessage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::RateLimited { retry_after: None }.is_retryable());
        assert!(Error::Connection("reset".into()).is_retryable());
        assert!(Error::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!Error::Provider("400".into()).is_retryable());
        assert!(!Error::MalformedMessage("x".into()).is_retryable());
        assert!(!Error::TransportNotOpen.is_retryable());
    }

    #[test]
    fn test_kind_labels() {
        let err = Error::RateLimited {
            retry_after: Some(Duration::from_millis(1500)),
        };
        assert_eq!(err.kind(), "rate_limited");
        assert_eq!(Error::TransportNotOpen.kind(), "transport_not_open");
    }
}
