//! Call orchestration
//!
//! One [`CallSession`] owns everything about a single phone call: the
//! recognizer connection, turn detection, echo suppression, the language
//! model exchange, synthesis playback and the bounded conversation history.

pub mod call_session;
pub mod conversation;

pub use call_session::{
    CallEvent, CallSession, CallSessionConfig, Capabilities, SessionEvent, SessionPhase,
    TurnPhase,
};
pub use conversation::ConversationState;

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Session initialization failed: {0}")]
    Init(String),

    #[error("Capability error: {0}")]
    Capability(#[from] voice_call_core::Error),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Session closed")]
    Closed,
}

impl From<voice_call_pipeline::PipelineError> for AgentError {
    fn from(err: voice_call_pipeline::PipelineError) -> Self {
        AgentError::Pipeline(err.to_string())
    }
}
