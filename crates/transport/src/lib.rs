//! Telephony transport
//!
//! The telephony provider streams call audio over a WebSocket using JSON
//! events (`start`, `media`, `stop`) and accepts `playAudio`/`clearAudio`
//! events back. Some deployments send raw PCM16 as binary frames instead of
//! `media` events; both are accepted.
//!
//! - `protocol`: wire types and encode/decode
//! - `channel`: [`ChannelTransport`], an mpsc-backed `TelephonyTransport`

pub mod channel;
pub mod protocol;

pub use channel::ChannelTransport;
pub use protocol::{decode_binary, decode_text, encode_outbound, InboundEvent};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Failed to decode inbound message: {0}")]
    Decode(String),

    #[error("Failed to encode outbound message: {0}")]
    Encode(String),

    #[error("Unsupported playback format: {0}")]
    Format(String),
}

impl From<TransportError> for voice_call_core::Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Decode(msg) | TransportError::Encode(msg) => {
                voice_call_core::Error::MalformedMessage(msg)
            }
            TransportError::Format(msg) => voice_call_core::Error::Config(msg),
        }
    }
}
