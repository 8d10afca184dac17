//! Telephony leg capability

use crate::{Result, SampleRate};
use async_trait::async_trait;

/// Messages the session sends towards the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// PCM16 mono audio to queue for playback
    PlayAudio {
        audio: Vec<u8>,
        sample_rate: SampleRate,
    },
    /// Drop any queued playback immediately
    ClearAudio { stream_id: Option<String> },
}

/// Outbound half of the telephony media stream
#[async_trait]
pub trait TelephonyTransport: Send + Sync {
    /// Queue a message for the caller.
    ///
    /// Returns `Error::TransportNotOpen` once the leg has gone away.
    async fn send(&self, message: OutboundMessage) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Rate playback audio must be encoded at
    fn sample_rate(&self) -> SampleRate;
}
