//! Speech capability traits

use crate::{Result, TranscriptEvent};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// Stream of recognizer results for one connection
pub type TranscriptStream = Pin<Box<dyn Stream<Item = Result<TranscriptEvent>> + Send>>;

/// Stream of synthesizer output for one utterance
pub type SynthesisStream = Pin<Box<dyn Stream<Item = Result<SynthesisEvent>> + Send>>;

/// Live recognizer connection for a single call
#[async_trait]
pub trait RecognizerConnection: Send + Sync {
    /// Forward caller audio (PCM16 mono at the rate given to `connect`)
    async fn send_audio(&self, pcm16: &[u8]) -> Result<()>;

    /// Close the connection. The event stream ends afterwards.
    async fn close(&self) -> Result<()>;
}

/// Connection plus the transcript events it produces
pub struct RecognizerHandle {
    pub connection: Arc<dyn RecognizerConnection>,
    pub events: TranscriptStream,
}

/// Streaming speech recognizer
///
/// # Example
///
/// ```ignore
/// let handle = recognizer.connect(8000).await?;
/// handle.connection.send_audio(&pcm).await?;
/// while let Some(event) = handle.events.next().await { ... }
/// ```
#[async_trait]
pub trait SpeechRecognizer: Send + Sync + 'static {
    /// Open a streaming session expecting audio at `sample_rate`
    async fn connect(&self, sample_rate: u32) -> Result<RecognizerHandle>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Output of a synthesis stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    /// Raw PCM16 mono at the synthesizer's native rate. Chunk boundaries are
    /// arbitrary and may split a sample.
    Audio(Vec<u8>),
    /// All audio for the utterance has been delivered
    Complete,
}

/// Live synthesis for one utterance
#[async_trait]
pub trait SynthesisConnection: Send + Sync {
    /// Stop synthesis; no further audio is produced
    async fn close(&self) -> Result<()>;
}

pub struct SynthesisHandle {
    pub connection: Arc<dyn SynthesisConnection>,
    pub events: SynthesisStream,
}

/// Streaming speech synthesizer
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// Start synthesizing `text`
    async fn synthesize(&self, text: &str) -> Result<SynthesisHandle>;

    /// Native output rate of the audio chunks
    fn sample_rate(&self) -> u32;

    fn name(&self) -> &str;
}
