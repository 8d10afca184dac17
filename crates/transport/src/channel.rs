//! Channel-backed outbound transport
//!
//! The session never touches the socket. Outbound messages are encoded here
//! and queued on an mpsc channel; the connection's writer task drains the
//! channel into the WebSocket. Once the writer goes away, or the reader saw
//! the socket close, the transport reports `TransportNotOpen`.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use voice_call_config::TelephonyConfig;
use voice_call_core::{Error, OutboundMessage, Result, SampleRate, TelephonyTransport};

use crate::protocol::encode_outbound;

pub struct ChannelTransport {
    frames: mpsc::Sender<String>,
    open: AtomicBool,
    sample_rate: SampleRate,
    content_type: String,
}

impl ChannelTransport {
    /// Create the transport and the receiver its writer task drains
    pub fn new(
        sample_rate: SampleRate,
        content_type: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<String>) {
        let (frames, rx) = mpsc::channel(capacity);
        let transport = Self {
            frames,
            open: AtomicBool::new(true),
            sample_rate,
            content_type: content_type.into(),
        };
        (transport, rx)
    }

    pub fn from_config(
        config: &TelephonyConfig,
        capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<String>)> {
        let sample_rate = SampleRate::from_u32(config.sample_rate)
            .filter(SampleRate::is_telephony)
            .ok_or_else(|| {
                Error::Config(format!(
                    "telephony sample rate must be 8000 or 16000, got {}",
                    config.sample_rate
                ))
            })?;
        Ok(Self::new(sample_rate, config.content_type.clone(), capacity))
    }

    /// Mark the leg closed; later sends are rejected
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

#[async_trait]
impl TelephonyTransport for ChannelTransport {
    async fn send(&self, message: OutboundMessage) -> Result<()> {
        if !self.is_open() {
            return Err(Error::TransportNotOpen);
        }

        if let OutboundMessage::PlayAudio { sample_rate, .. } = &message {
            if *sample_rate != self.sample_rate {
                return Err(Error::Config(format!(
                    "playback at {} does not match telephony rate {}",
                    sample_rate, self.sample_rate
                )));
            }
        }

        let frame = encode_outbound(&message, &self.content_type)?;
        if self.frames.send(frame).await.is_err() {
            tracing::debug!("Outbound writer gone, closing transport");
            self.close();
            return Err(Error::TransportNotOpen);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(rate: SampleRate) -> OutboundMessage {
        OutboundMessage::PlayAudio {
            audio: vec![0; 320],
            sample_rate: rate,
        }
    }

    #[tokio::test]
    async fn test_frames_are_queued() {
        let (transport, mut rx) = ChannelTransport::new(SampleRate::Hz8000, "audio/x-l16", 8);
        transport.send(play(SampleRate::Hz8000)).await.unwrap();
        transport
            .send(OutboundMessage::ClearAudio { stream_id: None })
            .await
            .unwrap();

        let first: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["event"], "playAudio");
        assert_eq!(first["media"]["sampleRate"], 8000);
        assert_eq!(first["media"]["contentType"], "audio/x-l16");
        assert_eq!(rx.recv().await.unwrap(), r#"{"event":"clearAudio"}"#);
    }

    #[tokio::test]
    async fn test_rate_must_match_leg() {
        let (transport, _rx) = ChannelTransport::new(SampleRate::Hz16000, "audio/x-l16", 8);
        assert!(matches!(
            transport.send(play(SampleRate::Hz8000)).await,
            Err(Error::Config(_))
        ));
        assert!(transport.send(play(SampleRate::Hz16000)).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_transport_rejects_sends() {
        let (transport, rx) = ChannelTransport::new(SampleRate::Hz8000, "audio/x-l16", 8);
        transport.close();
        assert_eq!(
            transport.send(play(SampleRate::Hz8000)).await,
            Err(Error::TransportNotOpen)
        );

        let (transport, rx2) = ChannelTransport::new(SampleRate::Hz8000, "audio/x-l16", 8);
        drop(rx2);
        assert_eq!(
            transport.send(play(SampleRate::Hz8000)).await,
            Err(Error::TransportNotOpen)
        );
        assert!(!transport.is_open());
        drop(rx);
    }

    #[test]
    fn test_from_config_validates_rate() {
        let mut config = TelephonyConfig::default();
        assert!(ChannelTransport::from_config(&config, 4).is_ok());
        config.sample_rate = 24000;
        assert!(ChannelTransport::from_config(&config, 4).is_err());
    }
}
