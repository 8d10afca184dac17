//! Media stream wire format
//!
//! Inbound:
//! ```json
//! {"event":"start","start":{"callId":"c1","streamId":"s1","mediaFormat":{"encoding":"audio/x-l16","sampleRate":8000}}}
//! {"event":"media","media":{"track":"inbound","payload":"<base64 PCM16>"}}
//! {"event":"stop"}
//! ```
//!
//! Outbound:
//! ```json
//! {"event":"playAudio","media":{"contentType":"audio/x-l16","sampleRate":8000,"payload":"<base64>"}}
//! {"event":"clearAudio","streamId":"s1"}
//! ```

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use voice_call_core::OutboundMessage;

use crate::TransportError;

/// Decoded inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Start {
        call_id: String,
        stream_id: String,
        /// Rate announced by the provider, if any
        sample_rate: Option<u32>,
    },
    /// Caller audio, PCM16 mono
    Media(Vec<u8>),
    Stop,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum InboundWire {
    Start { start: StartPayload },
    Media { media: MediaPayload },
    Stop,
    /// Acknowledgements such as `playedStream` or `clearedAudio`
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPayload {
    call_id: String,
    stream_id: String,
    #[serde(default)]
    media_format: Option<MediaFormat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaFormat {
    #[serde(default)]
    sample_rate: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MediaPayload {
    #[serde(default)]
    track: Option<String>,
    payload: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum OutboundWire<'a> {
    PlayAudio {
        media: PlayMedia<'a>,
    },
    ClearAudio {
        #[serde(rename = "streamId", skip_serializing_if = "Option::is_none")]
        stream_id: Option<&'a str>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayMedia<'a> {
    content_type: &'a str,
    sample_rate: u32,
    payload: String,
}

/// Decode a text frame. Events the session does not act on yield `None`.
pub fn decode_text(text: &str) -> Result<Option<InboundEvent>, TransportError> {
    let wire: InboundWire =
        serde_json::from_str(text).map_err(|e| TransportError::Decode(e.to_string()))?;

    match wire {
        InboundWire::Start { start } => Ok(Some(InboundEvent::Start {
            call_id: start.call_id,
            stream_id: start.stream_id,
            sample_rate: start.media_format.and_then(|f| f.sample_rate),
        })),
        InboundWire::Media { media } => {
            if matches!(media.track.as_deref(), Some(track) if track != "inbound") {
                return Ok(None);
            }
            let audio = BASE64
                .decode(media.payload.as_bytes())
                .map_err(|e| TransportError::Decode(format!("media payload: {}", e)))?;
            Ok(Some(InboundEvent::Media(audio)))
        }
        InboundWire::Stop => Ok(Some(InboundEvent::Stop)),
        InboundWire::Other => Ok(None),
    }
}

/// Binary frames carry raw PCM16
pub fn decode_binary(data: Vec<u8>) -> InboundEvent {
    InboundEvent::Media(data)
}

/// Serialize an outbound message as a text frame
pub fn encode_outbound(
    message: &OutboundMessage,
    content_type: &str,
) -> Result<String, TransportError> {
    let wire = match message {
        OutboundMessage::PlayAudio { audio, sample_rate } => {
            if !sample_rate.is_telephony() {
                return Err(TransportError::Format(format!(
                    "{} playback must be 8000 or 16000 Hz, got {}",
                    content_type, sample_rate
                )));
            }
            OutboundWire::PlayAudio {
                media: PlayMedia {
                    content_type,
                    sample_rate: sample_rate.as_u32(),
                    payload: BASE64.encode(audio),
                },
            }
        }
        OutboundMessage::ClearAudio { stream_id } => OutboundWire::ClearAudio {
            stream_id: stream_id.as_deref(),
        },
    };

    serde_json::to_string(&wire).map_err(|e| TransportError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_call_core::SampleRate;

    #[test]
    fn test_decode_start() {
        let event = decode_text(
            r#"{"event":"start","sequenceNumber":0,"start":{"callId":"c-1","streamId":"s-1",
                "accountId":"a","tracks":["inbound"],
                "mediaFormat":{"encoding":"audio/x-l16","sampleRate":8000}}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            Some(InboundEvent::Start {
                call_id: "c-1".to_string(),
                stream_id: "s-1".to_string(),
                sample_rate: Some(8000),
            })
        );
    }

    #[test]
    fn test_decode_media() {
        let payload = BASE64.encode([1u8, 0, 2, 0]);
        let text = format!(
            r#"{{"event":"media","streamId":"s-1","media":{{"track":"inbound","chunk":3,"payload":"{}"}}}}"#,
            payload
        );
        assert_eq!(
            decode_text(&text).unwrap(),
            Some(InboundEvent::Media(vec![1, 0, 2, 0]))
        );
    }

    #[test]
    fn test_outbound_track_ignored() {
        let text = r#"{"event":"media","media":{"track":"outbound","payload":"AAA="}}"#;
        assert_eq!(decode_text(text).unwrap(), None);
    }

    #[test]
    fn test_decode_stop_and_acks() {
        assert_eq!(decode_text(r#"{"event":"stop"}"#).unwrap(), Some(InboundEvent::Stop));
        assert_eq!(decode_text(r#"{"event":"playedStream","name":"x"}"#).unwrap(), None);
    }

    #[test]
    fn test_malformed_messages() {
        assert!(matches!(decode_text("{oops"), Err(TransportError::Decode(_))));
        assert!(matches!(
            decode_text(r#"{"event":"media","media":{"payload":"!!!"}}"#),
            Err(TransportError::Decode(_))
        ));
        assert!(matches!(
            decode_text(r#"{"event":"start","start":{}}"#),
            Err(TransportError::Decode(_))
        ));
    }

    #[test]
    fn test_play_audio_contract() {
        let message = OutboundMessage::PlayAudio {
            audio: vec![0, 1, 2, 3],
            sample_rate: SampleRate::Hz16000,
        };
        let json: serde_json::Value =
            serde_json::from_str(&encode_outbound(&message, "audio/x-l16").unwrap()).unwrap();

        assert_eq!(json["event"], "playAudio");
        assert_eq!(json["media"]["contentType"], "audio/x-l16");
        assert_eq!(json["media"]["sampleRate"], 16000);
        assert_eq!(
            BASE64.decode(json["media"]["payload"].as_str().unwrap()).unwrap(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_play_audio_rejects_non_telephony_rate() {
        let message = OutboundMessage::PlayAudio {
            audio: vec![0, 0],
            sample_rate: SampleRate::Hz24000,
        };
        assert!(matches!(
            encode_outbound(&message, "audio/x-l16"),
            Err(TransportError::Format(_))
        ));
    }

    #[test]
    fn test_clear_audio() {
        let message = OutboundMessage::ClearAudio {
            stream_id: Some("s-1".to_string()),
        };
        assert_eq!(
            encode_outbound(&message, "audio/x-l16").unwrap(),
            r#"{"event":"clearAudio","streamId":"s-1"}"#
        );
        let message = OutboundMessage::ClearAudio { stream_id: None };
        assert_eq!(
            encode_outbound(&message, "audio/x-l16").unwrap(),
            r#"{"event":"clearAudio"}"#
        );
    }
}
