//! WebSocket streaming recognizer
//!
//! Speaks the common "listen" protocol: the client streams raw linear16
//! frames as binary messages and receives JSON result messages of the form
//!
//! ```json
//! {"type":"Results","is_final":true,"speech_final":false,
//!  "channel":{"alternatives":[{"transcript":"hello"}]}}
//! ```
//!
//! `{"type":"CloseStream"}` asks the server to flush and close.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use voice_call_config::ProvidersConfig;
use voice_call_core::{
    Error, RecognizerConnection, RecognizerHandle, Result, SpeechRecognizer, TranscriptEvent,
};

const CLOSE_STREAM: &str = r#"{"type":"CloseStream"}"#;

#[derive(Debug, Clone)]
pub struct WsRecognizerConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub language: Option<String>,
    pub connect_timeout: Duration,
}

impl WsRecognizerConfig {
    pub fn from_settings(providers: &ProvidersConfig, connect_timeout: Duration) -> Self {
        Self {
            url: providers.recognizer_url.clone(),
            api_key: providers.api_key.clone(),
            language: providers.language.clone(),
            connect_timeout,
        }
    }

    fn stream_url(&self, sample_rate: u32) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        let mut url = format!(
            "{}{}encoding=linear16&sample_rate={}&channels=1&interim_results=true&endpointing=true",
            self.url, separator, sample_rate
        );
        if let Some(language) = &self.language {
            url.push_str("&language=");
            url.push_str(language);
        }
        url
    }
}

pub struct WsRecognizer {
    config: WsRecognizerConfig,
}

impl WsRecognizer {
    pub fn new(config: WsRecognizerConfig) -> Self {
        Self { config }
    }
}

#[derive(Debug, Deserialize)]
struct ResultMessage {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    speech_final: bool,
    #[serde(default)]
    channel: Option<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

/// Decode one text frame. Metadata and keep-alive messages yield `None`.
fn parse_result(text: &str) -> Result<Option<TranscriptEvent>> {
    let message: ResultMessage = serde_json::from_str(text)?;
    if message.kind != "Results" {
        return Ok(None);
    }

    let transcript = message
        .channel
        .and_then(|c| c.alternatives.into_iter().next())
        .map(|a| a.transcript)
        .unwrap_or_default();

    Ok(Some(TranscriptEvent {
        text: transcript,
        is_final: message.is_final || message.speech_final,
        is_end_of_speech: message.speech_final,
    }))
}

struct WsRecognizerConnection {
    outbound: mpsc::Sender<Message>,
    closed: AtomicBool,
}

#[async_trait]
impl RecognizerConnection for WsRecognizerConnection {
    async fn send_audio(&self, pcm16: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed("recognizer".to_string()));
        }
        self.outbound
            .send(Message::Binary(pcm16.to_vec()))
            .await
            .map_err(|_| Error::Connection("recognizer socket writer stopped".to_string()))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _ = self.outbound.send(Message::Text(CLOSE_STREAM.to_string())).await;
        let _ = self.outbound.send(Message::Close(None)).await;
        Ok(())
    }
}

#[async_trait]
impl SpeechRecognizer for WsRecognizer {
    async fn connect(&self, sample_rate: u32) -> Result<RecognizerHandle> {
        let url = self.config.stream_url(sample_rate);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::Config(format!("bad recognizer url {}: {}", url, e)))?;

        if let Some(key) = &self.config.api_key {
            let value = HeaderValue::from_str(&format!("Token {}", key))
                .map_err(|e| Error::Config(format!("bad recognizer api key: {}", e)))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (socket, _response) = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await
        .map_err(|_| Error::Timeout(self.config.connect_timeout))?
        .map_err(|e| Error::Connection(format!("recognizer connect failed: {}", e)))?;

        tracing::info!(url = %self.config.url, sample_rate, "Recognizer connected");

        let (mut sink, mut stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(64);

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let is_close = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    tracing::debug!(error = %e, "Recognizer socket write failed");
                    break;
                }
                if is_close {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let events = async_stream::stream! {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => match parse_result(&text) {
                        Ok(Some(event)) => yield Ok(event),
                        Ok(None) => {}
                        Err(e) => yield Err(e),
                    },
                    Ok(Message::Close(frame)) => {
                        tracing::debug!(?frame, "Recognizer closed the stream");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        yield Err(Error::Connection(format!("recognizer socket error: {}", e)));
                        break;
                    }
                }
            }
        };

        Ok(RecognizerHandle {
            connection: Arc::new(WsRecognizerConnection {
                outbound: outbound_tx,
                closed: AtomicBool::new(false),
            }),
            events: Box::pin(events),
        })
    }

    fn name(&self) -> &str {
        "ws-recognizer"
    }
}
