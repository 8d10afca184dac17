//! HTTP streaming synthesizer
//!
//! POSTs the text and reads the chunked response body as raw linear16 audio
//! at the configured native rate. Closing the connection aborts the body
//! reader, so no further chunks are produced.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use voice_call_config::ProvidersConfig;
use voice_call_core::{
    Error, Result, SpeechSynthesizer, SynthesisConnection, SynthesisEvent, SynthesisHandle,
};

#[derive(Debug, Clone)]
pub struct HttpSynthesizerConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub voice: Option<String>,
    pub sample_rate: u32,
    pub connect_timeout: Duration,
}

impl HttpSynthesizerConfig {
    pub fn from_settings(providers: &ProvidersConfig, connect_timeout: Duration) -> Self {
        Self {
            url: providers.synthesizer_url.clone(),
            api_key: providers.api_key.clone(),
            voice: providers.voice.clone(),
            sample_rate: providers.synthesizer_sample_rate,
            connect_timeout,
        }
    }
}

#[derive(Debug, Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
    encoding: &'static str,
    sample_rate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
}

pub struct HttpSynthesizer {
    config: HttpSynthesizerConfig,
    client: reqwest::Client,
}

impl HttpSynthesizer {
    pub fn new(config: HttpSynthesizerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

struct HttpSynthesisConnection {
    reader: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl SynthesisConnection for HttpSynthesisConnection {
    async fn close(&self) -> Result<()> {
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesisHandle> {
        let body = SpeakRequest {
            text,
            encoding: "linear16",
            sample_rate: self.config.sample_rate,
            voice: self.config.voice.as_deref(),
        };

        let mut request = self.client.post(&self.config.url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Token {}", key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(self.config.connect_timeout)
            } else {
                Error::Connection(format!("synthesizer request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited { retry_after: None });
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!("synthesizer returned {}: {}", status, detail)));
        }

        let (tx, rx) = mpsc::channel(32);
        let reader = tokio::spawn(async move {
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let event = match chunk {
                    Ok(bytes) if bytes.is_empty() => continue,
                    Ok(bytes) => Ok(SynthesisEvent::Audio(bytes.to_vec())),
                    Err(e) => {
                        let _ = tx
                            .send(Err(Error::Connection(format!("synthesizer body: {}", e))))
                            .await;
                        return;
                    }
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(Ok(SynthesisEvent::Complete)).await;
        });

        Ok(SynthesisHandle {
            connection: Arc::new(HttpSynthesisConnection {
                reader: Mutex::new(Some(reader)),
            }),
            events: Box::pin(ReceiverStream::new(rx)),
        })
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn name(&self) -> &str {
        "http-synthesizer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let body = SpeakRequest {
            text: "hello",
            encoding: "linear16",
            sample_rate: 24000,
            voice: None,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"text":"hello","encoding":"linear16","sample_rate":24000}"#
        );
    }

    #[tokio::test]
    async fn test_close_aborts_reader() {
        let reader = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let connection = HttpSynthesisConnection {
            reader: Mutex::new(Some(reader)),
        };
        connection.close().await.unwrap();
        connection.close().await.unwrap();
        assert!(connection.reader.lock().is_none());
    }

    #[test]
    fn test_config_from_settings() {
        let providers = ProvidersConfig::default();
        let config = HttpSynthesizerConfig::from_settings(&providers, Duration::from_secs(8));
        assert_eq!(config.sample_rate, 24000);
        assert!(HttpSynthesizer::new(config).is_ok());
    }
}
