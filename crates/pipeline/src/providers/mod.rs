//! Speech provider adapters
//!
//! - `WsRecognizer`: streaming recognizer over WebSocket (binary PCM16 in,
//!   JSON results out)
//! - `HttpSynthesizer`: synthesizer returning a chunked PCM16 HTTP body

mod http_synthesizer;
mod ws_recognizer;

pub use http_synthesizer::{HttpSynthesizer, HttpSynthesizerConfig};
pub use ws_recognizer::{WsRecognizer, WsRecognizerConfig};
