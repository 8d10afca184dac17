//! Capability interfaces
//!
//! The call session only talks to the outside world through these traits:
//!
//! Speech:
//!   - SpeechRecognizer: streaming transcription of caller audio
//!   - SpeechSynthesizer: streaming synthesis of agent replies
//!
//! LLM:
//!   - LanguageModel: one reply per dispatched user turn
//!
//! Transport:
//!   - TelephonyTransport: outbound playback/control messages to the call leg

mod llm;
mod speech;
mod transport;

pub use llm::LanguageModel;
pub use speech::{
    RecognizerConnection, RecognizerHandle, SpeechRecognizer, SpeechSynthesizer,
    SynthesisConnection, SynthesisEvent, SynthesisHandle, SynthesisStream, TranscriptStream,
};
pub use transport::{OutboundMessage, TelephonyTransport};
