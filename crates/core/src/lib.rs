//! Core traits and types for the telephony voice agent
//!
//! This crate provides foundational types used across all other crates:
//! - Capability traits for the external providers (recognizer, language model,
//!   synthesizer, telephony transport)
//! - PCM16 audio helpers
//! - Transcript and conversation types
//! - Error types

pub mod audio;
pub mod conversation;
pub mod error;
pub mod transcript;
pub mod traits;

pub use audio::{AudioFrame, SampleRate};
pub use conversation::{Turn, TurnRole};
pub use error::{Error, Result};
pub use transcript::TranscriptEvent;

pub use traits::{
    LanguageModel, OutboundMessage, RecognizerConnection, RecognizerHandle, SpeechRecognizer,
    SpeechSynthesizer, SynthesisConnection, SynthesisEvent, SynthesisHandle, SynthesisStream,
    TelephonyTransport, TranscriptStream,
};
