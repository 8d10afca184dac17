//! Centralized defaults for the call pipeline
//!
//! Default impls across the workspace read from here so that a value only
//! has to change in one place.

/// Turn-taking timing
pub mod turn_detection {
    /// Silence after a final transcript before the turn is dispatched
    pub const SILENCE_TIMEOUT_MS: u64 = 500;

    /// Delay between accepting a barge-in and dispatching its transcript
    pub const INTERRUPT_GRACE_MS: u64 = 300;
}

/// Echo suppression
pub mod echo {
    /// Transcripts arriving this soon after outbound audio are treated as echo
    pub const WINDOW_MS: u64 = 3500;

    /// Allowed range for the echo window
    pub const WINDOW_MIN_MS: u64 = 3000;
    pub const WINDOW_MAX_MS: u64 = 4000;

    /// Leading words compared against the agent's utterance
    pub const SIMILARITY_WORDS: usize = 3;

    /// Shortest trimmed transcript allowed to interrupt the agent
    pub const MIN_BARGE_IN_CHARS: usize = 3;
}

/// Audio conversion
pub mod audio {
    /// Lanczos kernel half-width
    pub const LANCZOS_A: usize = 3;

    /// Zero padding appended to every outbound chunk
    pub const SILENCE_PAD_MS: u64 = 100;

    /// Telephony leg rate
    pub const TELEPHONY_SAMPLE_RATE: u32 = 8000;

    /// Rate audio is streamed to the recognizer at
    pub const RECOGNIZER_SAMPLE_RATE: u32 = 8000;

    /// Native rate of the synthesizer output
    pub const SYNTHESIZER_SAMPLE_RATE: u32 = 24000;

    /// Playback content type expected by the telephony leg
    pub const CONTENT_TYPE: &str = "audio/x-l16";
}

/// Conversation history
pub mod conversation {
    /// Maximum stored turns (user + assistant entries)
    pub const MAX_HISTORY: usize = 20;
}

/// Language model requests
pub mod llm {
    pub const MAX_RETRIES: u32 = 3;
    pub const INITIAL_BACKOFF_MS: u64 = 500;
    pub const MAX_BACKOFF_MS: u64 = 4000;
    pub const TIMEOUT_SECS: u64 = 20;
    pub const MAX_TOKENS: u32 = 200;
    pub const TEMPERATURE: f32 = 0.4;
    pub const FALLBACK_REPLY: &str = "Sorry, could you please repeat that?";
    pub const SYSTEM_PROMPT: &str = "You are a friendly phone assistant. Keep every reply to one or two short spoken sentences without lists or markup.";
}

/// Service endpoints (defaults for local development)
pub mod endpoints {
    pub const LLM_DEFAULT: &str = "http://localhost:11434/v1";
    pub const RECOGNIZER_DEFAULT: &str = "ws://localhost:8765/v1/listen";
    pub const SYNTHESIZER_DEFAULT: &str = "http://localhost:8766/v1/speak";
}

/// Server
pub mod server {
    pub const PORT: u16 = 8080;
    pub const WS_PATH: &str = "/ws/telephony";
    pub const MAX_CALLS: usize = 100;
    pub const CONNECT_TIMEOUT_MS: u64 = 8000;
}
