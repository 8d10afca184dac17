//! Echo suppression
//!
//! On a phone line the agent's own playback leaks back into the caller's
//! microphone and the recognizer transcribes it. Two gates catch that:
//!
//! - timing: anything recognized within `window` of the last outbound audio
//!   send is treated as echo
//! - content: a transcript whose words appear as a run inside the agent's
//!   utterance (all of them, or its first few) is treated as echo. This gate
//!   holds while the agent speaks and for `window` after playback ends.
//!
//! Before the agent has produced any speech nothing is suppressed.

use tokio::time::{Duration, Instant};

use voice_call_config::EchoConfig;

/// Decides whether recognizer output is the agent's own speech
pub trait EchoPolicy: Send + Sync {
    /// Outbound audio was handed to the transport at `at`
    fn note_audio_sent(&mut self, at: Instant);

    /// Text the agent is currently speaking
    fn set_agent_utterance(&mut self, text: &str);

    /// Playback of the current utterance ended or was cut off at `at`
    fn note_speech_finished(&mut self, at: Instant);

    fn is_echo(&self, transcript: &str, now: Instant) -> bool;

    /// Whether an end-of-speech transcript may interrupt the agent
    fn accept_barge_in(&self, transcript: &str, now: Instant) -> bool;

    fn reset(&mut self);
}

#[derive(Debug, Clone)]
pub struct EchoGuardConfig {
    pub window: Duration,
    pub similarity_words: usize,
    pub min_barge_in_chars: usize,
}

impl Default for EchoGuardConfig {
    fn default() -> Self {
        Self::from(&EchoConfig::default())
    }
}

impl From<&EchoConfig> for EchoGuardConfig {
    fn from(config: &EchoConfig) -> Self {
        Self {
            window: Duration::from_millis(config.window_ms),
            similarity_words: config.similarity_words,
            min_barge_in_chars: config.min_barge_in_chars,
        }
    }
}

/// Timing window plus text similarity
#[derive(Debug, Default)]
pub struct EchoGuard {
    config: EchoGuardConfig,
    last_audio_sent_at: Option<Instant>,
    /// Lower-cased words of the agent utterance
    agent_words: Vec<String>,
    speech_finished_at: Option<Instant>,
}

impl EchoGuard {
    pub fn new(config: EchoGuardConfig) -> Self {
        Self {
            config,
            last_audio_sent_at: None,
            agent_words: Vec::new(),
            speech_finished_at: None,
        }
    }

    pub fn last_audio_sent_at(&self) -> Option<Instant> {
        self.last_audio_sent_at
    }

    fn within_window(&self, now: Instant) -> bool {
        match self.last_audio_sent_at {
            Some(sent) => now.saturating_duration_since(sent) < self.config.window,
            None => false,
        }
    }

    fn agent_text_live(&self, now: Instant) -> bool {
        if self.agent_words.is_empty() {
            return false;
        }
        match self.speech_finished_at {
            Some(finished) => now.saturating_duration_since(finished) < self.config.window,
            None => true,
        }
    }

    fn matches_agent_text(&self, transcript: &str, now: Instant) -> bool {
        if !self.agent_text_live(now) {
            return false;
        }

        let words = words(transcript);
        if words.is_empty() {
            return false;
        }
        if contains_run(&self.agent_words, &words) {
            return true;
        }

        let leading = self.config.similarity_words;
        leading > 0 && words.len() > leading && contains_run(&self.agent_words, &words[..leading])
    }
}

impl EchoPolicy for EchoGuard {
    fn note_audio_sent(&mut self, at: Instant) {
        self.last_audio_sent_at = Some(at);
    }

    fn set_agent_utterance(&mut self, text: &str) {
        self.agent_words = words(text);
        self.speech_finished_at = None;
    }

    fn note_speech_finished(&mut self, at: Instant) {
        if !self.agent_words.is_empty() {
            self.speech_finished_at.get_or_insert(at);
        }
    }

    fn is_echo(&self, transcript: &str, now: Instant) -> bool {
        self.within_window(now) || self.matches_agent_text(transcript, now)
    }

    fn accept_barge_in(&self, transcript: &str, now: Instant) -> bool {
        transcript.trim().chars().count() >= self.config.min_barge_in_chars
            && !self.is_echo(transcript, now)
    }

    fn reset(&mut self) {
        self.last_audio_sent_at = None;
        self.agent_words.clear();
        self.speech_finished_at = None;
    }
}

/// Lower-cased words with surrounding punctuation stripped
fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| c.is_ascii_punctuation() || c == '।')
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && needle.len() <= haystack.len()
        && haystack.windows(needle.len()).any(|window| window == needle)
}
