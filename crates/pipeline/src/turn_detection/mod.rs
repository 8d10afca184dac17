//! Transcript-driven turn detection
//!
//! The detector is a pure state machine. It never sleeps: when a timer is
//! needed it returns a [`TurnDecision`] carrying a generation token and the
//! delay, and the owner arms the timer and later reports expiry through
//! [`TurnDetector::on_timer`]. Every new timer bumps the token, so an expiry
//! for a superseded token is ignored and can never dispatch.

use std::time::Duration;

use voice_call_config::TurnConfig;
use voice_call_core::TranscriptEvent;

/// Turn detection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    /// Nothing buffered that is waiting to be dispatched
    #[default]
    Idle,
    /// A final transcript (or accepted barge-in) is waiting for its timer
    AwaitingSilence,
    /// Text was handed off and the response has not finished yet
    Dispatched,
}

/// What the owner should do after feeding a transcript event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDecision {
    /// No timer change
    Ignore,
    /// (Re)arm the silence timer
    ArmSilenceTimer { token: u64, delay: Duration },
    /// Stop agent playback now, then arm the dispatch timer
    Interrupt { token: u64, delay: Duration },
}

#[derive(Debug, Clone)]
pub struct TurnDetectionConfig {
    /// Silence after a final transcript before dispatching
    pub silence_timeout: Duration,
    /// Delay between an accepted barge-in and dispatch
    pub interrupt_grace: Duration,
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        Self::from(&TurnConfig::default())
    }
}

impl From<&TurnConfig> for TurnDetectionConfig {
    fn from(config: &TurnConfig) -> Self {
        Self {
            silence_timeout: Duration::from_millis(config.silence_ms),
            interrupt_grace: Duration::from_millis(config.interrupt_grace_ms),
        }
    }
}

#[derive(Debug)]
pub struct TurnDetector {
    config: TurnDetectionConfig,
    state: TurnState,
    buffer: String,
    token: u64,
}

impl TurnDetector {
    pub fn new(config: TurnDetectionConfig) -> Self {
        Self {
            config,
            state: TurnState::Idle,
            buffer: String::new(),
            token: 0,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Most recent transcript text not yet dispatched
    pub fn pending_transcript(&self) -> &str {
        &self.buffer
    }

    /// Token of the most recently armed timer
    pub fn current_token(&self) -> u64 {
        self.token
    }

    /// Feed a transcript event that already passed echo suppression.
    ///
    /// `agent_speaking` is true while a response is being generated or
    /// played. In that case only end-of-speech events are considered and each
    /// one is offered to `accept_barge_in` before interrupting.
    pub fn on_transcript<F>(
        &mut self,
        event: &TranscriptEvent,
        agent_speaking: bool,
        accept_barge_in: F,
    ) -> TurnDecision
    where
        F: FnOnce(&str) -> bool,
    {
        // Recognizers emit empty results on silence; those never replace text
        if !event.is_blank() {
            self.buffer.clear();
            self.buffer.push_str(&event.text);
        }

        if agent_speaking {
            if event.is_end_of_speech && !event.is_blank() && accept_barge_in(&event.text) {
                tracing::debug!(text = %event.text, "Barge-in accepted");
                return TurnDecision::Interrupt {
                    token: self.arm(),
                    delay: self.config.interrupt_grace,
                };
            }
            return TurnDecision::Ignore;
        }

        if self.state == TurnState::Dispatched {
            return TurnDecision::Ignore;
        }

        if event.closes_segment() && !event.is_blank() {
            return TurnDecision::ArmSilenceTimer {
                token: self.arm(),
                delay: self.config.silence_timeout,
            };
        }

        TurnDecision::Ignore
    }

    fn arm(&mut self) -> u64 {
        self.token += 1;
        self.state = TurnState::AwaitingSilence;
        self.token
    }

    /// Report a timer expiry. Returns the text to dispatch, if any.
    pub fn on_timer(&mut self, token: u64) -> Option<String> {
        if token != self.token || self.state != TurnState::AwaitingSilence {
            return None;
        }

        let text = self.buffer.trim().to_string();
        self.buffer.clear();
        if text.is_empty() {
            self.state = TurnState::Idle;
            return None;
        }

        self.state = TurnState::Dispatched;
        Some(text)
    }

    /// The dispatched turn has been answered (or abandoned)
    pub fn turn_finished(&mut self) {
        if self.state == TurnState::Dispatched {
            self.state = TurnState::Idle;
        }
    }

    /// Drop buffered text and invalidate any armed timer
    pub fn reset(&mut self) {
        self.token += 1;
        self.buffer.clear();
        self.state = TurnState::Idle;
    }
}

impl Default for TurnDetector {
    fn default() -> Self {
        Self::new(TurnDetectionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed(decision: TurnDecision) -> (u64, Duration) {
        match decision {
            TurnDecision::ArmSilenceTimer { token, delay } => (token, delay),
            other => panic!("expected silence timer, got {other:?}"),
        }
    }

    #[test]
    fn test_final_dispatches_on_its_timer() {
        let mut detector = TurnDetector::default();
        let (token, delay) = armed(detector.on_transcript(
            &TranscriptEvent::final_result("X"),
            false,
            |_| true,
        ));
        assert_eq!(delay, Duration::from_millis(500));
        assert_eq!(detector.state(), TurnState::AwaitingSilence);

        assert_eq!(detector.on_timer(token), Some("X".to_string()));
        assert_eq!(detector.state(), TurnState::Dispatched);
        assert_eq!(detector.pending_transcript(), "");

        // Same expiry cannot dispatch twice
        assert_eq!(detector.on_timer(token), None);
    }

    #[test]
    fn test_second_final_supersedes_first() {
        let mut detector = TurnDetector::default();
        let (first, _) = armed(detector.on_transcript(
            &TranscriptEvent::final_result("book a"),
            false,
            |_| true,
        ));
        let (second, _) = armed(detector.on_transcript(
            &TranscriptEvent::final_result("book a table"),
            false,
            |_| true,
        ));
        assert_ne!(first, second);

        assert_eq!(detector.on_timer(first), None);
        assert_eq!(detector.on_timer(second), Some("book a table".to_string()));
    }

    #[test]
    fn test_partials_only_update_buffer() {
        let mut detector = TurnDetector::default();
        let decision = detector.on_transcript(&TranscriptEvent::partial("hel"), false, |_| true);
        assert_eq!(decision, TurnDecision::Ignore);
        assert_eq!(detector.pending_transcript(), "hel");
        assert_eq!(detector.state(), TurnState::Idle);
    }

    #[test]
    fn test_partial_after_final_wins_buffer() {
        let mut detector = TurnDetector::default();
        let (token, _) = armed(detector.on_transcript(
            &TranscriptEvent::final_result("hello"),
            false,
            |_| true,
        ));
        detector.on_transcript(&TranscriptEvent::partial("hello there"), false, |_| true);
        assert_eq!(detector.on_timer(token), Some("hello there".to_string()));
    }

    #[test]
    fn test_blank_events_keep_buffered_text() {
        let mut detector = TurnDetector::default();
        let (token, _) = armed(detector.on_transcript(
            &TranscriptEvent::final_result("book a table"),
            false,
            |_| true,
        ));
        detector.on_transcript(&TranscriptEvent::partial(""), false, |_| true);
        let decision = detector.on_transcript(&TranscriptEvent::final_result(" "), false, |_| true);

        assert_eq!(decision, TurnDecision::Ignore);
        assert_eq!(detector.pending_transcript(), "book a table");
        assert_eq!(detector.on_timer(token), Some("book a table".to_string()));
    }

    #[test]
    fn test_blank_final_never_dispatches() {
        let mut detector = TurnDetector::default();
        let decision = detector.on_transcript(&TranscriptEvent::final_result("   "), false, |_| true);
        assert_eq!(decision, TurnDecision::Ignore);
        assert_eq!(detector.state(), TurnState::Idle);
    }

    #[test]
    fn test_no_dispatch_while_turn_pending() {
        let mut detector = TurnDetector::default();
        let (token, _) = armed(detector.on_transcript(
            &TranscriptEvent::final_result("first"),
            false,
            |_| true,
        ));
        assert!(detector.on_timer(token).is_some());

        let decision =
            detector.on_transcript(&TranscriptEvent::final_result("second"), false, |_| true);
        assert_eq!(decision, TurnDecision::Ignore);

        detector.turn_finished();
        assert_eq!(detector.state(), TurnState::Idle);
        let decision =
            detector.on_transcript(&TranscriptEvent::final_result("second"), false, |_| true);
        assert!(matches!(decision, TurnDecision::ArmSilenceTimer { .. }));
    }

    #[test]
    fn test_only_end_of_speech_interrupts_agent() {
        let mut detector = TurnDetector::default();

        let decision = detector.on_transcript(&TranscriptEvent::final_result("wait"), true, |_| true);
        assert_eq!(decision, TurnDecision::Ignore);

        let decision =
            detector.on_transcript(&TranscriptEvent::end_of_speech("wait"), true, |_| true);
        match decision {
            TurnDecision::Interrupt { token, delay } => {
                assert_eq!(delay, Duration::from_millis(300));
                assert_eq!(detector.on_timer(token), Some("wait".to_string()));
            }
            other => panic!("expected interrupt, got {other:?}"),
        }
    }

    #[test]
    fn test_rejected_barge_in_is_ignored() {
        let mut detector = TurnDetector::default();
        let mut offered = None;
        let decision = detector.on_transcript(&TranscriptEvent::end_of_speech("ok"), true, |text| {
            offered = Some(text.to_string());
            false
        });
        assert_eq!(decision, TurnDecision::Ignore);
        assert_eq!(offered.as_deref(), Some("ok"));
        assert_eq!(detector.state(), TurnState::Idle);
    }

    #[test]
    fn test_reset_invalidates_timer() {
        let mut detector = TurnDetector::default();
        let (token, _) = armed(detector.on_transcript(
            &TranscriptEvent::final_result("hello"),
            false,
            |_| true,
        ));
        detector.reset();
        assert_eq!(detector.on_timer(token), None);
        assert_eq!(detector.pending_transcript(), "");
    }
}
