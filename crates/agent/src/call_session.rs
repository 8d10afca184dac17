//! Call Session
//!
//! Owns one phone call from the telephony `start` event until teardown.
//!
//! ## Flow
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌───────────┐   ┌──────────────┐   ┌─────────┐
//! │ Telephony │──▶│ Recognizer │──▶│ Echo gate │──▶│ Turn detector│──▶│   LLM   │
//! └───────────┘   └────────────┘   └───────────┘   └──────────────┘   └─────────┘
//!       ▲                                                                  │
//!       │         ┌───────────┐   ┌─────────────┐                          │
//!       └─────────│ Resampler │◀──│ Synthesizer │◀─────────────────────────┘
//!                 └───────────┘   └─────────────┘
//! ```
//!
//! All state is owned by the task running [`CallSession::run`]. Provider
//! streams, timers and model requests run as spawned tasks that report back
//! through a single signal channel, so state transitions happen one at a time
//! and in arrival order. Work that can go stale carries a sequence number:
//! model replies are tagged with the turn sequence and synthesis output with
//! the synthesis id, and anything that no longer matches is dropped.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use voice_call_config::Settings;
use voice_call_core::{
    Error, LanguageModel, OutboundMessage, RecognizerConnection, RecognizerHandle,
    SpeechRecognizer, SpeechSynthesizer, SynthesisConnection, SynthesisEvent, SynthesisHandle,
    TelephonyTransport, TranscriptEvent, Turn,
};
use voice_call_pipeline::{
    EchoGuard, EchoGuardConfig, EchoPolicy, Resampler, TurnDecision, TurnDetectionConfig,
    TurnDetector,
};

use crate::{AgentError, ConversationState};

const SIGNAL_CAPACITY: usize = 256;
const EVENT_CAPACITY: usize = 64;

/// Call session configuration
#[derive(Debug, Clone)]
pub struct CallSessionConfig {
    /// Rate caller audio is forwarded to the recognizer at
    pub recognizer_sample_rate: u32,
    /// Bound on establishing each provider connection
    pub connect_timeout: Duration,
    /// Spoken right after the call starts. Not stored in history.
    pub greeting: Option<String>,
    /// Conversation history cap, in turns
    pub max_history: usize,
    pub turn: TurnDetectionConfig,
    pub echo: EchoGuardConfig,
    pub resampler: Resampler,
}

impl CallSessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            recognizer_sample_rate: settings.pipeline.audio.recognizer_sample_rate,
            connect_timeout: Duration::from_millis(settings.server.connect_timeout_ms),
            greeting: settings.conversation.greeting.clone(),
            max_history: settings.conversation.max_history,
            turn: TurnDetectionConfig::from(&settings.pipeline.turn),
            echo: EchoGuardConfig::from(&settings.pipeline.echo),
            resampler: Resampler::from_config(&settings.pipeline.audio),
        }
    }
}

impl Default for CallSessionConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// External providers a session talks to
#[derive(Clone)]
pub struct Capabilities {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub model: Arc<dyn LanguageModel>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

/// Events from the telephony leg
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Start { call_id: String, stream_id: String },
    /// Caller audio, PCM16 mono at the transport rate
    Audio(Vec<u8>),
    Stop,
    TransportClosed,
    TransportError(String),
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Active,
    Closing,
    Closed,
}

/// Where the session is within the current exchange
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    ListeningForTurn,
    /// Waiting on the language model to answer this text
    PendingResponse(String),
    Speaking,
}

/// Observable session milestones
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started { call_id: String },
    TurnDispatched { text: String },
    Responded { text: String },
    BargeIn { text: String },
    Ended { reason: String },
}

/// Results reported back to the session task
enum Signal {
    Transcript(voice_call_core::Result<TranscriptEvent>),
    RecognizerEnded,
    TurnTimer(u64),
    Generation {
        seq: u64,
        user_text: String,
        reply: voice_call_core::Result<String>,
    },
    SynthesisStarted {
        id: u64,
        connection: Arc<dyn SynthesisConnection>,
    },
    Synthesis {
        id: u64,
        event: voice_call_core::Result<SynthesisEvent>,
    },
    SynthesisFailed {
        id: u64,
        error: Error,
    },
}

struct ActiveSynthesis {
    id: u64,
    /// Set once the synthesizer accepted the request
    connection: Option<Arc<dyn SynthesisConnection>>,
    task: JoinHandle<()>,
    /// Odd trailing byte held back from the previous chunk
    carry: Option<u8>,
    started_at: Instant,
    first_chunk_at: Option<Instant>,
    audio_sent: bool,
    /// Reply to a user turn rather than the greeting
    is_reply: bool,
}

pub struct CallSession {
    config: CallSessionConfig,
    capabilities: Capabilities,
    transport: Arc<dyn TelephonyTransport>,
    phase: SessionPhase,
    turn: TurnPhase,
    call_id: Option<String>,
    stream_id: Option<String>,
    conversation: ConversationState,
    detector: TurnDetector,
    echo: Box<dyn EchoPolicy>,
    recognizer: Option<Arc<dyn RecognizerConnection>>,
    recognizer_task: Option<JoinHandle<()>>,
    synthesis: Option<ActiveSynthesis>,
    synthesis_seq: u64,
    turn_timer: Option<JoinHandle<()>>,
    generation: Option<JoinHandle<()>>,
    /// Turn dispatched while a stale model request was still running
    queued_turn: Option<String>,
    turn_seq: u64,
    last_audio_sent_at: Option<Instant>,
    last_user_speech_end_at: Option<Instant>,
    started_at: Option<Instant>,
    signal_tx: mpsc::Sender<Signal>,
    signal_rx: mpsc::Receiver<Signal>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl CallSession {
    pub fn new(
        config: CallSessionConfig,
        capabilities: Capabilities,
        transport: Arc<dyn TelephonyTransport>,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            conversation: ConversationState::new(config.max_history),
            detector: TurnDetector::new(config.turn.clone()),
            echo: Box::new(EchoGuard::new(config.echo.clone())),
            config,
            capabilities,
            transport,
            phase: SessionPhase::Idle,
            turn: TurnPhase::Idle,
            call_id: None,
            stream_id: None,
            recognizer: None,
            recognizer_task: None,
            synthesis: None,
            synthesis_seq: 0,
            turn_timer: None,
            generation: None,
            queued_turn: None,
            turn_seq: 0,
            last_audio_sent_at: None,
            last_user_speech_end_at: None,
            started_at: None,
            signal_tx,
            signal_rx,
            event_tx,
        }
    }

    /// Replace the default echo guard
    pub fn with_echo_policy(mut self, policy: Box<dyn EchoPolicy>) -> Self {
        self.echo = policy;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn turn_phase(&self) -> &TurnPhase {
        &self.turn
    }

    pub fn call_id(&self) -> Option<&str> {
        self.call_id.as_deref()
    }

    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    pub fn history(&self) -> Vec<Turn> {
        self.conversation.turns()
    }

    pub fn last_audio_sent_at(&self) -> Option<Instant> {
        self.last_audio_sent_at
    }

    pub fn last_user_speech_end_at(&self) -> Option<Instant> {
        self.last_user_speech_end_at
    }

    /// A reply is being generated or played
    pub fn agent_speaking(&self) -> bool {
        matches!(self.turn, TurnPhase::PendingResponse(_) | TurnPhase::Speaking)
    }

    /// Drive the session until the call ends.
    ///
    /// Returns an error only if the session could not be initialized.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<CallEvent>) -> Result<(), AgentError> {
        let result = loop {
            tokio::select! {
                event = inbound.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_event(event).await {
                            tracing::error!(
                                call_id = self.call_id.as_deref().unwrap_or("-"),
                                error = %e,
                                "Call session failed to start"
                            );
                            self.shutdown("initialization failed").await;
                            break Err(e);
                        }
                    }
                    None => self.shutdown("inbound stream ended").await,
                },
                Some(signal) = self.signal_rx.recv() => self.handle_signal(signal).await,
            }

            if self.phase == SessionPhase::Closed {
                break Ok(());
            }
        };

        self.shutdown("session finished").await;
        self.drain_signals().await;
        result
    }

    /// Apply one telephony event
    pub async fn handle_event(&mut self, event: CallEvent) -> Result<(), AgentError> {
        match event {
            CallEvent::Start { call_id, stream_id } => self.start(call_id, stream_id).await?,
            CallEvent::Audio(pcm) => self.forward_audio(pcm).await,
            CallEvent::Stop => {
                tracing::info!(call_id = self.call_id.as_deref().unwrap_or("-"), "Call stopped");
                self.shutdown("call stopped").await;
            }
            CallEvent::TransportClosed => self.shutdown("transport closed").await,
            CallEvent::TransportError(message) => {
                tracing::warn!(
                    call_id = self.call_id.as_deref().unwrap_or("-"),
                    error = %message,
                    "Telephony transport error"
                );
                self.shutdown("transport error").await;
            }
        }
        Ok(())
    }

    /// Tear the session down. Safe to call any number of times.
    pub async fn cleanup(&mut self) {
        self.shutdown("cleanup").await;
    }

    async fn start(&mut self, call_id: String, stream_id: String) -> Result<(), AgentError> {
        if self.phase != SessionPhase::Idle {
            tracing::warn!(call_id = %call_id, "Ignoring start for a session that already started");
            return Ok(());
        }

        tracing::info!(call_id = %call_id, stream_id = %stream_id, "Call started");
        self.call_id = Some(call_id.clone());
        self.stream_id = Some(stream_id);
        self.started_at = Some(Instant::now());

        let timeout = self.config.connect_timeout;
        let connect = self
            .capabilities
            .recognizer
            .connect(self.config.recognizer_sample_rate);
        let RecognizerHandle {
            connection,
            mut events,
        } = match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                return Err(AgentError::Init(format!(
                    "{} connect failed: {}",
                    self.capabilities.recognizer.name(),
                    e
                )))
            }
            Err(_) => return Err(AgentError::Timeout(timeout)),
        };
        self.recognizer = Some(connection);

        let tx = self.signal_tx.clone();
        self.recognizer_task = Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if tx.send(Signal::Transcript(event)).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(Signal::RecognizerEnded).await;
        }));

        self.phase = SessionPhase::Active;
        self.turn = TurnPhase::ListeningForTurn;
        metrics::counter!("voice_call_calls_started_total").increment(1);
        self.emit(SessionEvent::Started { call_id });

        if let Some(greeting) = self.config.greeting.clone() {
            if !greeting.trim().is_empty() {
                self.speak(greeting, false).await;
            }
        }
        Ok(())
    }

    async fn forward_audio(&mut self, pcm: Vec<u8>) {
        if self.phase != SessionPhase::Active {
            tracing::trace!("Dropping caller audio outside an active call");
            return;
        }
        let Some(recognizer) = self.recognizer.clone() else {
            return;
        };

        let source_rate = self.transport.sample_rate().as_u32();
        let audio = match self.config.resampler.resample(
            &pcm,
            source_rate,
            self.config.recognizer_sample_rate,
        ) {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to convert caller audio");
                return;
            }
        };

        match recognizer.send_audio(&audio).await {
            Ok(()) => {}
            Err(Error::TransportNotOpen) | Err(Error::Closed(_)) => {
                tracing::debug!("Recognizer not open, skipping caller audio");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to forward caller audio");
            }
        }
    }

    async fn handle_signal(&mut self, signal: Signal) {
        if self.phase != SessionPhase::Active {
            if let Signal::SynthesisStarted { connection, .. } = signal {
                close_synthesis(connection).await;
            }
            return;
        }

        match signal {
            Signal::Transcript(Ok(event)) => self.on_transcript(event).await,
            Signal::Transcript(Err(e)) => self.on_recognizer_error(e).await,
            Signal::RecognizerEnded => {
                tracing::warn!(
                    call_id = self.call_id.as_deref().unwrap_or("-"),
                    "Recognizer stream ended"
                );
                self.shutdown("recognizer closed").await;
            }
            Signal::TurnTimer(token) => {
                if let Some(text) = self.detector.on_timer(token) {
                    self.dispatch_turn(text);
                }
            }
            Signal::Generation {
                seq,
                user_text,
                reply,
            } => self.on_generation(seq, user_text, reply).await,
            Signal::SynthesisStarted { id, connection } => match self.synthesis.as_mut() {
                Some(active) if active.id == id => active.connection = Some(connection),
                _ => {
                    tracing::debug!(synthesis_id = id, "Closing superseded synthesis");
                    close_synthesis(connection).await;
                }
            },
            Signal::Synthesis { id, event } => match event {
                Ok(SynthesisEvent::Audio(chunk)) => self.on_synthesis_audio(id, chunk).await,
                Ok(SynthesisEvent::Complete) => self.on_synthesis_complete(id).await,
                Err(e) => self.on_synthesis_error(id, e).await,
            },
            Signal::SynthesisFailed { id, error } => self.on_synthesis_error(id, error).await,
        }
    }

    async fn on_transcript(&mut self, event: TranscriptEvent) {
        let now = Instant::now();

        if !event.is_blank() && self.echo.is_echo(&event.text, now) {
            tracing::debug!(text = %event.text, "Discarding transcript as echo");
            metrics::counter!("voice_call_echo_discards_total").increment(1);
            return;
        }

        if event.closes_segment() {
            self.last_user_speech_end_at = Some(now);
        }

        let speaking = self.agent_speaking();
        let decision = {
            let echo = &self.echo;
            self.detector
                .on_transcript(&event, speaking, |text| echo.accept_barge_in(text, now))
        };

        match decision {
            TurnDecision::Ignore => {}
            TurnDecision::ArmSilenceTimer { token, delay } => self.arm_turn_timer(token, delay),
            TurnDecision::Interrupt { token, delay } => {
                self.barge_in(event.text).await;
                self.arm_turn_timer(token, delay);
            }
        }
    }

    async fn on_recognizer_error(&mut self, error: Error) {
        match error {
            Error::MalformedMessage(detail) => {
                tracing::debug!(detail = %detail, "Discarding malformed recognizer message");
            }
            Error::Connection(_) | Error::Closed(_) => {
                tracing::error!(
                    call_id = self.call_id.as_deref().unwrap_or("-"),
                    error = %error,
                    "Recognizer connection lost"
                );
                metrics::counter!("voice_call_errors_total", "kind" => error.kind()).increment(1);
                self.shutdown("recognizer connection lost").await;
            }
            other => {
                tracing::warn!(error = %other, "Recognizer error");
            }
        }
    }

    fn arm_turn_timer(&mut self, token: u64, delay: Duration) {
        if let Some(timer) = self.turn_timer.take() {
            timer.abort();
        }

        let tx = self.signal_tx.clone();
        self.turn_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Signal::TurnTimer(token)).await;
        }));
    }

    /// Stop playback so the caller can take the floor
    async fn barge_in(&mut self, text: String) {
        tracing::info!(
            call_id = self.call_id.as_deref().unwrap_or("-"),
            text = %text,
            "Barge-in, stopping playback"
        );
        metrics::counter!("voice_call_barge_ins_total").increment(1);

        // Any reply still being generated belongs to the interrupted exchange
        self.turn_seq += 1;
        self.stop_synthesis().await;

        let stream_id = self.stream_id.clone();
        self.send_outbound(OutboundMessage::ClearAudio { stream_id })
            .await;

        self.turn = TurnPhase::ListeningForTurn;
        self.emit(SessionEvent::BargeIn { text });
    }

    fn dispatch_turn(&mut self, text: String) {
        self.turn_seq += 1;
        tracing::info!(
            call_id = self.call_id.as_deref().unwrap_or("-"),
            turn_seq = self.turn_seq,
            text = %text,
            "Turn dispatched"
        );
        metrics::counter!("voice_call_turns_total").increment(1);

        self.turn = TurnPhase::PendingResponse(text.clone());
        self.emit(SessionEvent::TurnDispatched { text: text.clone() });

        if self.generation.is_some() {
            tracing::debug!("Stale model request still in flight, queueing turn");
            self.queued_turn = Some(text);
            return;
        }
        self.request_generation(text);
    }

    fn request_generation(&mut self, text: String) {
        let seq = self.turn_seq;
        let history = self.conversation.turns();
        let model = Arc::clone(&self.capabilities.model);
        let tx = self.signal_tx.clone();

        self.generation = Some(tokio::spawn(async move {
            let started = Instant::now();
            let reply = model.generate(&history, &text).await;
            metrics::histogram!("voice_call_llm_latency_seconds")
                .record(started.elapsed().as_secs_f64());
            let _ = tx
                .send(Signal::Generation {
                    seq,
                    user_text: text,
                    reply,
                })
                .await;
        }));
    }

    async fn on_generation(
        &mut self,
        seq: u64,
        user_text: String,
        reply: voice_call_core::Result<String>,
    ) {
        self.generation = None;

        if seq != self.turn_seq {
            tracing::debug!(
                seq,
                current = self.turn_seq,
                "Discarding reply for an interrupted turn"
            );
            metrics::counter!("voice_call_stale_replies_total").increment(1);
            if let Some(text) = self.queued_turn.take() {
                self.request_generation(text);
            }
            return;
        }

        match reply {
            Ok(reply) => {
                tracing::info!(
                    call_id = self.call_id.as_deref().unwrap_or("-"),
                    turn_seq = seq,
                    reply = %reply,
                    "Reply generated"
                );
                self.conversation.append_exchange(user_text, reply.clone());
                self.emit(SessionEvent::Responded {
                    text: reply.clone(),
                });
                self.speak(reply, true).await;
            }
            Err(e) => {
                tracing::error!(
                    call_id = self.call_id.as_deref().unwrap_or("-"),
                    error = %e,
                    "Language model failed"
                );
                metrics::counter!("voice_call_errors_total", "kind" => e.kind()).increment(1);
                self.finish_turn();
            }
        }
    }

    async fn speak(&mut self, text: String, is_reply: bool) {
        self.stop_synthesis().await;
        self.echo.set_agent_utterance(&text);
        self.turn = TurnPhase::Speaking;

        self.synthesis_seq += 1;
        let id = self.synthesis_seq;
        let synthesizer = Arc::clone(&self.capabilities.synthesizer);
        let timeout = self.config.connect_timeout;
        let tx = self.signal_tx.clone();

        let task = tokio::spawn(async move {
            let SynthesisHandle {
                connection,
                mut events,
            } = match tokio::time::timeout(timeout, synthesizer.synthesize(&text)).await {
                Ok(Ok(handle)) => handle,
                Ok(Err(error)) => {
                    let _ = tx.send(Signal::SynthesisFailed { id, error }).await;
                    return;
                }
                Err(_) => {
                    let error = Error::Timeout(timeout);
                    let _ = tx.send(Signal::SynthesisFailed { id, error }).await;
                    return;
                }
            };

            if tx
                .send(Signal::SynthesisStarted { id, connection })
                .await
                .is_err()
            {
                return;
            }

            while let Some(event) = events.next().await {
                let complete = matches!(event, Ok(SynthesisEvent::Complete));
                if tx.send(Signal::Synthesis { id, event }).await.is_err() || complete {
                    return;
                }
            }
            let event = Ok(SynthesisEvent::Complete);
            let _ = tx.send(Signal::Synthesis { id, event }).await;
        });

        self.synthesis = Some(ActiveSynthesis {
            id,
            connection: None,
            task,
            carry: None,
            started_at: Instant::now(),
            first_chunk_at: None,
            audio_sent: false,
            is_reply,
        });
    }

    async fn on_synthesis_audio(&mut self, id: u64, chunk: Vec<u8>) {
        let pcm = {
            let Some(active) = self.synthesis.as_mut().filter(|s| s.id == id) else {
                tracing::trace!(synthesis_id = id, "Dropping audio from stopped synthesis");
                return;
            };

            if active.first_chunk_at.is_none() {
                let now = Instant::now();
                active.first_chunk_at = Some(now);
                metrics::histogram!("voice_call_tts_ttfb_seconds")
                    .record((now - active.started_at).as_secs_f64());
            }

            let mut pcm = Vec::with_capacity(chunk.len() + 1);
            pcm.extend(active.carry.take());
            pcm.extend_from_slice(&chunk);
            if pcm.len() % 2 == 1 {
                active.carry = pcm.pop();
            }
            pcm
        };
        if pcm.is_empty() {
            return;
        }

        let target = self.transport.sample_rate();
        let audio = match self.config.resampler.prepare_outbound(
            &pcm,
            self.capabilities.synthesizer.sample_rate(),
            target.as_u32(),
        ) {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to convert synthesized audio");
                return;
            }
        };

        let message = OutboundMessage::PlayAudio {
            audio,
            sample_rate: target,
        };
        if !self.send_outbound(message).await {
            return;
        }

        let now = Instant::now();
        self.last_audio_sent_at = Some(now);
        self.echo.note_audio_sent(now);

        let speech_end = self.last_user_speech_end_at;
        if let Some(active) = self.synthesis.as_mut() {
            if !active.audio_sent {
                active.audio_sent = true;
                if let (true, Some(end)) = (active.is_reply, speech_end) {
                    metrics::histogram!("voice_call_response_latency_seconds")
                        .record((now - end).as_secs_f64());
                }
            }
        }
    }

    async fn on_synthesis_complete(&mut self, id: u64) {
        if !matches!(&self.synthesis, Some(active) if active.id == id) {
            return;
        }
        if let Some(active) = self.synthesis.take() {
            self.echo.note_speech_finished(Instant::now());
            tracing::debug!(
                synthesis_id = id,
                elapsed_ms = active.started_at.elapsed().as_millis() as u64,
                "Synthesis complete"
            );
            if let Some(connection) = active.connection {
                close_synthesis(connection).await;
            }
        }
        self.finish_turn();
    }

    async fn on_synthesis_error(&mut self, id: u64, error: Error) {
        if !matches!(&self.synthesis, Some(active) if active.id == id) {
            return;
        }
        tracing::warn!(
            call_id = self.call_id.as_deref().unwrap_or("-"),
            error = %error,
            "Synthesis failed"
        );
        metrics::counter!("voice_call_errors_total", "kind" => error.kind()).increment(1);
        self.stop_synthesis().await;
        self.finish_turn();
    }

    fn finish_turn(&mut self) {
        if self.phase != SessionPhase::Active {
            return;
        }
        self.turn = TurnPhase::ListeningForTurn;
        self.detector.turn_finished();
    }

    /// Stop the current synthesis. Audio still queued for it is dropped on
    /// arrival because its id no longer matches.
    async fn stop_synthesis(&mut self) {
        if let Some(active) = self.synthesis.take() {
            active.task.abort();
            self.echo.note_speech_finished(Instant::now());
            if let Some(connection) = active.connection {
                close_synthesis(connection).await;
            }
        }
    }

    async fn send_outbound(&mut self, message: OutboundMessage) -> bool {
        if !self.transport.is_open() {
            tracing::debug!(
                call_id = self.call_id.as_deref().unwrap_or("-"),
                "Transport not open, skipping outbound message"
            );
            return false;
        }

        match self.transport.send(message).await {
            Ok(()) => true,
            Err(Error::TransportNotOpen) => {
                tracing::debug!("Transport closed, skipping outbound message");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send outbound message");
                false
            }
        }
    }

    async fn shutdown(&mut self, reason: &str) {
        if matches!(self.phase, SessionPhase::Closing | SessionPhase::Closed) {
            return;
        }
        self.phase = SessionPhase::Closing;
        tracing::info!(
            call_id = self.call_id.as_deref().unwrap_or("-"),
            reason,
            turns = self.conversation.len(),
            "Closing call session"
        );

        if let Some(timer) = self.turn_timer.take() {
            timer.abort();
        }
        if let Some(generation) = self.generation.take() {
            generation.abort();
        }
        self.queued_turn = None;

        self.stop_synthesis().await;

        if let Some(task) = self.recognizer_task.take() {
            task.abort();
        }
        if let Some(recognizer) = self.recognizer.take() {
            if let Err(e) = recognizer.close().await {
                tracing::warn!(error = %e, "Failed to close recognizer");
            }
        }

        self.detector.reset();
        self.echo.reset();
        self.turn = TurnPhase::Idle;
        self.phase = SessionPhase::Closed;

        if let Some(started) = self.started_at {
            metrics::histogram!("voice_call_call_duration_seconds")
                .record(started.elapsed().as_secs_f64());
        }
        self.emit(SessionEvent::Ended {
            reason: reason.to_string(),
        });
    }

    /// Close any synthesis connection whose handoff was still queued
    async fn drain_signals(&mut self) {
        while let Ok(signal) = self.signal_rx.try_recv() {
            if let Signal::SynthesisStarted { connection, .. } = signal {
                close_synthesis(connection).await;
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}

async fn close_synthesis(connection: Arc<dyn SynthesisConnection>) {
    if let Err(e) = connection.close().await {
        tracing::warn!(error = %e, "Failed to close synthesis connection");
    }
}
