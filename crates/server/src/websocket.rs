//! Telephony WebSocket Handler
//!
//! One connection carries one call. The reader half decodes provider events
//! and feeds the call session; outbound frames queued by the session's
//! transport are drained into the writer half by a separate task. The
//! connection is unregistered once the session has torn down.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use voice_call_agent::{AgentError, CallEvent, CallSession};
use voice_call_core::TelephonyTransport;
use voice_call_transport::{decode_binary, decode_text, ChannelTransport, InboundEvent};

use crate::metrics;
use crate::state::AppState;

const OUTBOUND_CAPACITY: usize = 256;
const INBOUND_CAPACITY: usize = 256;

/// Result of reading one socket message
enum Inbound {
    Event(InboundEvent),
    Skip,
    Closed,
    Failed(String),
}

/// Upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<Response, StatusCode> {
    if state.calls.is_full() {
        tracing::warn!(max_calls = state.calls.max_calls(), "Rejecting connection, call limit reached");
        metrics::record_rejected_connection();
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state)))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = match state.calls.register() {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping connection");
            metrics::record_rejected_connection();
            return;
        }
    };
    metrics::record_connection();
    metrics::record_active_calls(state.calls.count());
    tracing::info!(connection_id = %connection_id, "Telephony stream connected");

    let (transport, mut frames) =
        match ChannelTransport::from_config(&state.settings.telephony, OUTBOUND_CAPACITY) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, "Invalid telephony configuration");
                state.calls.remove(&connection_id);
                return;
            }
        };
    let transport = Arc::new(transport);

    let (mut sink, mut stream) = socket.split();

    let writer_transport = Arc::clone(&transport);
    let writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if let Err(e) = sink.send(Message::Text(frame)).await {
                tracing::debug!(error = %e, "WebSocket send failed");
                break;
            }
        }
        writer_transport.close();
        let _ = sink.close().await;
    });

    let (events, events_rx) = mpsc::channel(INBOUND_CAPACITY);
    let session = CallSession::new(
        state.session_config(),
        state.capabilities.clone(),
        Arc::clone(&transport) as Arc<dyn TelephonyTransport>,
    );
    let mut session_task = tokio::spawn(session.run(events_rx));

    let mut finished = None;
    loop {
        tokio::select! {
            message = stream.next() => {
                let event = match read_message(message) {
                    Inbound::Event(event) => event,
                    Inbound::Skip => continue,
                    Inbound::Closed => {
                        let _ = events.send(CallEvent::TransportClosed).await;
                        break;
                    }
                    Inbound::Failed(error) => {
                        let _ = events.send(CallEvent::TransportError(error)).await;
                        break;
                    }
                };

                let call_event = match event {
                    InboundEvent::Start { call_id, stream_id, sample_rate } => {
                        if let Some(rate) = sample_rate {
                            if rate != transport.sample_rate().as_u32() {
                                tracing::warn!(
                                    announced = rate,
                                    configured = transport.sample_rate().as_u32(),
                                    "Provider announced a different sample rate"
                                );
                            }
                        }
                        state.calls.attach(&connection_id, &call_id, &stream_id);
                        CallEvent::Start { call_id, stream_id }
                    }
                    InboundEvent::Media(pcm) => CallEvent::Audio(pcm),
                    InboundEvent::Stop => CallEvent::Stop,
                };

                if events.send(call_event).await.is_err() {
                    break;
                }
            }
            result = &mut session_task => {
                finished = Some(result);
                break;
            }
        }
    }

    transport.close();
    drop(events);

    let result = match finished {
        Some(result) => result,
        None => session_task.await,
    };
    match result {
        Ok(Ok(())) => {}
        Ok(Err(AgentError::Timeout(timeout))) => {
            tracing::error!(connection_id = %connection_id, ?timeout, "Provider connection timed out");
        }
        Ok(Err(e)) => {
            tracing::error!(connection_id = %connection_id, error = %e, "Call session failed");
        }
        Err(e) => {
            tracing::error!(connection_id = %connection_id, error = %e, "Call session task aborted");
        }
    }

    writer.abort();
    state.calls.remove(&connection_id);
    metrics::record_active_calls(state.calls.count());
    tracing::info!(connection_id = %connection_id, "Telephony stream disconnected");
}

fn read_message(message: Option<Result<Message, axum::Error>>) -> Inbound {
    match message {
        None | Some(Ok(Message::Close(_))) => Inbound::Closed,
        Some(Ok(Message::Text(text))) => match decode_text(&text) {
            Ok(Some(event)) => Inbound::Event(event),
            Ok(None) => Inbound::Skip,
            Err(e) => {
                tracing::debug!(error = %e, "Discarding malformed telephony message");
                metrics::record_malformed_message();
                Inbound::Skip
            }
        },
        Some(Ok(Message::Binary(data))) => Inbound::Event(decode_binary(data)),
        Some(Ok(_)) => Inbound::Skip,
        Some(Err(e)) => Inbound::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_message() {
        assert!(matches!(read_message(None), Inbound::Closed));
        assert!(matches!(
            read_message(Some(Ok(Message::Text(r#"{"event":"stop"}"#.to_string())))),
            Inbound::Event(InboundEvent::Stop)
        ));
        assert!(matches!(
            read_message(Some(Ok(Message::Text("not json".to_string())))),
            Inbound::Skip
        ));
        assert!(matches!(
            read_message(Some(Ok(Message::Binary(vec![1, 0])))),
            Inbound::Event(InboundEvent::Media(data)) if data == vec![1, 0]
        ));
        assert!(matches!(
            read_message(Some(Ok(Message::Ping(vec![])))),
            Inbound::Skip
        ));
    }
}
