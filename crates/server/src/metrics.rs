//! Observability Metrics
//!
//! Prometheus recorder and the `/metrics` endpoint. Call sessions and the
//! language model client record through the `metrics` macros directly; this
//! module owns the exporter and the server-level series.

use std::sync::OnceLock;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;
use crate::ServerError;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics() -> Result<PrometheusHandle, ServerError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Internal(format!("Failed to install Prometheus recorder: {}", e)))?;

    register_default_metrics();
    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

fn register_default_metrics() {
    gauge!("voice_call_active_calls").set(0.0);
    counter!("voice_call_connections_total").absolute(0);
    counter!("voice_call_calls_started_total").absolute(0);
    counter!("voice_call_turns_total").absolute(0);
    counter!("voice_call_barge_ins_total").absolute(0);
    counter!("voice_call_echo_discards_total").absolute(0);
    counter!("voice_call_stale_replies_total").absolute(0);
    counter!("voice_call_malformed_messages_total").absolute(0);

    histogram!("voice_call_llm_latency_seconds").record(0.0);
    histogram!("voice_call_tts_ttfb_seconds").record(0.0);
    histogram!("voice_call_response_latency_seconds").record(0.0);
}

pub fn record_connection() {
    counter!("voice_call_connections_total").increment(1);
}

pub fn record_active_calls(count: usize) {
    gauge!("voice_call_active_calls").set(count as f64);
}

pub fn record_malformed_message() {
    counter!("voice_call_malformed_messages_total").increment(1);
}

pub fn record_rejected_connection() {
    counter!("voice_call_errors_total", "kind" => "capacity").increment(1);
}

/// Prometheus text exposition
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    record_active_calls(state.calls.count());

    match get_metrics_handle() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not enabled".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_helpers() {
        // No recorder installed; these must not panic
        record_connection();
        record_active_calls(3);
        record_malformed_message();
        record_rejected_connection();
    }
}
