//! HTTP Endpoints
//!
//! Health, readiness, metrics, the active call list and the telephony
//! WebSocket route.

use std::time::Duration;

use axum::{
    extract::{Json, State},
    http::{HeaderValue, Method, StatusCode},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::websocket::ws_handler;

const READINESS_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.settings.server.cors_origins,
        state.settings.server.cors_enabled,
    );
    let ws_path = state.settings.server.ws_path.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/calls", get(list_calls))
        .route(&ws_path, get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Configured origins only. With CORS disabled every origin is allowed.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::info!("No valid CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:3000"))
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let active = state.calls.count();
    let max = state.calls.max_calls();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "calls": {
                "active": active,
                "max": max,
            },
            "telephony": {
                "sample_rate": state.settings.telephony.sample_rate,
                "content_type": state.settings.telephony.content_type,
            }
        })),
    )
}

/// Ready when there is call capacity and the language model endpoint answers
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let mut checks = serde_json::Map::new();
    let mut ready = true;

    let has_capacity = !state.calls.is_full();
    if !has_capacity {
        ready = false;
    }
    checks.insert(
        "capacity".to_string(),
        serde_json::json!({
            "status": if has_capacity { "ok" } else { "full" },
            "active": state.calls.count(),
            "max": state.calls.max_calls(),
        }),
    );

    let llm_url = format!("{}/models", state.settings.llm.endpoint.trim_end_matches('/'));
    let llm_status = match tokio::time::timeout(READINESS_PROBE_TIMEOUT, reqwest::get(&llm_url)).await
    {
        Ok(Ok(resp)) if resp.status().is_success() => "ok",
        Ok(Ok(_)) => {
            ready = false;
            "error"
        }
        Ok(Err(_)) => {
            ready = false;
            "unreachable"
        }
        Err(_) => {
            ready = false;
            "timeout"
        }
    };
    checks.insert(
        "llm_backend".to_string(),
        serde_json::json!({
            "status": llm_status,
            "url": llm_url,
        }),
    );

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "checks": checks,
        })),
    )
}

async fn list_calls(State(state): State<AppState>) -> Json<serde_json::Value> {
    let calls = state.calls.list();
    Json(serde_json::json!({
        "count": calls.len(),
        "calls": calls,
    }))
}
