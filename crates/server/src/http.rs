//! HTTP Endpoints
//!
//! Call API, provider webhooks and operational endpoints.

use axum::{
    extract::{Form, Json, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use voice_dialer_agent::CallSnapshot;
use voice_dialer_config::constants::telephony;
use voice_dialer_core::{Error as CoreError, Lead, ProviderEvent};
use voice_dialer_transport::{CallStatusCallback, VoiceWebhook};

use crate::metrics::{metrics_handler, record_call_rejected, record_call_started};
use crate::state::AppState;
use crate::websocket;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.settings.server.cors_origins,
        state.settings.server.cors_enabled,
    );

    Router::new()
        // Call API
        .route("/api/calls", post(start_call).get(list_calls))
        .route("/api/calls/:id", get(get_call))
        // Provider webhooks
        .route(telephony::ANSWER_WEBHOOK_PATH, post(voice_webhook))
        .route(telephony::STATUS_WEBHOOK_PATH, post(status_webhook))
        // WebSocket
        .route(telephony::MEDIA_STREAM_PATH, get(websocket::media_stream))
        .route("/ws/calls/:id/events", get(websocket::call_events))
        // Health check
        .route("/health", get(health_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Configured origins, or permissive when CORS is disabled
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
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
        tracing::warn!("No valid CORS origins configured, cross-origin requests will be refused");
    }

    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Start call request
#[derive(Debug, Deserialize)]
struct StartCallRequest {
    phone: String,
    equity: f64,
    #[serde(default)]
    address: Option<String>,
}

/// Create a session and dial the lead
async fn start_call(
    State(state): State<AppState>,
    Json(request): Json<StartCallRequest>,
) -> Result<(StatusCode, Json<CallSnapshot>), ServerError> {
    let lead = Lead::new(request.phone, request.equity, request.address)?;

    match state.orchestrator.start_call(lead).await {
        Ok(session) => {
            record_call_started();
            Ok((StatusCode::CREATED, Json(session.snapshot())))
        }
        Err(e) => {
            record_call_rejected(match &e {
                CoreError::Capacity(_) => "capacity",
                CoreError::Provider(_) => "dial_failed",
                _ => "error",
            });
            Err(e.into())
        }
    }
}

/// List live calls
async fn list_calls(State(state): State<AppState>) -> Json<serde_json::Value> {
    let calls: Vec<CallSnapshot> = state
        .orchestrator
        .sessions()
        .iter()
        .map(|session| session.snapshot())
        .collect();

    Json(serde_json::json!({
        "count": calls.len(),
        "calls": calls,
    }))
}

/// Live snapshot, or the stored summary once the call has ended
async fn get_call(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if let Some(session) = state.orchestrator.session(&id) {
        if !session.is_ended() {
            return Ok(Json(serde_json::json!({
                "live": true,
                "call": session.snapshot(),
            })));
        }
    }

    let summary = state
        .orchestrator
        .find_summary(&id)
        .await?
        .ok_or(ServerError::NotFound(id))?;

    Ok(Json(serde_json::json!({
        "live": false,
        "summary": summary,
    })))
}

/// Answer webhook: the callee picked up. Returns the static answer document.
async fn voice_webhook(
    State(state): State<AppState>,
    Form(webhook): Form<VoiceWebhook>,
) -> impl IntoResponse {
    tracing::info!(call_sid = %webhook.call_sid, status = ?webhook.call_status, "Answer webhook");

    state.orchestrator.handle_provider_event(ProviderEvent::Answered {
        provider_call_id: webhook.call_sid,
    });

    (
        [(header::CONTENT_TYPE, "text/xml")],
        state.answer_twiml.to_string(),
    )
}

/// Status callback: failures and completion
async fn status_webhook(
    State(state): State<AppState>,
    Form(callback): Form<CallStatusCallback>,
) -> StatusCode {
    tracing::debug!(
        call_sid = %callback.call_sid,
        status = %callback.call_status,
        "Status callback"
    );

    if let Some(event) = callback.into_provider_event() {
        state.orchestrator.handle_provider_event(event);
    }
    StatusCode::NO_CONTENT
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "active_calls": state.orchestrator.active_calls(),
        "media_bindings": state.orchestrator.router().binding_count(),
    }))
}
