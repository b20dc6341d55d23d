//! Voice Dialer Server
//!
//! Thin HTTP and WebSocket adapter over the call orchestrator: call API,
//! provider webhooks, media stream endpoint and event push to observers.

pub mod http;
pub mod metrics;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use metrics::{init_metrics, spawn_event_recorder};
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use voice_dialer_core::Error as CoreError;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Call not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Too many active calls: {0}")]
    Capacity(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidLead(msg) => ServerError::InvalidRequest(msg),
            CoreError::CallNotFound(id) => ServerError::NotFound(id),
            CoreError::Capacity(msg) => ServerError::Capacity(msg),
            CoreError::Provider(msg) => ServerError::Provider(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Capacity(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Provider(_) => StatusCode::BAD_GATEWAY,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
