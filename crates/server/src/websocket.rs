//! WebSocket Handlers
//!
//! - `/ws/media`: provider media stream, one `MediaConnection` per socket
//! - `/ws/calls/:id/events`: JSON push of one call's events to an observer

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use voice_dialer_agent::{CallSession, MediaConnection};
use voice_dialer_core::CallEvent;

use crate::metrics::record_media_connection;
use crate::state::AppState;
use crate::ServerError;

/// Media stream upgrade
pub async fn media_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let connection = state.orchestrator.accept_media();
    ws.on_upgrade(move |socket| run_media_stream(socket, connection))
}

async fn run_media_stream(mut socket: WebSocket, mut connection: MediaConnection) {
    tracing::debug!(connection = connection.id(), "Media stream opened");

    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Text(text)) => connection.handle_text(&text).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(data)) => {
                tracing::debug!(connection = connection.id(), bytes = data.len(), "Ignoring binary frame");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(connection = connection.id(), error = %e, "Media stream error");
                break;
            }
        }
    }

    let id = connection.id();
    let call_id = connection.call_id().map(str::to_string);
    let stats = connection.close();
    record_media_connection(&stats);

    tracing::info!(
        connection = id,
        call_id = ?call_id,
        messages = stats.messages,
        frames_routed = stats.frames_routed,
        frames_dropped = stats.frames_dropped,
        malformed = stats.malformed,
        "Media stream closed"
    );
}

/// Event push upgrade for one live call
pub async fn call_events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<Response, ServerError> {
    let session = state
        .orchestrator
        .session(&call_id)
        .ok_or(ServerError::NotFound(call_id))?;
    let events = session.subscribe();

    Ok(ws.on_upgrade(move |socket| run_call_events(socket, session, events)))
}

async fn run_call_events(
    socket: WebSocket,
    session: Arc<CallSession>,
    mut events: broadcast::Receiver<CallEvent>,
) {
    let (mut sender, mut receiver) = socket.split();

    // Late observers start from the current snapshot
    let snapshot = serde_json::json!({ "type": "snapshot", "call": session.snapshot() });
    if sender.send(Message::Text(snapshot.to_string())).await.is_err() {
        return;
    }

    // Ended before the subscription saw it
    if let Some(summary) = session.summary() {
        let ended = CallEvent::Ended {
            call_id: session.call_id().to_string(),
            summary: Box::new(summary),
        };
        let _ = send_event(&mut sender, &ended).await;
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    let ended = matches!(event, CallEvent::Ended { .. });
                    if send_event(&mut sender, &event).await.is_err() || ended {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(call_id = session.call_id(), skipped, "Event observer lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = sender.send(Message::Close(None)).await;
    tracing::debug!(call_id = session.call_id(), "Event observer disconnected");
}

async fn send_event<S>(sender: &mut S, event: &CallEvent) -> Result<(), axum::Error>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(e) => {
            tracing::error!(error = %e, kind = event.kind(), "Failed to serialize call event");
            Ok(())
        }
    }
}
