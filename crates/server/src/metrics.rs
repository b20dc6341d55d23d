//! Prometheus metrics
//!
//! Call lifecycle counters are fed from the orchestrator's event monitor;
//! media connection counters are recorded when a stream closes.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use voice_dialer_agent::{CallOrchestrator, ConnectionStats};
use voice_dialer_core::CallEvent;

use crate::state::AppState;

/// Install the global Prometheus recorder
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder, metrics disabled");
            None
        }
    }
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

pub fn record_call_started() {
    metrics::counter!("dialer_calls_started_total").increment(1);
}

pub fn record_call_rejected(reason: &'static str) {
    metrics::counter!("dialer_calls_rejected_total", "reason" => reason).increment(1);
}

pub fn record_media_connection(stats: &ConnectionStats) {
    metrics::counter!("dialer_media_connections_total").increment(1);
    metrics::counter!("dialer_media_frames_total", "outcome" => "routed")
        .increment(stats.frames_routed);
    metrics::counter!("dialer_media_frames_total", "outcome" => "dropped")
        .increment(stats.frames_dropped);
    metrics::counter!("dialer_media_malformed_total").increment(stats.malformed);
}

fn record_event(event: &CallEvent) {
    metrics::counter!("dialer_call_events_total", "kind" => event.kind()).increment(1);

    match event {
        CallEvent::ScoreUpdate { score, .. } => {
            metrics::counter!("dialer_lead_scores_total", "score" => score.as_str()).increment(1);
        }
        CallEvent::Decision { decision, .. } => {
            metrics::counter!("dialer_decisions_total", "decision" => decision.as_str())
                .increment(1);
        }
        CallEvent::Ended { summary, .. } => {
            metrics::counter!("dialer_calls_ended_total", "reason" => summary.end_reason.label())
                .increment(1);
            metrics::histogram!("dialer_call_duration_seconds").record(summary.duration_secs());
        }
        _ => {}
    }
}

/// Count every session event until the orchestrator goes away
pub fn spawn_event_recorder(orchestrator: &Arc<CallOrchestrator>) -> JoinHandle<()> {
    let mut events = orchestrator.subscribe_all();
    let orchestrator: Weak<CallOrchestrator> = Arc::downgrade(orchestrator);

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    record_event(&event);
                    let Some(orchestrator) = orchestrator.upgrade() else {
                        break;
                    };
                    metrics::gauge!("dialer_active_calls").set(orchestrator.active_calls() as f64);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Metrics recorder lagged behind call events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
