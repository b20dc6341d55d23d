//! Application State
//!
//! Shared state across all handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use voice_dialer_agent::CallOrchestrator;
use voice_dialer_config::{SessionConfig, Settings};
use voice_dialer_transport::answer_document;

/// Seconds the answer document keeps the line open after the greeting
const HOLD_MARGIN_SECS: u64 = 10;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub orchestrator: Arc<CallOrchestrator>,
    /// Answer document served to every answered call
    pub answer_twiml: Arc<str>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(settings: Settings, orchestrator: Arc<CallOrchestrator>) -> Self {
        let answer_twiml = answer_document(
            &settings.server.media_stream_url(),
            &settings.telephony.greeting,
            hold_secs(&settings.session),
        );

        Self {
            settings: Arc::new(settings),
            orchestrator,
            answer_twiml: answer_twiml.into(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}

/// Long enough for the analysis window and the follow-up hold
fn hold_secs(session: &SessionConfig) -> u64 {
    session.analysis_timeout_secs + session.follow_up_hold_ms.div_ceil(1000) + HOLD_MARGIN_SECS
}
