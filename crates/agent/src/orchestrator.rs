//! Call orchestrator
//!
//! Front door of the engine: creates sessions, places calls, feeds provider
//! callbacks to the right session, hands media connections to the router and
//! ships terminal summaries to the sink in the background.

use crate::call_session::{CallSession, SessionContext};
use crate::qualification::QualificationPipeline;
use crate::registry::CallRegistry;
use crate::router::{MediaConnection, MediaStreamRouter};
use crate::supervisor::{spawn_supervisor, SessionTimeouts};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use voice_dialer_config::{ScriptConfig, Settings};
use voice_dialer_core::{
    CallEvent, CallSummary, CallSummarySink, EndReason, Lead, ProviderEvent, RecognizerFactory,
    Result, SignalingProvider,
};

const MONITOR_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct OrchestratorOptions {
    pub qualification: Arc<QualificationPipeline>,
    pub scripts: ScriptConfig,
    pub answer_url: String,
    pub status_callback_url: Option<String>,
    pub timeouts: SessionTimeouts,
    pub event_capacity: usize,
    pub max_concurrent_calls: usize,
}

impl OrchestratorOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            qualification: Arc::new(QualificationPipeline::from_config(&settings.qualification)),
            scripts: settings.scripts.clone(),
            answer_url: settings.server.answer_webhook_url(),
            status_callback_url: Some(settings.server.status_webhook_url()),
            timeouts: SessionTimeouts::from_config(&settings.session),
            event_capacity: settings.session.event_capacity,
            max_concurrent_calls: settings.session.max_concurrent_calls,
        }
    }
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

pub struct CallOrchestrator {
    registry: Arc<CallRegistry>,
    router: Arc<MediaStreamRouter>,
    context: SessionContext,
    timeouts: SessionTimeouts,
    monitor: broadcast::Sender<CallEvent>,
    sink: Arc<dyn CallSummarySink>,
}

impl CallOrchestrator {
    /// Build the orchestrator and start its summary writer.
    /// Must be called inside a Tokio runtime.
    pub fn new(
        provider: Arc<dyn SignalingProvider>,
        recognizers: Arc<dyn RecognizerFactory>,
        sink: Arc<dyn CallSummarySink>,
        options: OrchestratorOptions,
    ) -> Arc<Self> {
        let registry = Arc::new(CallRegistry::new(options.max_concurrent_calls));
        let router = Arc::new(MediaStreamRouter::new(registry.clone(), recognizers));
        let (monitor, _) = broadcast::channel(MONITOR_CAPACITY);
        let (summary_tx, summary_rx) = mpsc::unbounded_channel();

        let mut context = SessionContext::new(
            provider,
            options.qualification,
            Arc::new(options.scripts),
            options.answer_url,
        )
        .with_event_capacity(options.event_capacity)
        .with_monitor(monitor.clone())
        .with_summaries(summary_tx);
        context.status_callback_url = options.status_callback_url;

        spawn_summary_writer(registry.clone(), sink.clone(), summary_rx);

        tracing::info!(
            provider = context.provider.name(),
            recognizer = router.recognizer_name(),
            sink = sink.name(),
            max_calls = options.max_concurrent_calls,
            "Call orchestrator ready"
        );

        Arc::new(Self {
            registry,
            router,
            context,
            timeouts: options.timeouts,
            monitor,
            sink,
        })
    }

    /// Register a session in `INIT` and start its supervisor
    pub fn create_session(&self, lead: Lead) -> Result<Arc<CallSession>> {
        let session = Arc::new(CallSession::new(lead, self.context.clone())?);
        self.registry.insert(session.clone())?;
        spawn_supervisor(session.clone(), session.subscribe(), self.timeouts);

        tracing::info!(
            call_id = session.call_id(),
            active_calls = self.registry.len(),
            "Call session created"
        );
        Ok(session)
    }

    /// Create a session and dial the lead.
    ///
    /// A dial failure is returned to the caller; the session has already
    /// ended and its summary is on its way to the sink.
    pub async fn start_call(&self, lead: Lead) -> Result<Arc<CallSession>> {
        let session = self.create_session(lead)?;
        let provider_call_id = session.start_outbound_call().await?;
        self.registry
            .bind_correlation(provider_call_id, session.call_id());
        Ok(session)
    }

    /// Apply an answer, failure or completion reported by the provider
    pub fn handle_provider_event(&self, event: ProviderEvent) {
        let Some(session) = self.registry.resolve(event.provider_call_id()) else {
            tracing::debug!(
                provider_call_id = event.provider_call_id(),
                "Provider event for unknown or finished call"
            );
            return;
        };

        match event {
            ProviderEvent::Answered { .. } => {
                // Twilio reports the answer twice (webhook and status callback)
                if let Err(e) = session.on_call_answered() {
                    tracing::debug!(call_id = session.call_id(), error = %e, "Answer ignored");
                }
            }
            ProviderEvent::Failed { status, .. } => {
                if session.abort(EndReason::ProviderFailure(status)).is_some() {
                    tracing::info!(call_id = session.call_id(), "Call failed at provider");
                }
            }
            ProviderEvent::Completed { .. } => {
                session.end_call();
            }
        }
    }

    /// Drain provider events until every sender is gone
    pub fn spawn_provider_listener(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<ProviderEvent>,
    ) -> JoinHandle<()> {
        let orchestrator: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(orchestrator) = orchestrator.upgrade() else {
                    break;
                };
                orchestrator.handle_provider_event(event);
            }
            tracing::debug!("Provider event listener stopped");
        })
    }

    /// Hand a new media transport connection to the router
    pub fn accept_media(&self) -> MediaConnection {
        self.router.accept()
    }

    pub fn session(&self, call_id: &str) -> Option<Arc<CallSession>> {
        self.registry.get(call_id)
    }

    pub fn sessions(&self) -> Vec<Arc<CallSession>> {
        self.registry.list()
    }

    pub fn active_calls(&self) -> usize {
        self.registry.len()
    }

    /// Summary of an ended call, live or already handed to the sink
    pub async fn find_summary(&self, call_id: &str) -> Result<Option<CallSummary>> {
        if let Some(summary) = self.registry.get(call_id).and_then(|s| s.summary()) {
            return Ok(Some(summary));
        }
        self.sink.fetch(call_id).await
    }

    /// Events from every session
    pub fn subscribe_all(&self) -> broadcast::Receiver<CallEvent> {
        self.monitor.subscribe()
    }

    pub fn registry(&self) -> &Arc<CallRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<MediaStreamRouter> {
        &self.router
    }

    /// End every live call, e.g. on shutdown. Returns how many were ended.
    pub fn end_all(&self) -> usize {
        let ended = self
            .registry
            .list()
            .into_iter()
            .filter_map(|session| session.end_call())
            .count();
        if ended > 0 {
            tracing::info!(ended, "Ended live calls");
        }
        ended
    }
}

fn spawn_summary_writer(
    registry: Arc<CallRegistry>,
    sink: Arc<dyn CallSummarySink>,
    mut summaries: mpsc::UnboundedReceiver<CallSummary>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(summary) = summaries.recv().await {
            // The live session answers `find_summary` until the sink has it
            match sink.store(&summary).await {
                Ok(()) => tracing::debug!(call_id = %summary.call_id, sink = sink.name(), "Summary stored"),
                Err(e) => {
                    tracing::error!(call_id = %summary.call_id, error = %e, "Failed to store call summary")
                }
            }
            registry.remove(&summary.call_id);
        }
    })
}
