//! Integration tests for the call lifecycle through the orchestrator
//!
//! Provider answers are driven by hand through `handle_provider_event`, and
//! timers run on paused Tokio time where a test depends on them.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

use voice_dialer_agent::{CallOrchestrator, OrchestratorOptions};
use voice_dialer_config::ScriptedRecognizerConfig;
use voice_dialer_core::{
    CallEvent, CallState, CallSummary, CallSummarySink, Decision, EndReason, Error, Lead,
    ProviderEvent, QualificationScore, Result,
};
use voice_dialer_pipeline::stt::ScriptedRecognizerFactory;
use voice_dialer_transport::SimulatedSignaling;

struct RecordingSink {
    stored: Mutex<Vec<CallSummary>>,
    notify: mpsc::UnboundedSender<CallSummary>,
}

#[async_trait]
impl CallSummarySink for RecordingSink {
    async fn store(&self, summary: &CallSummary) -> Result<()> {
        self.stored.lock().push(summary.clone());
        let _ = self.notify.send(summary.clone());
        Ok(())
    }

    async fn fetch(&self, call_id: &str) -> Result<Option<CallSummary>> {
        Ok(self
            .stored
            .lock()
            .iter()
            .find(|s| s.call_id == call_id)
            .cloned())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct Harness {
    orchestrator: Arc<CallOrchestrator>,
    stored: mpsc::UnboundedReceiver<CallSummary>,
}

impl Harness {
    fn new(options: OrchestratorOptions, failing: bool) -> Self {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let mut provider = SimulatedSignaling::new(None, events_tx);
        if failing {
            provider = provider.failing();
        }

        let (notify, stored) = mpsc::unbounded_channel();
        let sink = Arc::new(RecordingSink {
            stored: Mutex::new(Vec::new()),
            notify,
        });

        let orchestrator = CallOrchestrator::new(
            Arc::new(provider),
            Arc::new(ScriptedRecognizerFactory::new(ScriptedRecognizerConfig::default())),
            sink,
            options,
        );

        Self {
            orchestrator,
            stored,
        }
    }

    fn standard() -> Self {
        Self::new(OrchestratorOptions::default(), false)
    }

    async fn next_summary(&mut self) -> CallSummary {
        timeout(Duration::from_secs(120), self.stored.recv())
            .await
            .expect("summary in time")
            .expect("sink channel open")
    }

    async fn wait_until_idle(&self) {
        timeout(Duration::from_secs(5), async {
            while self.orchestrator.active_calls() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("registry drained in time")
    }

    fn answer(&self, provider_call_id: &str) {
        self.orchestrator
            .handle_provider_event(ProviderEvent::Answered {
                provider_call_id: provider_call_id.to_string(),
            });
    }
}

fn lead(equity: f64) -> Lead {
    Lead::new("+15551234567", equity, Some("12 Main St".to_string())).unwrap()
}

/// Scenario A: motivated seller with equity goes CONTINUE, then wraps up
#[tokio::test(start_paused = true)]
async fn test_high_lead_continues_then_wraps_up() {
    let mut harness = Harness::standard();
    let session = harness.orchestrator.start_call(lead(50.0)).await.unwrap();
    assert_eq!(session.state(), CallState::Connecting);

    harness.answer(&session.provider_call_id().unwrap());
    assert_eq!(session.state(), CallState::Analyzing);

    let qualification = session
        .on_speech_final("I'm interested and want to sell now")
        .unwrap()
        .unwrap();
    assert_eq!(qualification.breakdown.total(), 8);
    assert_eq!(session.score(), Some(QualificationScore::High));
    assert_eq!(session.decision(), Some(Decision::Continue));
    assert_eq!(session.state(), CallState::FollowUp);

    // The follow-up hold wraps the call up
    let summary = harness.next_summary().await;
    assert_eq!(summary.call_id, session.call_id());
    assert_eq!(summary.end_reason, EndReason::Completed);
    assert_eq!(summary.decision, Some(Decision::Continue));
    assert!(summary.failure_reason.is_none());
    assert_eq!(session.state(), CallState::End);
}

/// Scenario B: hedging lead with low equity ends straight from DECISION
#[tokio::test]
async fn test_low_lead_ends_immediately() {
    let mut harness = Harness::standard();
    let session = harness.orchestrator.start_call(lead(30.0)).await.unwrap();
    harness.answer(&session.provider_call_id().unwrap());

    let mut events = session.subscribe();
    session.on_speech_final("maybe next month").unwrap();
    assert_eq!(session.state(), CallState::End);

    let mut transitions = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CallEvent::StateChange { from, to, .. } = event {
            transitions.push((from, to));
        }
    }
    assert_eq!(
        transitions,
        vec![
            (CallState::Analyzing, CallState::Decision),
            (CallState::Decision, CallState::End)
        ]
    );

    let summary = harness.next_summary().await;
    assert_eq!(summary.score, Some(QualificationScore::Low));
    assert_eq!(summary.decision, Some(Decision::End));
    assert_eq!(summary.end_reason, EndReason::Completed);
}

/// Scenario C: refusal with equity scores MEDIUM and gets a follow-up
#[tokio::test]
async fn test_objection_with_equity_gets_follow_up() {
    let harness = Harness::standard();
    let session = harness.orchestrator.start_call(lead(45.0)).await.unwrap();
    harness.answer(&session.provider_call_id().unwrap());

    let qualification = session
        .on_speech_final("no, not interested, I'm busy")
        .unwrap()
        .unwrap();
    assert!(qualification.signals.objection);
    assert_eq!(qualification.breakdown.total(), 3);
    assert_eq!(session.decision(), Some(Decision::FollowUp));
    assert_eq!(session.state(), CallState::FollowUp);
}

/// Scenario D: the intro cannot run before the call is placed
#[tokio::test]
async fn test_answer_before_dial_is_rejected() {
    let harness = Harness::standard();
    let session = harness.orchestrator.create_session(lead(50.0)).unwrap();

    assert_eq!(
        session.on_call_answered(),
        Err(Error::InvalidTransition {
            from: CallState::Init,
            to: CallState::Established
        })
    );
    assert_eq!(session.state(), CallState::Init);
}

/// Scenario E: a dial failure produces a terminal summary at once
#[tokio::test]
async fn test_dial_failure_summary() {
    let mut harness = Harness::new(OrchestratorOptions::default(), true);
    let result = harness.orchestrator.start_call(lead(50.0)).await;
    assert!(matches!(result, Err(Error::Provider(_))));

    let summary = harness.next_summary().await;
    assert!(matches!(summary.end_reason, EndReason::DialFailed(_)));
    assert!(summary.failure_reason.is_some());
    assert!(summary.transcript.is_empty());
    assert!(summary.score.is_none());

    // The writer drops the session once the summary is stored
    harness.wait_until_idle().await;
    let found = harness
        .orchestrator
        .find_summary(&summary.call_id)
        .await
        .unwrap();
    assert_eq!(found, Some(summary));
}

#[tokio::test]
async fn test_invalid_lead_rejected() {
    let harness = Harness::standard();
    let bad = Lead {
        phone: "555-1234".to_string(),
        equity: 10.0,
        address: None,
    };
    assert!(matches!(
        harness.orchestrator.start_call(bad).await,
        Err(Error::InvalidLead(_))
    ));
    assert_eq!(harness.orchestrator.active_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_answer_timeout() {
    let mut harness = Harness::standard();
    let session = harness.orchestrator.start_call(lead(50.0)).await.unwrap();

    let summary = harness.next_summary().await;
    assert_eq!(summary.end_reason, EndReason::AnswerTimeout);
    assert_eq!(session.state(), CallState::End);

    // A late answer is a contract violation, not a resurrection
    assert!(session.on_call_answered().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_analysis_timeout_scores_low() {
    let mut harness = Harness::standard();
    let session = harness.orchestrator.start_call(lead(90.0)).await.unwrap();
    harness.answer(&session.provider_call_id().unwrap());

    let summary = harness.next_summary().await;
    assert_eq!(summary.end_reason, EndReason::AnalysisTimeout);
    assert_eq!(summary.score, Some(QualificationScore::Low));
    assert_eq!(summary.decision, Some(Decision::End));
    assert!(summary.transcript.is_empty());

    // Speech after the window closed is dropped
    assert_eq!(session.on_speech_final("I'm interested").unwrap(), None);
    assert!(session.transcript().is_empty());
}

#[tokio::test]
async fn test_provider_failure_status() {
    let mut harness = Harness::standard();
    let session = harness.orchestrator.start_call(lead(50.0)).await.unwrap();

    harness
        .orchestrator
        .handle_provider_event(ProviderEvent::Failed {
            provider_call_id: session.provider_call_id().unwrap(),
            status: "busy".to_string(),
        });

    let summary = harness.next_summary().await;
    assert_eq!(summary.end_reason, EndReason::ProviderFailure("busy".to_string()));
    assert!(summary.failure_reason.unwrap().contains("busy"));
}

#[tokio::test]
async fn test_hangup_during_analysis() {
    let mut harness = Harness::standard();
    let session = harness.orchestrator.start_call(lead(50.0)).await.unwrap();
    let provider_call_id = session.provider_call_id().unwrap();
    harness.answer(&provider_call_id);
    session.on_speech_partial("Yes");

    harness
        .orchestrator
        .handle_provider_event(ProviderEvent::Completed { provider_call_id });

    let summary = harness.next_summary().await;
    assert_eq!(summary.end_reason, EndReason::Hangup);
    assert_eq!(summary.transcript.len(), 1);
    assert!(summary.decision.is_none());
}

#[tokio::test]
async fn test_duplicate_answer_is_ignored() {
    let harness = Harness::standard();
    let session = harness.orchestrator.start_call(lead(50.0)).await.unwrap();
    let provider_call_id = session.provider_call_id().unwrap();

    harness.answer(&provider_call_id);
    harness.answer(&provider_call_id);
    assert_eq!(session.state(), CallState::Analyzing);

    // Events for calls nobody knows about are dropped quietly
    harness.answer("CA-nobody");
}

#[tokio::test]
async fn test_end_call_is_idempotent() {
    let mut harness = Harness::standard();
    let session = harness.orchestrator.start_call(lead(45.0)).await.unwrap();
    harness.answer(&session.provider_call_id().unwrap());
    session.on_speech_final("no, not interested, I'm busy").unwrap();

    assert!(session.end_call().is_some());
    assert!(session.end_call().is_none());
    assert!(session.end_call().is_none());

    let summary = harness.next_summary().await;
    assert_eq!(summary.end_reason, EndReason::Completed);
    assert!(timeout(Duration::from_millis(100), harness.stored.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn test_concurrent_sessions_are_isolated() {
    let harness = Harness::standard();
    let a = harness.orchestrator.start_call(lead(50.0)).await.unwrap();
    let b = harness.orchestrator.start_call(lead(30.0)).await.unwrap();
    assert_ne!(a.call_id(), b.call_id());

    harness.answer(&b.provider_call_id().unwrap());
    harness.answer(&a.provider_call_id().unwrap());

    a.on_speech_partial("I'm");
    b.on_speech_partial("maybe");
    a.on_speech_final("I'm interested and want to sell now").unwrap();
    b.on_speech_final("maybe next month").unwrap();

    let texts = |s: &voice_dialer_agent::CallSession| {
        s.transcript().into_iter().map(|e| e.text).collect::<Vec<_>>()
    };
    assert_eq!(texts(&*a), vec!["I'm", "I'm interested and want to sell now"]);
    assert_eq!(texts(&*b), vec!["maybe", "maybe next month"]);
    assert_eq!(a.decision(), Some(Decision::Continue));
    assert_eq!(b.decision(), Some(Decision::End));
}

#[tokio::test]
async fn test_monitor_sees_every_session() {
    let harness = Harness::standard();
    let mut monitor = harness.orchestrator.subscribe_all();

    let a = harness.orchestrator.start_call(lead(50.0)).await.unwrap();
    let b = harness.orchestrator.start_call(lead(50.0)).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = monitor.try_recv() {
        seen.push(event.call_id().to_string());
    }
    assert!(seen.contains(&a.call_id().to_string()));
    assert!(seen.contains(&b.call_id().to_string()));
}

#[tokio::test]
async fn test_capacity_limit() {
    let options = OrchestratorOptions {
        max_concurrent_calls: 1,
        ..Default::default()
    };
    let harness = Harness::new(options, false);
    harness.orchestrator.create_session(lead(50.0)).unwrap();

    assert!(matches!(
        harness.orchestrator.create_session(lead(50.0)),
        Err(Error::Capacity(_))
    ));
}

#[tokio::test]
async fn test_end_all_on_shutdown() {
    let mut harness = Harness::standard();
    let session = harness.orchestrator.start_call(lead(50.0)).await.unwrap();
    harness.answer(&session.provider_call_id().unwrap());

    assert_eq!(harness.orchestrator.end_all(), 1);
    assert_eq!(harness.next_summary().await.end_reason, EndReason::Hangup);
}

/// Sink whose `store` parks until the test releases it
struct GatedSink {
    entered: mpsc::UnboundedSender<String>,
    release: tokio::sync::Notify,
    stored: Mutex<Vec<CallSummary>>,
}

#[async_trait]
impl CallSummarySink for GatedSink {
    async fn store(&self, summary: &CallSummary) -> Result<()> {
        let _ = self.entered.send(summary.call_id.clone());
        self.release.notified().await;
        self.stored.lock().push(summary.clone());
        Ok(())
    }

    async fn fetch(&self, call_id: &str) -> Result<Option<CallSummary>> {
        Ok(self
            .stored
            .lock()
            .iter()
            .find(|s| s.call_id == call_id)
            .cloned())
    }

    fn name(&self) -> &str {
        "gated"
    }
}

#[tokio::test]
async fn test_summary_visible_while_store_is_pending() {
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let (entered_tx, mut entered) = mpsc::unbounded_channel();
    let sink = Arc::new(GatedSink {
        entered: entered_tx,
        release: tokio::sync::Notify::new(),
        stored: Mutex::new(Vec::new()),
    });
    let orchestrator = CallOrchestrator::new(
        Arc::new(SimulatedSignaling::new(None, events_tx)),
        Arc::new(ScriptedRecognizerFactory::new(ScriptedRecognizerConfig::default())),
        sink.clone(),
        OrchestratorOptions::default(),
    );

    let session = orchestrator.start_call(lead(50.0)).await.unwrap();
    let call_id = session.call_id().to_string();
    orchestrator.handle_provider_event(ProviderEvent::Answered {
        provider_call_id: session.provider_call_id().unwrap(),
    });
    session.end_call().unwrap();
    drop(session);

    let storing = timeout(Duration::from_secs(5), entered.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(storing, call_id);

    // Store has not finished: the registry still serves the summary
    let summary = orchestrator.find_summary(&call_id).await.unwrap().unwrap();
    assert_eq!(summary.end_reason, EndReason::Hangup);
    assert!(orchestrator.registry().get(&call_id).is_some());

    sink.release.notify_one();
    timeout(Duration::from_secs(5), async {
        while orchestrator.registry().get(&call_id).is_some() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let summary = orchestrator.find_summary(&call_id).await.unwrap().unwrap();
    assert_eq!(summary.call_id, call_id);
}
