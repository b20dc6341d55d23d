//! Integration tests for media stream routing
//!
//! Streams are fed Twilio-style JSON text frames carrying μ-law silence; the
//! recognizers decide what was "said".

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

use voice_dialer_agent::{CallOrchestrator, CallSession, OrchestratorOptions};
use voice_dialer_config::ScriptedRecognizerConfig;
use voice_dialer_core::{
    AudioFrame, CallState, CallSummary, CallSummarySink, Decision, Lead, ProviderEvent,
    RecognizerContext, RecognizerFactory, Result, SpeechEvent, SpeechRecognizer,
};
use voice_dialer_pipeline::stt::ScriptedRecognizerFactory;
use voice_dialer_transport::SimulatedSignaling;

struct NullSink;

#[async_trait]
impl CallSummarySink for NullSink {
    async fn store(&self, _summary: &CallSummary) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Says "I'm interested, this is <call id>" after two frames
struct EchoRecognizer {
    call_id: String,
    frames: u32,
}

#[async_trait]
impl SpeechRecognizer for EchoRecognizer {
    async fn accept_frame(&mut self, _frame: &AudioFrame) -> Result<Vec<SpeechEvent>> {
        self.frames += 1;
        Ok(match self.frames {
            1 => vec![SpeechEvent::Partial(self.call_id.clone())],
            2 => vec![SpeechEvent::Final(format!(
                "I'm interested, this is {}",
                self.call_id
            ))],
            _ => Vec::new(),
        })
    }

    async fn finish(&mut self) -> Result<Vec<SpeechEvent>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "echo"
    }
}

struct EchoFactory;

impl RecognizerFactory for EchoFactory {
    fn create(&self, context: &RecognizerContext) -> Result<Box<dyn SpeechRecognizer>> {
        Ok(Box::new(EchoRecognizer {
            call_id: context.call_id.clone(),
            frames: 0,
        }))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

fn scripted(partial_after: u64, final_after: u64) -> Arc<dyn RecognizerFactory> {
    Arc::new(ScriptedRecognizerFactory::new(ScriptedRecognizerConfig {
        partial_after_frames: partial_after,
        final_after_frames: final_after,
        ..Default::default()
    }))
}

fn orchestrator(recognizers: Arc<dyn RecognizerFactory>) -> Arc<CallOrchestrator> {
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    CallOrchestrator::new(
        Arc::new(SimulatedSignaling::new(None, events_tx)),
        recognizers,
        Arc::new(NullSink),
        OrchestratorOptions::default(),
    )
}

/// Place a call and answer it, leaving the session in ANALYZING
async fn live_call(orchestrator: &CallOrchestrator, equity: f64) -> (Arc<CallSession>, String) {
    let lead = Lead::new("+15551234567", equity, None).unwrap();
    let session = orchestrator.start_call(lead).await.unwrap();
    let provider_call_id = session.provider_call_id().unwrap();
    orchestrator.handle_provider_event(ProviderEvent::Answered {
        provider_call_id: provider_call_id.clone(),
    });
    assert_eq!(session.state(), CallState::Analyzing);
    (session, provider_call_id)
}

fn start_message(call_sid: &str) -> String {
    json!({
        "event": "start",
        "sequenceNumber": "1",
        "streamSid": "MZ1",
        "start": {
            "streamSid": "MZ1",
            "callSid": call_sid,
            "tracks": ["inbound"],
            "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1},
            "customParameters": {}
        }
    })
    .to_string()
}

fn media_message(chunk: u64) -> String {
    json!({
        "event": "media",
        "streamSid": "MZ1",
        "media": {
            "track": "inbound",
            "chunk": chunk.to_string(),
            "timestamp": (chunk * 20).to_string(),
            "payload": STANDARD.encode([0xFFu8; 160])
        }
    })
    .to_string()
}

fn stop_message() -> String {
    json!({"event": "stop", "streamSid": "MZ1", "stop": {}}).to_string()
}

#[tokio::test]
async fn test_stream_drives_session_to_decision() {
    let orchestrator = orchestrator(scripted(2, 4));
    let (session, provider_call_id) = live_call(&orchestrator, 55.0).await;

    let mut connection = orchestrator.accept_media();
    connection
        .handle_text(r#"{"event":"connected","protocol":"Call","version":"1.0.0"}"#)
        .await;
    connection.handle_text(&start_message(&provider_call_id)).await;
    assert!(connection.is_bound());
    assert_eq!(
        orchestrator.router().bound_connection(session.call_id()),
        Some(connection.id())
    );

    for chunk in 1..=4 {
        connection.handle_text(&media_message(chunk)).await;
    }

    // "Yes, I am interested and my timeline is now." with 55% equity
    assert_eq!(session.decision(), Some(Decision::Continue));
    assert_eq!(session.state(), CallState::FollowUp);
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert!(!transcript[0].is_final());
    assert!(transcript[1].is_final());

    connection.handle_text(&stop_message()).await;
    assert!(!connection.is_bound());
    assert_eq!(orchestrator.router().binding_count(), 0);

    // Stream teardown leaves the session alone
    assert_eq!(session.state(), CallState::FollowUp);
    assert_eq!(connection.stats().frames_routed, 4);
}

#[tokio::test]
async fn test_correlation_parameter_binds_by_call_id() {
    let orchestrator = orchestrator(scripted(1, 2));
    let (session, _) = live_call(&orchestrator, 55.0).await;

    let start = start_message("CA-unrelated").replace(
        r#""customParameters":{}"#,
        &format!(r#""customParameters":{{"correlationToken":"{}"}}"#, session.call_id()),
    );
    let mut connection = orchestrator.accept_media();
    connection.handle_text(&start).await;

    assert_eq!(connection.call_id(), Some(session.call_id()));
}

#[tokio::test]
async fn test_unknown_token_drops_frames() {
    let orchestrator = orchestrator(scripted(1, 2));
    let (session, _) = live_call(&orchestrator, 55.0).await;

    let mut connection = orchestrator.accept_media();
    connection.handle_text(&start_message("CA-unknown")).await;
    assert!(!connection.is_bound());

    for chunk in 1..=3 {
        connection.handle_text(&media_message(chunk)).await;
    }
    assert_eq!(connection.stats().frames_dropped, 3);
    assert!(session.transcript().is_empty());
    assert_eq!(session.state(), CallState::Analyzing);
}

#[tokio::test]
async fn test_media_before_start_is_dropped() {
    let orchestrator = orchestrator(scripted(1, 1));
    let (session, provider_call_id) = live_call(&orchestrator, 55.0).await;

    let mut connection = orchestrator.accept_media();
    connection.handle_text(&media_message(1)).await;
    assert!(session.transcript().is_empty());

    connection.handle_text(&start_message(&provider_call_id)).await;
    connection.handle_text(&media_message(2)).await;
    assert_eq!(session.transcript().len(), 2);
}

#[tokio::test]
async fn test_malformed_frames_are_skipped() {
    let orchestrator = orchestrator(scripted(1, 3));
    let (session, provider_call_id) = live_call(&orchestrator, 55.0).await;

    let mut connection = orchestrator.accept_media();
    connection.handle_text(&start_message(&provider_call_id)).await;

    connection.handle_text("{not json").await;
    connection.handle_text(&media_message(1)).await;
    connection
        .handle_text(r#"{"event":"media","streamSid":"MZ1","media":{"payload":"%%%"}}"#)
        .await;
    connection.handle_text(r#"{"event":"mark","streamSid":"MZ1","mark":{"name":"x"}}"#).await;
    connection.handle_text(&media_message(2)).await;
    connection.handle_text(&media_message(3)).await;

    assert_eq!(connection.stats().malformed, 2);
    assert!(connection.is_bound() || session.is_ended());
    assert!(session.decision().is_some());
}

#[tokio::test]
async fn test_second_stream_for_same_call_is_rejected() {
    let orchestrator = orchestrator(scripted(1, 10));
    let (session, provider_call_id) = live_call(&orchestrator, 55.0).await;

    let mut first = orchestrator.accept_media();
    first.handle_text(&start_message(&provider_call_id)).await;
    let mut second = orchestrator.accept_media();
    second.handle_text(&start_message(&provider_call_id)).await;

    assert!(first.is_bound());
    assert!(!second.is_bound());
    assert_eq!(
        orchestrator.router().bound_connection(session.call_id()),
        Some(first.id())
    );

    second.handle_text(&media_message(1)).await;
    assert_eq!(second.stats().frames_dropped, 1);
    assert!(session.transcript().is_empty());

    // Once the first stream goes away the call can be streamed again
    first.close();
    let mut third = orchestrator.accept_media();
    third.handle_text(&start_message(&provider_call_id)).await;
    assert!(third.is_bound());
}

#[tokio::test]
async fn test_overlapping_streams_stay_isolated() {
    let orchestrator = orchestrator(Arc::new(EchoFactory));
    let (a, a_sid) = live_call(&orchestrator, 55.0).await;
    let (b, b_sid) = live_call(&orchestrator, 20.0).await;

    let mut conn_a = orchestrator.accept_media();
    let mut conn_b = orchestrator.accept_media();
    conn_b.handle_text(&start_message(&b_sid)).await;
    conn_a.handle_text(&start_message(&a_sid)).await;

    for chunk in 1..=2 {
        conn_a.handle_text(&media_message(chunk)).await;
        conn_b.handle_text(&media_message(chunk)).await;
    }

    for (session, other) in [(&a, &b), (&b, &a)] {
        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert!(transcript.iter().all(|e| e.text.contains(session.call_id())));
        assert!(transcript.iter().all(|e| !e.text.contains(other.call_id())));
    }

    // Same words, different equity
    assert_eq!(a.decision(), Some(Decision::Continue));
    assert_eq!(b.decision(), Some(Decision::FollowUp));
}

#[tokio::test]
async fn test_stop_flushes_pending_utterance() {
    let orchestrator = orchestrator(scripted(1, 100));
    let (session, provider_call_id) = live_call(&orchestrator, 55.0).await;

    let mut connection = orchestrator.accept_media();
    connection.handle_text(&start_message(&provider_call_id)).await;
    connection.handle_text(&media_message(1)).await;
    connection.handle_text(&media_message(2)).await;
    assert!(session.decision().is_none());

    connection.handle_text(&stop_message()).await;
    assert_eq!(session.decision(), Some(Decision::Continue));
}

#[tokio::test]
async fn test_close_leaves_session_untouched() {
    let orchestrator = orchestrator(scripted(1, 100));
    let (session, provider_call_id) = live_call(&orchestrator, 55.0).await;

    let mut connection = orchestrator.accept_media();
    connection.handle_text(&start_message(&provider_call_id)).await;
    connection.handle_text(&media_message(1)).await;

    let stats = connection.close();
    assert_eq!(stats.frames_routed, 1);
    assert_eq!(orchestrator.router().binding_count(), 0);
    assert_eq!(session.state(), CallState::Analyzing);
    assert_eq!(session.transcript().len(), 1);
}

#[tokio::test]
async fn test_ended_call_releases_binding() {
    let orchestrator = orchestrator(Arc::new(EchoFactory));
    let (session, provider_call_id) = live_call(&orchestrator, 10.0).await;

    let mut connection = orchestrator.accept_media();
    connection.handle_text(&start_message(&provider_call_id)).await;
    connection.handle_text(&media_message(1)).await;

    // Callee hangs up mid-utterance; later audio goes nowhere
    session.end_call();
    connection.handle_text(&media_message(2)).await;
    assert!(!connection.is_bound());

    connection.handle_text(&media_message(3)).await;
    assert_eq!(connection.stats().frames_dropped, 2);
    assert_eq!(connection.stats().frames_routed, 1);
    assert_eq!(session.transcript().len(), 1);
    assert!(session.decision().is_none());
}

#[tokio::test]
async fn test_binding_released_when_call_ends_without_frames() {
    let orchestrator = orchestrator(Arc::new(EchoFactory));
    let (session, provider_call_id) = live_call(&orchestrator, 10.0).await;

    let mut connection = orchestrator.accept_media();
    connection.handle_text(&start_message(&provider_call_id)).await;
    assert_eq!(
        orchestrator.router().bound_connection(session.call_id()),
        Some(connection.id())
    );

    // The stream goes quiet and the call ends elsewhere
    session.end_call();
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while orchestrator.router().bound_connection(session.call_id()).is_some() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("binding released after the call ended");
    assert_eq!(orchestrator.router().binding_count(), 0);

    // The idle connection notices on its next frame
    connection.handle_text(&media_message(1)).await;
    assert!(!connection.is_bound());
    assert_eq!(connection.stats().frames_dropped, 1);
    assert_eq!(connection.close().frames_routed, 0);
}

#[tokio::test]
async fn test_dropped_connection_unbinds() {
    let orchestrator = orchestrator(scripted(1, 100));
    let (_session, provider_call_id) = live_call(&orchestrator, 55.0).await;

    {
        let mut connection = orchestrator.accept_media();
        connection.handle_text(&start_message(&provider_call_id)).await;
        assert_eq!(orchestrator.router().binding_count(), 1);
    }
    assert_eq!(orchestrator.router().binding_count(), 0);
}
