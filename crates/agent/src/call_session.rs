//! Call session state machine
//!
//! A `CallSession` owns one outbound call from dial to disposition:
//!
//! ```text
//! INIT -> CONNECTING -> ESTABLISHED -> INTRO -> ANALYZING -> DECISION -> FOLLOW_UP -> END
//!                                                               \______________________/
//! ```
//!
//! Every operation takes the per-session lock for its whole duration, so
//! transitions, transcript appends and the events they publish are strictly
//! ordered. The lock is never held across an await.

use crate::qualification::QualificationPipeline;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use voice_dialer_config::ScriptConfig;
use voice_dialer_core::{
    CallEvent, CallState, CallSummary, Decision, EndReason, Error, Lead, PlaceCallRequest,
    Qualification, QualificationScore, Result, ScoreBreakdown, SignalingProvider, Signals,
    TranscriptEntry,
};

/// Collaborators and settings shared by every session an orchestrator creates
#[derive(Clone)]
pub struct SessionContext {
    pub provider: Arc<dyn SignalingProvider>,
    pub qualification: Arc<QualificationPipeline>,
    pub scripts: Arc<ScriptConfig>,
    pub answer_url: String,
    pub status_callback_url: Option<String>,
    pub event_capacity: usize,
    /// Receives a copy of every event from every session
    pub monitor: Option<broadcast::Sender<CallEvent>>,
    /// Receives each terminal summary exactly once
    pub summaries: Option<mpsc::UnboundedSender<CallSummary>>,
}

impl SessionContext {
    pub fn new(
        provider: Arc<dyn SignalingProvider>,
        qualification: Arc<QualificationPipeline>,
        scripts: Arc<ScriptConfig>,
        answer_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            qualification,
            scripts,
            answer_url: answer_url.into(),
            status_callback_url: None,
            event_capacity: 100,
            monitor: None,
            summaries: None,
        }
    }

    pub fn with_status_callback(mut self, url: impl Into<String>) -> Self {
        self.status_callback_url = Some(url.into());
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn with_monitor(mut self, monitor: broadcast::Sender<CallEvent>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn with_summaries(mut self, summaries: mpsc::UnboundedSender<CallSummary>) -> Self {
        self.summaries = Some(summaries);
        self
    }
}

#[derive(Debug)]
struct SessionInner {
    state: CallState,
    transcript: Vec<TranscriptEntry>,
    signals: Option<Signals>,
    breakdown: Option<ScoreBreakdown>,
    score: Option<QualificationScore>,
    decision: Option<Decision>,
    provider_call_id: Option<String>,
    end_reason: Option<EndReason>,
    summary: Option<CallSummary>,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            state: CallState::Init,
            transcript: Vec::new(),
            signals: None,
            breakdown: None,
            score: None,
            decision: None,
            provider_call_id: None,
            end_reason: None,
            summary: None,
        }
    }
}

/// Read-only view of a session for APIs and logs
#[derive(Debug, Clone, Serialize)]
pub struct CallSnapshot {
    pub call_id: String,
    pub provider_call_id: Option<String>,
    pub lead: Lead,
    pub state: CallState,
    pub transcript: Vec<TranscriptEntry>,
    pub signals: Option<Signals>,
    pub breakdown: Option<ScoreBreakdown>,
    pub score: Option<QualificationScore>,
    pub decision: Option<Decision>,
    pub end_reason: Option<EndReason>,
    pub started_at: DateTime<Utc>,
}

pub struct CallSession {
    call_id: String,
    lead: Arc<Lead>,
    started_at: DateTime<Utc>,
    context: SessionContext,
    inner: Mutex<SessionInner>,
    event_tx: broadcast::Sender<CallEvent>,
}

impl CallSession {
    /// Create a session in `INIT` for a validated lead
    pub fn new(lead: Lead, context: SessionContext) -> Result<Self> {
        lead.validate()?;
        let (event_tx, _) = broadcast::channel(context.event_capacity.max(1));

        Ok(Self {
            call_id: uuid::Uuid::new_v4().to_string(),
            lead: Arc::new(lead),
            started_at: Utc::now(),
            context,
            inner: Mutex::new(SessionInner::new()),
            event_tx,
        })
    }

    /// Place the outbound call. Valid only from `INIT`.
    ///
    /// A provider failure ends the session immediately with
    /// `EndReason::DialFailed`; there is no retry. On success the session
    /// waits in `CONNECTING` for `on_call_answered`.
    pub async fn start_outbound_call(&self) -> Result<String> {
        {
            let mut inner = self.inner.lock();
            self.transition(&mut inner, CallState::Connecting)?;
        }

        let request = PlaceCallRequest {
            call_id: self.call_id.clone(),
            to: self.lead.phone.clone(),
            answer_url: self.context.answer_url.clone(),
            status_callback_url: self.context.status_callback_url.clone(),
        };

        match self.context.provider.place_call(&request).await {
            Ok(provider_call_id) => {
                tracing::info!(
                    call_id = %self.call_id,
                    provider = self.context.provider.name(),
                    provider_call_id = %provider_call_id,
                    "Outbound call placed"
                );
                self.inner.lock().provider_call_id = Some(provider_call_id.clone());
                Ok(provider_call_id)
            }
            Err(e) => {
                tracing::warn!(call_id = %self.call_id, error = %e, "Outbound dial failed");
                let reason = match &e {
                    Error::Provider(message) => message.clone(),
                    other => other.to_string(),
                };
                self.abort(EndReason::DialFailed(reason));
                Err(e)
            }
        }
    }

    /// Provider confirmed the answer: greet and start listening
    pub fn on_call_answered(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, CallState::Established)?;
        self.transition(&mut inner, CallState::Intro)?;
        self.speak(&self.context.scripts.opening);
        self.transition(&mut inner, CallState::Analyzing)
    }

    /// Record an interim transcript. Returns false when the session is not
    /// listening and the text was discarded.
    pub fn on_speech_partial(&self, text: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != CallState::Analyzing {
            tracing::debug!(call_id = %self.call_id, state = %inner.state, "Dropping late partial");
            return false;
        }
        self.append(&mut inner, TranscriptEntry::partial(text));
        true
    }

    /// Record a final utterance and run qualification on it.
    ///
    /// Returns `Ok(None)` when the session is not listening. A failing
    /// extractor leaves the session in `ANALYZING`.
    pub fn on_speech_final(&self, text: &str) -> Result<Option<Qualification>> {
        let mut inner = self.inner.lock();
        if inner.state != CallState::Analyzing {
            tracing::debug!(call_id = %self.call_id, state = %inner.state, "Dropping late final");
            return Ok(None);
        }
        self.append(&mut inner, TranscriptEntry::final_(text));

        let qualification = self
            .context
            .qualification
            .evaluate(self.lead.equity, text)
            .map_err(|e| {
                tracing::error!(call_id = %self.call_id, error = %e, "Signal extraction failed");
                e
            })?;

        self.apply_qualification(&mut inner, qualification, EndReason::Completed)?;
        Ok(Some(qualification))
    }

    /// End a call the provider never answered.
    /// Returns false if the session had already left `CONNECTING`.
    pub fn expire_answer(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != CallState::Connecting {
            return false;
        }
        self.force_end(&mut inner, EndReason::AnswerTimeout);
        true
    }

    /// Force a low score when no final utterance arrived in time.
    /// Returns false if the session had already left `ANALYZING`.
    pub fn expire_analysis(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != CallState::Analyzing {
            return false;
        }
        tracing::warn!(call_id = %self.call_id, "Analysis timed out without a final utterance");

        let outcome = self.context.qualification.timeout_outcome();
        match self.apply_qualification(&mut inner, outcome, EndReason::AnalysisTimeout) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(call_id = %self.call_id, error = %e, "Failed to apply timeout outcome");
                false
            }
        }
    }

    /// Terminate the call and publish its summary.
    ///
    /// From `FOLLOW_UP` this is the normal wrap-up. From any earlier state
    /// the call is cut short and recorded as a hangup. Once `END` is
    /// reached further calls do nothing and return `None`.
    pub fn end_call(&self) -> Option<CallSummary> {
        let mut inner = self.inner.lock();
        match inner.state {
            CallState::End => None,
            CallState::FollowUp => {
                if let Err(e) = self.transition(&mut inner, CallState::End) {
                    tracing::error!(call_id = %self.call_id, error = %e, "Failed to wrap up call");
                    return None;
                }
                inner.end_reason = Some(EndReason::Completed);
                self.finalize(&mut inner)
            }
            _ => self.force_end(&mut inner, EndReason::Hangup),
        }
    }

    /// Terminate early with a failure reason, bypassing the transition table
    pub fn abort(&self, reason: EndReason) -> Option<CallSummary> {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return None;
        }
        self.force_end(&mut inner, reason)
    }

    fn apply_qualification(
        &self,
        inner: &mut SessionInner,
        qualification: Qualification,
        end_reason: EndReason,
    ) -> Result<()> {
        let Qualification {
            signals,
            breakdown,
            score,
            decision,
        } = qualification;

        inner.signals = Some(signals);
        inner.breakdown = Some(breakdown);
        inner.score = Some(score);
        self.emit(CallEvent::ScoreUpdate {
            call_id: self.call_id.clone(),
            signals,
            breakdown,
            score,
        });

        self.transition(inner, CallState::Decision)?;
        inner.decision = Some(decision);
        self.emit(CallEvent::Decision {
            call_id: self.call_id.clone(),
            decision,
        });

        tracing::info!(
            call_id = %self.call_id,
            points = breakdown.total(),
            %score,
            %decision,
            objection = signals.objection,
            "Lead qualified"
        );

        match decision {
            Decision::Continue => {
                self.speak(&self.context.scripts.continue_line);
                self.transition(inner, CallState::FollowUp)
            }
            Decision::FollowUp => {
                self.speak(&self.context.scripts.follow_up);
                self.transition(inner, CallState::FollowUp)
            }
            Decision::End => {
                self.speak(&self.context.scripts.closing);
                self.transition(inner, CallState::End)?;
                inner.end_reason = Some(end_reason);
                self.finalize(inner);
                Ok(())
            }
        }
    }

    fn transition(&self, inner: &mut SessionInner, to: CallState) -> Result<()> {
        let from = inner.state;
        from.check_transition(to)?;
        inner.state = to;

        tracing::info!(call_id = %self.call_id, %from, %to, "Call state changed");
        self.emit(CallEvent::StateChange {
            call_id: self.call_id.clone(),
            from,
            to,
        });
        Ok(())
    }

    fn force_end(&self, inner: &mut SessionInner, reason: EndReason) -> Option<CallSummary> {
        let from = inner.state;
        inner.state = CallState::End;
        tracing::warn!(
            call_id = %self.call_id,
            %from,
            reason = reason.label(),
            "Call terminated early"
        );
        self.emit(CallEvent::StateChange {
            call_id: self.call_id.clone(),
            from,
            to: CallState::End,
        });

        inner.end_reason = Some(reason);
        self.finalize(inner)
    }

    fn finalize(&self, inner: &mut SessionInner) -> Option<CallSummary> {
        if inner.summary.is_some() {
            return None;
        }

        let end_reason = inner.end_reason.clone().unwrap_or(EndReason::Completed);
        let summary = CallSummary {
            call_id: self.call_id.clone(),
            provider_call_id: inner.provider_call_id.clone(),
            lead: (*self.lead).clone(),
            transcript: inner.transcript.clone(),
            signals: inner.signals,
            score: inner.score,
            decision: inner.decision,
            failure_reason: end_reason.failure_description(),
            end_reason,
            started_at: self.started_at,
            ended_at: Utc::now(),
        };
        inner.summary = Some(summary.clone());

        tracing::info!(
            call_id = %self.call_id,
            reason = summary.end_reason.label(),
            duration_secs = summary.duration_secs(),
            transcript_entries = summary.transcript.len(),
            "Call ended"
        );

        self.emit(CallEvent::Ended {
            call_id: self.call_id.clone(),
            summary: Box::new(summary.clone()),
        });

        if let Some(summaries) = &self.context.summaries {
            if summaries.send(summary.clone()).is_err() {
                tracing::warn!(call_id = %self.call_id, "Summary writer is gone, summary not persisted");
            }
        }

        Some(summary)
    }

    fn append(&self, inner: &mut SessionInner, entry: TranscriptEntry) {
        tracing::debug!(call_id = %self.call_id, kind = ?entry.kind, text = %entry.text, "Transcript");
        inner.transcript.push(entry.clone());
        self.emit(CallEvent::Transcript {
            call_id: self.call_id.clone(),
            entry,
        });
    }

    fn speak(&self, text: &str) {
        self.emit(CallEvent::Speak {
            call_id: self.call_id.clone(),
            text: text.to_string(),
        });
    }

    fn emit(&self, event: CallEvent) {
        if let Some(monitor) = &self.context.monitor {
            let _ = monitor.send(event.clone());
        }
        // No subscribers is not an error
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to this session's events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.event_tx.subscribe()
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn lead(&self) -> &Lead {
        &self.lead
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> CallState {
        self.inner.lock().state
    }

    pub fn is_ended(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.inner.lock().transcript.clone()
    }

    pub fn signals(&self) -> Option<Signals> {
        self.inner.lock().signals
    }

    pub fn score(&self) -> Option<QualificationScore> {
        self.inner.lock().score
    }

    pub fn decision(&self) -> Option<Decision> {
        self.inner.lock().decision
    }

    pub fn provider_call_id(&self) -> Option<String> {
        self.inner.lock().provider_call_id.clone()
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.inner.lock().end_reason.clone()
    }

    /// The terminal summary, once the session has ended
    pub fn summary(&self) -> Option<CallSummary> {
        self.inner.lock().summary.clone()
    }

    pub fn snapshot(&self) -> CallSnapshot {
        let inner = self.inner.lock();
        CallSnapshot {
            call_id: self.call_id.clone(),
            provider_call_id: inner.provider_call_id.clone(),
            lead: (*self.lead).clone(),
            state: inner.state,
            transcript: inner.transcript.clone(),
            signals: inner.signals,
            breakdown: inner.breakdown,
            score: inner.score,
            decision: inner.decision,
            end_reason: inner.end_reason.clone(),
            started_at: self.started_at,
        }
    }
}

impl std::fmt::Debug for CallSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSession")
            .field("call_id", &self.call_id)
            .field("state", &self.state())
            .finish()
    }
}
