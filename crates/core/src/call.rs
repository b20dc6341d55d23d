//! Call lifecycle types: leads, states, transcript entries and summaries

use crate::qualification::{Decision, QualificationScore, Signals};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static E164: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+[1-9]\d{6,14}$").expect("valid regex"));

/// The contact being called. Immutable once a session has been created for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// E.164 phone number
    pub phone: String,
    /// Estimated equity percentage, never negative
    pub equity: f64,
    #[serde(default)]
    pub address: Option<String>,
}

impl Lead {
    pub fn new(phone: impl Into<String>, equity: f64, address: Option<String>) -> Result<Self> {
        let lead = Self {
            phone: phone.into(),
            equity,
            address,
        };
        lead.validate()?;
        Ok(lead)
    }

    pub fn validate(&self) -> Result<()> {
        if !E164.is_match(&self.phone) {
            return Err(Error::InvalidLead(format!(
                "phone '{}' is not an E.164 number",
                self.phone
            )));
        }
        if !self.equity.is_finite() || self.equity < 0.0 {
            return Err(Error::InvalidLead(format!(
                "equity must be a non-negative number, got {}",
                self.equity
            )));
        }
        Ok(())
    }
}

/// Call states in their mandated order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallState {
    Init,
    Connecting,
    Established,
    Intro,
    Analyzing,
    Decision,
    FollowUp,
    End,
}

/// Every legal `(from, to)` pair. Each state may advance to its immediate
/// successor; `Decision -> End` is the only skip.
const TRANSITIONS: &[(CallState, CallState)] = &[
    (CallState::Init, CallState::Connecting),
    (CallState::Connecting, CallState::Established),
    (CallState::Established, CallState::Intro),
    (CallState::Intro, CallState::Analyzing),
    (CallState::Analyzing, CallState::Decision),
    (CallState::Decision, CallState::FollowUp),
    (CallState::FollowUp, CallState::End),
    (CallState::Decision, CallState::End),
];

impl CallState {
    pub const ORDER: [CallState; 8] = [
        CallState::Init,
        CallState::Connecting,
        CallState::Established,
        CallState::Intro,
        CallState::Analyzing,
        CallState::Decision,
        CallState::FollowUp,
        CallState::End,
    ];

    pub fn can_transition_to(self, to: CallState) -> bool {
        TRANSITIONS.contains(&(self, to))
    }

    /// Validate a transition against the table
    pub fn check_transition(self, to: CallState) -> Result<()> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(Error::InvalidTransition { from: self, to })
        }
    }

    pub fn is_terminal(self) -> bool {
        self == CallState::End
    }

    /// Position in the mandated order
    pub fn ordinal(self) -> usize {
        Self::ORDER
            .iter()
            .position(|s| *s == self)
            .unwrap_or(Self::ORDER.len())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Init => "INIT",
            CallState::Connecting => "CONNECTING",
            CallState::Established => "ESTABLISHED",
            CallState::Intro => "INTRO",
            CallState::Analyzing => "ANALYZING",
            CallState::Decision => "DECISION",
            CallState::FollowUp => "FOLLOW_UP",
            CallState::End => "END",
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptKind {
    Partial,
    Final,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub kind: TranscriptKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            kind: TranscriptKind::Partial,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn final_(text: impl Into<String>) -> Self {
        Self {
            kind: TranscriptKind::Final,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_final(&self) -> bool {
        self.kind == TranscriptKind::Final
    }
}

/// Why a session reached `End`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum EndReason {
    /// Normal completion through the decision path
    Completed,
    /// The provider refused or failed to place the call
    DialFailed(String),
    /// The provider reported a terminal failure status (busy, no-answer, ...)
    ProviderFailure(String),
    AnswerTimeout,
    AnalysisTimeout,
    /// The callee or provider hung up before the decision path finished
    Hangup,
}

impl EndReason {
    /// Human-readable failure reason, `None` for a normal completion
    pub fn failure_description(&self) -> Option<String> {
        match self {
            EndReason::Completed => None,
            EndReason::DialFailed(reason) => Some(format!("dial failed: {reason}")),
            EndReason::ProviderFailure(status) => Some(format!("provider reported {status}")),
            EndReason::AnswerTimeout => Some("call was not answered in time".to_string()),
            EndReason::AnalysisTimeout => {
                Some("no final utterance before the analysis timeout".to_string())
            }
            EndReason::Hangup => Some("call ended before a decision was reached".to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EndReason::Completed => "completed",
            EndReason::DialFailed(_) => "dial_failed",
            EndReason::ProviderFailure(_) => "provider_failure",
            EndReason::AnswerTimeout => "answer_timeout",
            EndReason::AnalysisTimeout => "analysis_timeout",
            EndReason::Hangup => "hangup",
        }
    }
}

/// Terminal record of a call handed to the summary sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub call_id: String,
    pub provider_call_id: Option<String>,
    pub lead: Lead,
    pub transcript: Vec<TranscriptEntry>,
    pub signals: Option<Signals>,
    pub score: Option<QualificationScore>,
    pub decision: Option<Decision>,
    pub end_reason: EndReason,
    pub failure_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl CallSummary {
    pub fn duration_secs(&self) -> f64 {
        (self.ended_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
