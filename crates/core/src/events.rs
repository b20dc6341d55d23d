//! Events published by a call session to its subscribers

use crate::call::{CallState, CallSummary, TranscriptEntry};
use crate::qualification::{Decision, QualificationScore, ScoreBreakdown, Signals};
use serde::{Deserialize, Serialize};

/// Immutable snapshot of one observable step of a call.
///
/// Serialized with a `type` tag so WebSocket observers can switch on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallEvent {
    StateChange {
        call_id: String,
        from: CallState,
        to: CallState,
    },
    Transcript {
        call_id: String,
        entry: TranscriptEntry,
    },
    ScoreUpdate {
        call_id: String,
        signals: Signals,
        breakdown: ScoreBreakdown,
        score: QualificationScore,
    },
    Decision {
        call_id: String,
        decision: Decision,
    },
    Speak {
        call_id: String,
        text: String,
    },
    Ended {
        call_id: String,
        summary: Box<CallSummary>,
    },
}

impl CallEvent {
    pub fn call_id(&self) -> &str {
        match self {
            CallEvent::StateChange { call_id, .. }
            | CallEvent::Transcript { call_id, .. }
            | CallEvent::ScoreUpdate { call_id, .. }
            | CallEvent::Decision { call_id, .. }
            | CallEvent::Speak { call_id, .. }
            | CallEvent::Ended { call_id, .. } => call_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CallEvent::StateChange { .. } => "state_change",
            CallEvent::Transcript { .. } => "transcript",
            CallEvent::ScoreUpdate { .. } => "score_update",
            CallEvent::Decision { .. } => "decision",
            CallEvent::Speak { .. } => "speak",
            CallEvent::Ended { .. } => "ended",
        }
    }
}
