//! Per-session timers
//!
//! A supervisor task follows one session's event stream and arms a single
//! deadline for the state the session is in:
//! - `CONNECTING`: answer timeout, the call is aborted
//! - `ANALYZING`: analysis timeout, the lead is scored LOW and the call ends
//! - `FOLLOW_UP`: hold, then the call is wrapped up
//!
//! The task exits once the session publishes its summary.

use crate::call_session::CallSession;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use voice_dialer_config::SessionConfig;
use voice_dialer_core::{CallEvent, CallState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    pub answer: Duration,
    pub analysis: Duration,
    pub follow_up_hold: Duration,
}

impl SessionTimeouts {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            answer: Duration::from_secs(config.answer_timeout_secs),
            analysis: Duration::from_secs(config.analysis_timeout_secs),
            follow_up_hold: Duration::from_millis(config.follow_up_hold_ms),
        }
    }

    fn deadline_for(&self, state: CallState) -> Option<(CallState, Instant)> {
        let after = match state {
            CallState::Connecting => self.answer,
            CallState::Analyzing => self.analysis,
            CallState::FollowUp => self.follow_up_hold,
            _ => return None,
        };
        Some((state, Instant::now() + after))
    }
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Spawn the timer task. `events` must be subscribed before the session
/// leaves `INIT` so no transition is missed.
pub fn spawn_supervisor(
    session: Arc<CallSession>,
    events: broadcast::Receiver<CallEvent>,
    timeouts: SessionTimeouts,
) -> JoinHandle<()> {
    tokio::spawn(supervise(session, events, timeouts))
}

async fn supervise(
    session: Arc<CallSession>,
    mut events: broadcast::Receiver<CallEvent>,
    timeouts: SessionTimeouts,
) {
    let mut deadline = timeouts.deadline_for(session.state());

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(CallEvent::StateChange { to, .. }) => deadline = timeouts.deadline_for(to),
                Ok(CallEvent::Ended { .. }) | Err(RecvError::Closed) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(call_id = session.call_id(), skipped, "Supervisor lagged, resyncing");
                    let state = session.state();
                    if state.is_terminal() {
                        break;
                    }
                    if deadline.map(|(s, _)| s) != Some(state) {
                        deadline = timeouts.deadline_for(state);
                    }
                }
            },
            _ = wait_until(deadline) => {
                if let Some((state, _)) = deadline.take() {
                    expire(&session, state);
                }
            }
        }
    }

    tracing::debug!(call_id = session.call_id(), "Session supervisor finished");
}

async fn wait_until(deadline: Option<(CallState, Instant)>) {
    match deadline {
        Some((_, at)) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn expire(session: &CallSession, state: CallState) {
    match state {
        CallState::Connecting => {
            if session.expire_answer() {
                tracing::warn!(call_id = session.call_id(), "Call not answered in time");
            }
        }
        CallState::Analyzing => {
            session.expire_analysis();
        }
        CallState::FollowUp => {
            tracing::debug!(call_id = session.call_id(), "Follow-up hold elapsed");
            session.end_call();
        }
        _ => {}
    }
}
