//! In-process signaling provider
//!
//! Accepts every dial attempt and reports the answer on the provider event
//! channel after a fixed delay. Used when no telephony credentials are
//! configured and in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use voice_dialer_config::TelephonyConfig;
use voice_dialer_core::{Error, PlaceCallRequest, ProviderEvent, Result, SignalingProvider};

/// Dial requests kept for inspection; older ones are dropped
pub const PLACED_HISTORY: usize = 64;

pub struct SimulatedSignaling {
    /// `None` leaves answering to the caller
    answer_delay: Option<Duration>,
    fail_dials: bool,
    events: mpsc::UnboundedSender<ProviderEvent>,
    placed: Mutex<VecDeque<PlaceCallRequest>>,
}

impl SimulatedSignaling {
    pub fn new(
        answer_delay: Option<Duration>,
        events: mpsc::UnboundedSender<ProviderEvent>,
    ) -> Self {
        Self {
            answer_delay,
            fail_dials: false,
            events,
            placed: Mutex::new(VecDeque::with_capacity(PLACED_HISTORY)),
        }
    }

    pub fn from_config(
        config: &TelephonyConfig,
        events: mpsc::UnboundedSender<ProviderEvent>,
    ) -> Self {
        let mut provider = Self::new(
            Some(Duration::from_millis(config.simulated_answer_delay_ms)),
            events,
        );
        provider.fail_dials = config.simulated_dial_failure;
        provider
    }

    /// Reject every dial attempt
    pub fn failing(mut self) -> Self {
        self.fail_dials = true;
        self
    }

    /// The most recent requests, oldest first
    pub fn placed_calls(&self) -> Vec<PlaceCallRequest> {
        self.placed.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl SignalingProvider for SimulatedSignaling {
    async fn place_call(&self, request: &PlaceCallRequest) -> Result<String> {
        {
            let mut placed = self.placed.lock();
            if placed.len() == PLACED_HISTORY {
                placed.pop_front();
            }
            placed.push_back(request.clone());
        }

        if self.fail_dials {
            return Err(Error::Provider(format!(
                "simulated dial failure for {}",
                request.to
            )));
        }

        let provider_call_id = format!("SIM{}", uuid::Uuid::new_v4().simple());
        tracing::info!(
            call_id = %request.call_id,
            provider_call_id = %provider_call_id,
            "Simulated call placed"
        );

        if let Some(delay) = self.answer_delay {
            let events = self.events.clone();
            let id = provider_call_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                // Receiver gone means the orchestrator shut down
                let _ = events.send(ProviderEvent::Answered {
                    provider_call_id: id,
                });
            });
        }

        Ok(provider_call_id)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
