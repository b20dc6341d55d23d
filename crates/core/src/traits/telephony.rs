//! Telephony signaling trait and provider callbacks

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Parameters for one outbound dial attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCallRequest {
    /// Our session id, forwarded so the provider can echo it back
    pub call_id: String,
    /// Destination in E.164
    pub to: String,
    /// Webhook the provider fetches when the callee answers
    pub answer_url: String,
    /// Optional webhook for call status updates
    pub status_callback_url: Option<String>,
}

/// Asynchronous notifications from the provider, keyed by its call id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEvent {
    Answered { provider_call_id: String },
    /// Terminal failure such as busy, no-answer or canceled
    Failed { provider_call_id: String, status: String },
    /// The call finished after being answered
    Completed { provider_call_id: String },
}

impl ProviderEvent {
    pub fn provider_call_id(&self) -> &str {
        match self {
            ProviderEvent::Answered { provider_call_id }
            | ProviderEvent::Failed { provider_call_id, .. }
            | ProviderEvent::Completed { provider_call_id } => provider_call_id,
        }
    }
}

/// Places outbound calls
///
/// Answer, status and media arrive later through webhooks and the media
/// stream, so placement only returns the provider's call id.
#[async_trait]
pub trait SignalingProvider: Send + Sync + 'static {
    async fn place_call(&self, request: &PlaceCallRequest) -> Result<String>;

    fn name(&self) -> &str;
}
