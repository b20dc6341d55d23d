//! Telephony transport for the voice dialer
//!
//! - Media-stream wire protocol (`connected`, `start`, `media`, `stop`)
//! - Twilio REST signaling and webhook payloads
//! - Simulated signaling provider for local runs and tests
//! - Static TwiML answer document

pub mod media;
pub mod simulated;
pub mod twilio;
pub mod twiml;

pub use media::{parse_message, MediaFormat, MediaPayload, StartMetadata, StreamMessage};
pub use simulated::SimulatedSignaling;
pub use twilio::{CallStatusCallback, TwilioSignaling, VoiceWebhook};
pub use twiml::answer_document;

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use voice_dialer_config::{TelephonyConfig, TelephonyProvider};
use voice_dialer_core::{ProviderEvent, SignalingProvider};

/// Transport errors
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Malformed stream message: {0}")]
    Protocol(String),

    #[error("Payload decode error: {0}")]
    Decode(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Provider rejected request ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<TransportError> for voice_dialer_core::Error {
    fn from(err: TransportError) -> Self {
        voice_dialer_core::Error::Provider(err.to_string())
    }
}

/// Build the signaling provider selected by configuration.
///
/// The simulated provider reports answers on `events`; the Twilio provider
/// reports them through webhooks instead and never uses the channel.
pub fn create_signaling_provider(
    config: &TelephonyConfig,
    events: mpsc::UnboundedSender<ProviderEvent>,
) -> Result<Arc<dyn SignalingProvider>, TransportError> {
    let provider: Arc<dyn SignalingProvider> = match config.provider {
        TelephonyProvider::Simulated => Arc::new(SimulatedSignaling::from_config(config, events)),
        TelephonyProvider::Twilio => Arc::new(TwilioSignaling::from_config(config)?),
    };

    tracing::info!(provider = provider.name(), "Signaling provider configured");
    Ok(provider)
}
