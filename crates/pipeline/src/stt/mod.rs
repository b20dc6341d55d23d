//! Speech-to-text backends for media connections
//!
//! Each media connection gets its own recognizer from a factory chosen by
//! `media.recognizer`:
//! - `scripted`: fixed utterance after a configured number of frames
//! - `http`: energy endpointing plus a transcription sidecar

mod http_backend;
mod scripted;

pub use http_backend::{HttpRecognizer, HttpRecognizerFactory};
pub use scripted::{ScriptedRecognizer, ScriptedRecognizerFactory};

use crate::PipelineError;
use std::sync::Arc;
use voice_dialer_config::{MediaConfig, RecognizerKind};
use voice_dialer_core::RecognizerFactory;

/// Build the recognizer factory selected by configuration
pub fn create_recognizer_factory(
    config: &MediaConfig,
) -> Result<Arc<dyn RecognizerFactory>, PipelineError> {
    let factory: Arc<dyn RecognizerFactory> = match config.recognizer {
        RecognizerKind::Scripted => Arc::new(ScriptedRecognizerFactory::new(config.scripted.clone())),
        RecognizerKind::Http => Arc::new(HttpRecognizerFactory::new(config.http.clone())?),
    };

    tracing::info!(recognizer = factory.name(), "Speech recognizer configured");
    Ok(factory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_selection() {
        let mut config = MediaConfig::default();
        assert_eq!(create_recognizer_factory(&config).unwrap().name(), "scripted");

        config.recognizer = RecognizerKind::Http;
        assert_eq!(create_recognizer_factory(&config).unwrap().name(), "http");
    }
}
