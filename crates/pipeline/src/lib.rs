//! Speech pipeline for call media streams
//!
//! This crate turns decoded telephony audio into partial and final
//! transcripts:
//! - Energy-based utterance endpointing
//! - Scripted recognizer (deterministic, no external service)
//! - HTTP recognizer backed by a transcription sidecar

pub mod stt;
pub mod vad;

pub use stt::{
    create_recognizer_factory, HttpRecognizer, HttpRecognizerFactory, ScriptedRecognizer,
    ScriptedRecognizerFactory,
};
pub use vad::{EndpointConfig, EnergyEndpointer, VadResult, VadState};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("STT error: {0}")]
    Stt(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Timeout")]
    Timeout,
}

impl From<PipelineError> for voice_dialer_core::Error {
    fn from(err: PipelineError) -> Self {
        voice_dialer_core::Error::Recognizer(err.to_string())
    }
}
