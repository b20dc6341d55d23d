//! Core types and traits for the voice dialer
//!
//! This crate provides foundational types used across all other crates:
//! - Call lifecycle types (leads, states, transcript, summaries)
//! - Qualification values (signals, scores, decisions)
//! - Session events for subscribers
//! - Audio frame types and μ-law decoding
//! - Collaborator traits (signaling, speech, extraction, sinks)
//! - Error types

pub mod audio;
pub mod call;
pub mod error;
pub mod events;
pub mod qualification;
pub mod traits;

pub use audio::{AudioBuffer, AudioEncoding, AudioFrame, SampleRate};
pub use call::{CallState, CallSummary, EndReason, Lead, TranscriptEntry, TranscriptKind};
pub use error::{Error, Result};
pub use events::CallEvent;
pub use qualification::{
    Decision, Motivation, Qualification, QualificationScore, ScoreBreakdown, Signals, Timeline,
};

pub use traits::{
    CallSummarySink, PlaceCallRequest, ProviderEvent, RecognizerContext, RecognizerFactory,
    SignalingProvider, SpeechEvent, SpeechRecognizer, TextSignalExtractor,
};
