//! Speech recognition traits

use crate::{AudioEncoding, AudioFrame, Result, SampleRate};
use async_trait::async_trait;

/// Recognition output for one media connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Interim hypothesis; may be revised
    Partial(String),
    /// End-of-utterance transcript
    Final(String),
}

impl SpeechEvent {
    pub fn text(&self) -> &str {
        match self {
            SpeechEvent::Partial(text) | SpeechEvent::Final(text) => text,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, SpeechEvent::Final(_))
    }
}

/// What a recognizer knows about the stream it is attached to
#[derive(Debug, Clone)]
pub struct RecognizerContext {
    pub call_id: String,
    pub encoding: AudioEncoding,
    pub sample_rate: SampleRate,
}

/// Streaming speech-to-text for a single media connection
///
/// Implementations:
/// - `ScriptedRecognizer` - deterministic stand-in that emits a fixed utterance
/// - `HttpRecognizer` - energy endpointing plus an HTTP transcription sidecar
///
/// # Example
///
/// ```ignore
/// let mut recognizer = factory.create(&context)?;
/// for event in recognizer.accept_frame(&frame).await? {
///     println!("{:?}", event);
/// }
/// let trailing = recognizer.finish().await?;
/// ```
#[async_trait]
pub trait SpeechRecognizer: Send + 'static {
    /// Feed one decoded frame; returns any events it completed
    async fn accept_frame(&mut self, frame: &AudioFrame) -> Result<Vec<SpeechEvent>>;

    /// Flush buffered audio when the stream stops
    async fn finish(&mut self) -> Result<Vec<SpeechEvent>>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Builds one recognizer per media connection
pub trait RecognizerFactory: Send + Sync + 'static {
    fn create(&self, context: &RecognizerContext) -> Result<Box<dyn SpeechRecognizer>>;

    fn name(&self) -> &str;
}
