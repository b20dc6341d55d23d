//! Deterministic recognizer
//!
//! Emits a fixed partial and final utterance once enough media frames have
//! arrived. Used when no transcription service is configured and in tests.

use async_trait::async_trait;
use voice_dialer_config::ScriptedRecognizerConfig;
use voice_dialer_core::{
    AudioFrame, RecognizerContext, RecognizerFactory, Result, SpeechEvent, SpeechRecognizer,
};

pub struct ScriptedRecognizer {
    config: ScriptedRecognizerConfig,
    frames: u64,
    partial_sent: bool,
    final_sent: bool,
}

impl ScriptedRecognizer {
    pub fn new(config: ScriptedRecognizerConfig) -> Self {
        Self {
            config,
            frames: 0,
            partial_sent: false,
            final_sent: false,
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn accept_frame(&mut self, _frame: &AudioFrame) -> Result<Vec<SpeechEvent>> {
        self.frames += 1;
        let mut events = Vec::new();

        if !self.partial_sent && self.frames >= self.config.partial_after_frames {
            self.partial_sent = true;
            events.push(SpeechEvent::Partial(self.config.partial_text.clone()));
        }

        if !self.final_sent && self.frames >= self.config.final_after_frames {
            self.final_sent = true;
            events.push(SpeechEvent::Final(self.config.final_text.clone()));
        }

        Ok(events)
    }

    /// A stream that stops mid-utterance still delivers its final
    async fn finish(&mut self) -> Result<Vec<SpeechEvent>> {
        if self.partial_sent && !self.final_sent {
            self.final_sent = true;
            return Ok(vec![SpeechEvent::Final(self.config.final_text.clone())]);
        }
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub struct ScriptedRecognizerFactory {
    config: ScriptedRecognizerConfig,
}

impl ScriptedRecognizerFactory {
    pub fn new(config: ScriptedRecognizerConfig) -> Self {
        Self { config }
    }
}

impl RecognizerFactory for ScriptedRecognizerFactory {
    fn create(&self, context: &RecognizerContext) -> Result<Box<dyn SpeechRecognizer>> {
        tracing::debug!(call_id = %context.call_id, "Creating scripted recognizer");
        Ok(Box::new(ScriptedRecognizer::new(self.config.clone())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_dialer_core::SampleRate;

    fn config(partial: u64, final_: u64) -> ScriptedRecognizerConfig {
        ScriptedRecognizerConfig {
            partial_after_frames: partial,
            final_after_frames: final_,
            ..Default::default()
        }
    }

    fn silence() -> AudioFrame {
        AudioFrame::from_mulaw(&[0xFF; 160], SampleRate::Hz8000, 0)
    }

    #[tokio::test]
    async fn test_emits_partial_then_final_once() {
        let mut recognizer = ScriptedRecognizer::new(config(2, 4));
        let mut events = Vec::new();
        for _ in 0..10 {
            events.extend(recognizer.accept_frame(&silence()).await.unwrap());
        }

        assert_eq!(
            events,
            vec![
                SpeechEvent::Partial("Yes".to_string()),
                SpeechEvent::Final("Yes, I am interested and my timeline is now.".to_string()),
            ]
        );
        assert!(recognizer.finish().await.unwrap().is_empty());
        assert_eq!(recognizer.frames_seen(), 10);
    }

    #[tokio::test]
    async fn test_finish_flushes_open_utterance() {
        let mut recognizer = ScriptedRecognizer::new(config(1, 50));
        recognizer.accept_frame(&silence()).await.unwrap();

        let flushed = recognizer.finish().await.unwrap();
        assert_eq!(flushed.len(), 1);
        assert!(flushed[0].is_final());
    }

    #[tokio::test]
    async fn test_finish_without_speech_is_empty() {
        let mut recognizer = ScriptedRecognizer::new(config(25, 50));
        assert!(recognizer.finish().await.unwrap().is_empty());
    }
}
