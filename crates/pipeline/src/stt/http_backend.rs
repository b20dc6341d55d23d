//! HTTP STT backend - calls an external transcription sidecar
//!
//! Audio is endpointed locally by frame energy. Each completed utterance is
//! posted as PCM16 to `{url}/transcribe`; while speech continues, the
//! buffered audio is re-sent every `partial_interval_ms` to produce partials.

use crate::vad::{EnergyEndpointer, VadResult};
use crate::PipelineError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use voice_dialer_config::HttpRecognizerConfig;
use voice_dialer_core::{
    audio::samples_to_pcm16, AudioBuffer, AudioFrame, RecognizerContext, RecognizerFactory,
    Result, SampleRate, SpeechEvent, SpeechRecognizer,
};

/// Response from the transcription service
#[derive(Debug, Deserialize)]
struct SttResponse {
    text: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    error: Option<String>,
}

/// Per-connection recognizer backed by the HTTP sidecar
pub struct HttpRecognizer {
    config: HttpRecognizerConfig,
    client: reqwest::Client,
    call_id: String,
    endpointer: EnergyEndpointer,
    buffer: AudioBuffer,
    since_partial: Duration,
    last_partial: Option<String>,
}

impl HttpRecognizer {
    pub fn new(
        config: HttpRecognizerConfig,
        client: reqwest::Client,
        context: &RecognizerContext,
    ) -> Self {
        let endpointer = EnergyEndpointer::new((&config).into());
        let buffer = AudioBuffer::new(
            context.sample_rate,
            Duration::from_secs(config.max_utterance_secs),
        );

        Self {
            config,
            client,
            call_id: context.call_id.clone(),
            endpointer,
            buffer,
            since_partial: Duration::ZERO,
            last_partial: None,
        }
    }

    /// Send audio to the sidecar and return the transcript text
    async fn transcribe(
        &self,
        samples: &[f32],
        rate: SampleRate,
    ) -> std::result::Result<String, PipelineError> {
        let url = format!("{}/transcribe", self.config.url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "audio/pcm")
            .header("X-Language", &self.config.language)
            .header("X-Sample-Rate", rate.as_u32().to_string())
            .body(samples_to_pcm16(samples))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::Timeout
                } else {
                    PipelineError::Stt(format!("HTTP STT request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(PipelineError::Stt(format!(
                "HTTP STT service returned error: {}",
                response.status()
            )));
        }

        let result: SttResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Model(format!("Failed to parse STT response: {}", e)))?;

        if let Some(error) = &result.error {
            tracing::warn!(call_id = %self.call_id, "STT service returned error: {}", error);
        }

        tracing::trace!(
            call_id = %self.call_id,
            confidence = result.confidence,
            "Transcribed {} samples",
            samples.len()
        );

        Ok(result.text.trim().to_string())
    }

    async fn maybe_partial(&mut self) -> Vec<SpeechEvent> {
        let interval = Duration::from_millis(self.config.partial_interval_ms);
        if interval.is_zero() || self.since_partial < interval {
            return Vec::new();
        }
        self.since_partial = Duration::ZERO;

        // Partials are best effort; the final carries the authoritative text
        match self.transcribe(self.buffer.samples(), self.buffer.sample_rate()).await {
            Ok(text) if !text.is_empty() && self.last_partial.as_deref() != Some(text.as_str()) => {
                self.last_partial = Some(text.clone());
                vec![SpeechEvent::Partial(text)]
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!(call_id = %self.call_id, error = %e, "Partial transcription failed");
                Vec::new()
            }
        }
    }

    async fn finalize_utterance(&mut self) -> std::result::Result<Vec<SpeechEvent>, PipelineError> {
        let rate = self.buffer.sample_rate();
        let duration = self.buffer.duration();
        let samples = self.buffer.take();
        self.since_partial = Duration::ZERO;
        self.last_partial = None;

        if duration < Duration::from_millis(self.config.min_utterance_ms) {
            tracing::debug!(call_id = %self.call_id, ?duration, "Discarding short utterance");
            return Ok(Vec::new());
        }

        let text = self.transcribe(&samples, rate).await?;
        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![SpeechEvent::Final(text)])
    }
}

#[async_trait]
impl SpeechRecognizer for HttpRecognizer {
    async fn accept_frame(&mut self, frame: &AudioFrame) -> Result<Vec<SpeechEvent>> {
        match self.endpointer.process(frame) {
            VadResult::Silence => Ok(Vec::new()),
            VadResult::SpeechStart => {
                self.buffer.clear();
                self.buffer.push(frame);
                self.since_partial = frame.duration;
                Ok(Vec::new())
            }
            VadResult::SpeechContinue => {
                self.buffer.push(frame);
                self.since_partial += frame.duration;
                Ok(self.maybe_partial().await)
            }
            VadResult::SpeechEnd => {
                self.buffer.push(frame);
                Ok(self.finalize_utterance().await?)
            }
        }
    }

    async fn finish(&mut self) -> Result<Vec<SpeechEvent>> {
        self.endpointer.reset();
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.finalize_utterance().await?)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Shares one connection pool across every media connection
pub struct HttpRecognizerFactory {
    config: HttpRecognizerConfig,
    client: reqwest::Client,
}

impl HttpRecognizerFactory {
    pub fn new(config: HttpRecognizerConfig) -> std::result::Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PipelineError::Model(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(url = %config.url, language = %config.language, "HTTP STT backend configured");

        Ok(Self { config, client })
    }
}

impl RecognizerFactory for HttpRecognizerFactory {
    fn create(&self, context: &RecognizerContext) -> Result<Box<dyn SpeechRecognizer>> {
        Ok(Box::new(HttpRecognizer::new(
            self.config.clone(),
            self.client.clone(),
            context,
        )))
    }

    fn name(&self) -> &str {
        "http"
    }
}
