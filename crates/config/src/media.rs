//! Speech recognition settings for media streams

use serde::{Deserialize, Serialize};

use crate::constants::speech;
use crate::ConfigError;

/// Which recognizer is attached to each media connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecognizerKind {
    /// Deterministic stand-in that produces a fixed utterance
    #[default]
    Scripted,
    /// Energy endpointing plus an HTTP transcription sidecar
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedRecognizerConfig {
    #[serde(default = "default_scripted_partial")]
    pub partial_text: String,
    #[serde(default = "default_scripted_final")]
    pub final_text: String,
    /// Frames received before the partial is emitted
    #[serde(default = "default_partial_after")]
    pub partial_after_frames: u64,
    /// Frames received before the final is emitted
    #[serde(default = "default_final_after")]
    pub final_after_frames: u64,
}

fn default_scripted_partial() -> String {
    speech::SCRIPTED_PARTIAL.to_string()
}
fn default_scripted_final() -> String {
    speech::SCRIPTED_FINAL.to_string()
}
fn default_partial_after() -> u64 {
    speech::SCRIPTED_PARTIAL_AFTER_FRAMES
}
fn default_final_after() -> u64 {
    speech::SCRIPTED_FINAL_AFTER_FRAMES
}

impl Default for ScriptedRecognizerConfig {
    fn default() -> Self {
        Self {
            partial_text: default_scripted_partial(),
            final_text: default_scripted_final(),
            partial_after_frames: default_partial_after(),
            final_after_frames: default_final_after(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRecognizerConfig {
    /// Sidecar base URL; audio is posted to `{url}/transcribe`
    #[serde(default = "default_stt_url")]
    pub url: String,
    #[serde(default = "default_stt_timeout")]
    pub timeout_ms: u64,
    /// Language hint forwarded as `X-Language`
    #[serde(default = "default_language")]
    pub language: String,
    /// Frames louder than this count as speech
    #[serde(default = "default_speech_threshold")]
    pub speech_threshold_db: f32,
    /// Trailing silence that ends an utterance
    #[serde(default = "default_silence")]
    pub end_of_utterance_silence_ms: u64,
    /// How often a partial is requested while speech continues (0 = never)
    #[serde(default = "default_partial_interval")]
    pub partial_interval_ms: u64,
    /// Utterances shorter than this are discarded
    #[serde(default = "default_min_utterance")]
    pub min_utterance_ms: u64,
    #[serde(default = "default_max_utterance")]
    pub max_utterance_secs: u64,
}

fn default_stt_url() -> String {
    speech::STT_URL.to_string()
}
fn default_stt_timeout() -> u64 {
    speech::STT_TIMEOUT_MS
}
fn default_language() -> String {
    "en".to_string()
}
fn default_speech_threshold() -> f32 {
    speech::SPEECH_THRESHOLD_DB
}
fn default_silence() -> u64 {
    speech::END_OF_UTTERANCE_SILENCE_MS
}
fn default_partial_interval() -> u64 {
    speech::PARTIAL_INTERVAL_MS
}
fn default_min_utterance() -> u64 {
    speech::MIN_UTTERANCE_MS
}
fn default_max_utterance() -> u64 {
    speech::MAX_UTTERANCE_SECS
}

impl Default for HttpRecognizerConfig {
    fn default() -> Self {
        Self {
            url: default_stt_url(),
            timeout_ms: default_stt_timeout(),
            language: default_language(),
            speech_threshold_db: default_speech_threshold(),
            end_of_utterance_silence_ms: default_silence(),
            partial_interval_ms: default_partial_interval(),
            min_utterance_ms: default_min_utterance(),
            max_utterance_secs: default_max_utterance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MediaConfig {
    #[serde(default)]
    pub recognizer: RecognizerKind,
    #[serde(default)]
    pub scripted: ScriptedRecognizerConfig,
    #[serde(default)]
    pub http: HttpRecognizerConfig,
}

impl MediaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.recognizer {
            RecognizerKind::Scripted => {
                let s = &self.scripted;
                if s.final_after_frames == 0 || s.partial_after_frames > s.final_after_frames {
                    return Err(ConfigError::InvalidValue {
                        field: "media.scripted.final_after_frames".to_string(),
                        message: "Final must come after the partial and at least one frame"
                            .to_string(),
                    });
                }
            }
            RecognizerKind::Http => {
                let h = &self.http;
                if h.url.trim().is_empty() {
                    return Err(ConfigError::MissingField("media.http.url".to_string()));
                }
                if h.end_of_utterance_silence_ms == 0 || h.timeout_ms == 0 {
                    return Err(ConfigError::InvalidValue {
                        field: "media.http".to_string(),
                        message: "Silence window and timeout must be positive".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
