//! Energy-based voice activity detection and utterance endpointing
//!
//! Telephony audio is narrowband and usually quiet between turns, so a
//! frame-energy threshold plus a trailing-silence window is enough to cut
//! utterances for the transcription backend.

use std::time::Duration;
use voice_dialer_config::HttpRecognizerConfig;
use voice_dialer_core::AudioFrame;

/// VAD state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VadState {
    /// No speech detected
    #[default]
    Silence,
    /// Inside an utterance (including short pauses)
    Speech,
}

/// VAD processing result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadResult {
    Silence,
    /// First loud frame of a new utterance
    SpeechStart,
    /// Utterance still open
    SpeechContinue,
    /// Trailing silence or the utterance length cap closed the utterance
    SpeechEnd,
}

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub speech_threshold_db: f32,
    pub end_silence: Duration,
    pub max_utterance: Duration,
}

impl From<&HttpRecognizerConfig> for EndpointConfig {
    fn from(config: &HttpRecognizerConfig) -> Self {
        Self {
            speech_threshold_db: config.speech_threshold_db,
            end_silence: Duration::from_millis(config.end_of_utterance_silence_ms),
            max_utterance: Duration::from_secs(config.max_utterance_secs),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        (&HttpRecognizerConfig::default()).into()
    }
}

#[derive(Debug)]
pub struct EnergyEndpointer {
    config: EndpointConfig,
    state: VadState,
    utterance: Duration,
    trailing_silence: Duration,
}

impl EnergyEndpointer {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            state: VadState::Silence,
            utterance: Duration::ZERO,
            trailing_silence: Duration::ZERO,
        }
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    /// Length of the open utterance, zero when silent
    pub fn utterance_duration(&self) -> Duration {
        self.utterance
    }

    pub fn process(&mut self, frame: &AudioFrame) -> VadResult {
        let loud = frame.energy_db >= self.config.speech_threshold_db;

        match self.state {
            VadState::Silence if loud => {
                self.state = VadState::Speech;
                self.utterance = frame.duration;
                self.trailing_silence = Duration::ZERO;
                VadResult::SpeechStart
            }
            VadState::Silence => VadResult::Silence,
            VadState::Speech => {
                self.utterance += frame.duration;
                if loud {
                    self.trailing_silence = Duration::ZERO;
                } else {
                    self.trailing_silence += frame.duration;
                }

                if self.trailing_silence >= self.config.end_silence
                    || self.utterance >= self.config.max_utterance
                {
                    self.reset();
                    VadResult::SpeechEnd
                } else {
                    VadResult::SpeechContinue
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = VadState::Silence;
        self.utterance = Duration::ZERO;
        self.trailing_silence = Duration::ZERO;
    }
}
