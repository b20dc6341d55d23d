//! Configuration management for the voice dialer
//!
//! Supports loading configuration from:
//! - YAML/TOML/JSON files under `config/`
//! - Environment variables (`VOICE_DIALER__` prefix, `__` separator)
//!
//! Every section has defaults, so an empty configuration runs a simulated
//! dialer with the scripted recognizer.

pub mod constants;
pub mod media;
pub mod qualification;
pub mod settings;

pub use media::{HttpRecognizerConfig, MediaConfig, RecognizerKind, ScriptedRecognizerConfig};
pub use qualification::{QualificationConfig, ScoringRulesConfig, VocabularyConfig};
pub use settings::{
    load_settings, load_settings_from, ObservabilityConfig, PersistenceConfig, ScriptConfig,
    ServerConfig, SessionConfig, Settings, TelephonyConfig, TelephonyProvider,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
