//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{scripts, telephony, timeouts};
use crate::{ConfigError, MediaConfig, QualificationConfig};

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Telephony provider configuration
    #[serde(default)]
    pub telephony: TelephonyConfig,

    /// Call session timers and limits
    #[serde(default)]
    pub session: SessionConfig,

    /// Spoken script lines
    #[serde(default)]
    pub scripts: ScriptConfig,

    /// Signal vocabularies and scoring rules
    #[serde(default)]
    pub qualification: QualificationConfig,

    /// Speech recognition for media streams
    #[serde(default)]
    pub media: MediaConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Call summary persistence (ScyllaDB)
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Persistence configuration for ScyllaDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Enable ScyllaDB persistence (false = in-memory only)
    #[serde(default)]
    pub enabled: bool,

    /// ScyllaDB host addresses
    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,

    /// ScyllaDB keyspace name
    #[serde(default = "default_scylla_keyspace")]
    pub keyspace: String,

    /// ScyllaDB replication factor
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
}

fn default_scylla_hosts() -> Vec<String> {
    std::env::var("SCYLLA_HOSTS")
        .map(|s| s.split(',').map(|h| h.trim().to_string()).collect())
        .unwrap_or_else(|_| vec!["127.0.0.1:9042".to_string()])
}

fn default_scylla_keyspace() -> String {
    std::env::var("SCYLLA_KEYSPACE").unwrap_or_else(|_| "voice_dialer".to_string())
}

fn default_replication_factor() -> u8 {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_scylla_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_telephony()?;
        self.validate_session()?;
        self.validate_scripts()?;
        self.qualification.validate()?;
        self.media.validate()?;
        self.validate_persistence()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        let base = &self.server.public_base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "server.public_base_url".to_string(),
                message: format!("Must be an http(s) URL, got '{}'", base),
            });
        }

        Ok(())
    }

    fn validate_telephony(&self) -> Result<(), ConfigError> {
        let t = &self.telephony;
        if t.provider == TelephonyProvider::Twilio {
            for (field, value) in [
                ("telephony.account_sid", &t.account_sid),
                ("telephony.auth_token", &t.auth_token),
                ("telephony.from_number", &t.from_number),
            ] {
                if value.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::MissingField(format!(
                        "{} is required for the twilio provider",
                        field
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_session(&self) -> Result<(), ConfigError> {
        let s = &self.session;
        for (field, value) in [
            ("session.answer_timeout_secs", s.answer_timeout_secs),
            ("session.analysis_timeout_secs", s.analysis_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Timeout must be at least 1 second".to_string(),
                });
            }
        }

        if s.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.event_capacity".to_string(),
                message: "Event channel capacity must be positive".to_string(),
            });
        }

        if s.max_concurrent_calls == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.max_concurrent_calls".to_string(),
                message: "At least one concurrent call is required".to_string(),
            });
        }

        Ok(())
    }

    fn validate_scripts(&self) -> Result<(), ConfigError> {
        let s = &self.scripts;
        for (field, line) in [
            ("scripts.opening", &s.opening),
            ("scripts.continue_line", &s.continue_line),
            ("scripts.follow_up", &s.follow_up),
            ("scripts.closing", &s.closing),
        ] {
            if line.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Script line cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_persistence(&self) -> Result<(), ConfigError> {
        if self.persistence.enabled && self.persistence.scylla_hosts.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "persistence.scylla_hosts".to_string(),
                message: "At least one host is required when persistence is enabled".to_string(),
            });
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL, used to build webhook and stream URLs
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: default_public_base_url(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    fn join(&self, path: &str) -> String {
        format!("{}{}", self.public_base_url.trim_end_matches('/'), path)
    }

    /// Webhook the provider fetches when the callee answers
    pub fn answer_webhook_url(&self) -> String {
        self.join(telephony::ANSWER_WEBHOOK_PATH)
    }

    pub fn status_webhook_url(&self) -> String {
        self.join(telephony::STATUS_WEBHOOK_PATH)
    }

    /// WebSocket URL for the media stream (`wss://` for an https base)
    pub fn media_stream_url(&self) -> String {
        let url = self.join(telephony::MEDIA_STREAM_PATH);
        if let Some(rest) = url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            url
        }
    }
}

/// Which signaling provider places calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TelephonyProvider {
    /// In-process provider that answers after a delay
    #[default]
    Simulated,
    Twilio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    #[serde(default)]
    pub provider: TelephonyProvider,

    #[serde(default)]
    pub account_sid: Option<String>,

    #[serde(default)]
    pub auth_token: Option<String>,

    /// Caller id for outbound calls (E.164)
    #[serde(default)]
    pub from_number: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base_url: String,

    /// Played while the media stream attaches
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Delay before the simulated provider reports an answer
    #[serde(default = "default_simulated_answer_delay_ms")]
    pub simulated_answer_delay_ms: u64,

    /// Make the simulated provider reject every dial attempt
    #[serde(default)]
    pub simulated_dial_failure: bool,
}

fn default_api_base() -> String {
    telephony::TWILIO_API_BASE.to_string()
}

fn default_greeting() -> String {
    scripts::GREETING.to_string()
}

fn default_simulated_answer_delay_ms() -> u64 {
    timeouts::SIMULATED_ANSWER_DELAY_MS
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            provider: TelephonyProvider::default(),
            account_sid: None,
            auth_token: None,
            from_number: None,
            api_base_url: default_api_base(),
            greeting: default_greeting(),
            simulated_answer_delay_ms: default_simulated_answer_delay_ms(),
            simulated_dial_failure: false,
        }
    }
}

/// Call session timers and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// CONNECTING longer than this ends the call
    #[serde(default = "default_answer_timeout")]
    pub answer_timeout_secs: u64,

    /// ANALYZING without a final utterance for this long scores the lead LOW
    #[serde(default = "default_analysis_timeout")]
    pub analysis_timeout_secs: u64,

    /// How long a FOLLOW_UP session is held before it is wrapped up
    #[serde(default = "default_follow_up_hold")]
    pub follow_up_hold_ms: u64,

    /// Per-session event channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
}

fn default_answer_timeout() -> u64 {
    timeouts::ANSWER_SECS
}

fn default_analysis_timeout() -> u64 {
    timeouts::ANALYSIS_SECS
}

fn default_follow_up_hold() -> u64 {
    timeouts::FOLLOW_UP_HOLD_MS
}

fn default_event_capacity() -> usize {
    100
}

fn default_max_concurrent_calls() -> usize {
    100
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            answer_timeout_secs: default_answer_timeout(),
            analysis_timeout_secs: default_analysis_timeout(),
            follow_up_hold_ms: default_follow_up_hold(),
            event_capacity: default_event_capacity(),
            max_concurrent_calls: default_max_concurrent_calls(),
        }
    }
}

/// Spoken script lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    #[serde(default = "default_opening")]
    pub opening: String,

    /// Spoken on a CONTINUE decision
    #[serde(default = "default_continue_line")]
    pub continue_line: String,

    #[serde(default = "default_follow_up")]
    pub follow_up: String,

    #[serde(default = "default_closing")]
    pub closing: String,
}

fn default_opening() -> String {
    scripts::OPENING.to_string()
}

fn default_continue_line() -> String {
    scripts::CONTINUE.to_string()
}

fn default_follow_up() -> String {
    scripts::FOLLOW_UP.to_string()
}

fn default_closing() -> String {
    scripts::CLOSING.to_string()
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            opening: default_opening(),
            continue_line: default_continue_line(),
            follow_up: default_follow_up(),
            closing: default_closing(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Enable the Prometheus endpoint
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from files and environment
///
/// Sources, later overriding earlier:
/// 1. `config/default.{yaml,toml,json}`
/// 2. `config/{env}.{yaml,toml,json}`
/// 3. `VOICE_DIALER__SECTION__FIELD` environment variables
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from("config", env)
}

/// Same as [`load_settings`] with an explicit config directory
pub fn load_settings_from(dir: &str, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name(&format!("{}/default", dir)).required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("{}/{}", dir, env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICE_DIALER")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
