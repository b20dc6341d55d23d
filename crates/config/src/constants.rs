//! Centralized defaults for the dialer
//!
//! Script lines, vocabularies and scoring rules live here so the config
//! defaults and the tests agree on one set of values.

/// Spoken lines for each step of the call
pub mod scripts {
    pub const OPENING: &str = "Got it. Let me explain why I called.";
    pub const CONTINUE: &str = "Got it. Let me explain why I called.";
    pub const FOLLOW_UP: &str = "I'll send you a quick text.";
    pub const CLOSING: &str = "Thanks for your time.";
    /// Played by the answer webhook while the media stream attaches
    pub const GREETING: &str = "Connecting you now.";
}

/// Keyword vocabularies for signal extraction
pub mod vocabulary {
    pub const INTEREST: &[&str] = &["interested", "sell", "motivated"];
    pub const HEDGING: &[&str] = &["maybe", "later"];
    pub const IMMEDIACY: &[&str] = &["now", "this week"];
    pub const DEFERRAL: &[&str] = &["later", "next month"];
    pub const REFUSAL: &[&str] = &["no", "not interested", "busy"];
    /// Refusal terms this short only count as whole words ("no" is not "now")
    pub const WHOLE_WORD_MAX_LEN: usize = 2;
}

/// Lead scoring rules
pub mod scoring {
    /// Equity percentage that must be exceeded (strictly) to earn points
    pub const EQUITY_THRESHOLD: f64 = 40.0;
    pub const EQUITY_POINTS: u32 = 3;
    pub const HIGH_MOTIVATION_POINTS: u32 = 3;
    pub const IMMEDIATE_TIMELINE_POINTS: u32 = 2;
    /// Minimum total for a HIGH score
    pub const HIGH_TIER_MIN: u32 = 6;
    /// Minimum total for a MEDIUM score
    pub const MEDIUM_TIER_MIN: u32 = 3;
}

/// Session timers
pub mod timeouts {
    pub const ANSWER_SECS: u64 = 30;
    pub const ANALYSIS_SECS: u64 = 20;
    pub const FOLLOW_UP_HOLD_MS: u64 = 1000;
    pub const SIMULATED_ANSWER_DELAY_MS: u64 = 1000;
}

/// Speech recognition defaults
pub mod speech {
    pub const SCRIPTED_PARTIAL: &str = "Yes";
    pub const SCRIPTED_FINAL: &str = "Yes, I am interested and my timeline is now.";
    /// 20ms telephony frames: 25 frames = 0.5s, 50 frames = 1s
    pub const SCRIPTED_PARTIAL_AFTER_FRAMES: u64 = 25;
    pub const SCRIPTED_FINAL_AFTER_FRAMES: u64 = 50;

    pub const STT_URL: &str = "http://127.0.0.1:8090";
    pub const STT_TIMEOUT_MS: u64 = 5000;
    pub const SPEECH_THRESHOLD_DB: f32 = -35.0;
    pub const END_OF_UTTERANCE_SILENCE_MS: u64 = 700;
    pub const PARTIAL_INTERVAL_MS: u64 = 1000;
    pub const MIN_UTTERANCE_MS: u64 = 300;
    pub const MAX_UTTERANCE_SECS: u64 = 30;
}

/// Telephony provider defaults
pub mod telephony {
    pub const TWILIO_API_BASE: &str = "https://api.twilio.com";
    pub const MEDIA_STREAM_PATH: &str = "/ws/media";
    pub const ANSWER_WEBHOOK_PATH: &str = "/twilio/voice";
    pub const STATUS_WEBHOOK_PATH: &str = "/twilio/status";
}
