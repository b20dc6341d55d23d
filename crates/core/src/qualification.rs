//! Qualification value types: signals, score tiers and decisions

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Motivation {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeline {
    Now,
    Later,
    #[default]
    Unknown,
}

/// Features extracted from one final utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Signals {
    pub motivation: Motivation,
    pub timeline: Timeline,
    pub objection: bool,
}

/// Lead quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualificationScore {
    High,
    Medium,
    Low,
}

impl QualificationScore {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualificationScore::High => "HIGH",
            QualificationScore::Medium => "MEDIUM",
            QualificationScore::Low => "LOW",
        }
    }
}

impl fmt::Display for QualificationScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the call proceeds after scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Continue,
    FollowUp,
    End,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Continue => "CONTINUE",
            Decision::FollowUp => "FOLLOW_UP",
            Decision::End => "END",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points awarded per rule, kept for logging and summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub equity_points: u32,
    pub motivation_points: u32,
    pub timeline_points: u32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.equity_points + self.motivation_points + self.timeline_points
    }
}

/// Result of running one final utterance through the qualification chain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Qualification {
    pub signals: Signals,
    pub breakdown: ScoreBreakdown,
    pub score: QualificationScore,
    pub decision: Decision,
}
