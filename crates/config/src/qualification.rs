//! Signal vocabularies and lead scoring rules

use serde::{Deserialize, Serialize};

use crate::constants::{scoring, vocabulary};
use crate::ConfigError;

fn to_strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// Keyword lists used by the rule-based signal extractor.
///
/// Entries may be single words or multi-word phrases, matched as
/// case-insensitive substrings. Refusal terms no longer than
/// `whole_word_max_len` must stand alone as a word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyConfig {
    #[serde(default = "default_interest")]
    pub interest: Vec<String>,
    #[serde(default = "default_hedging")]
    pub hedging: Vec<String>,
    #[serde(default = "default_immediacy")]
    pub immediacy: Vec<String>,
    #[serde(default = "default_deferral")]
    pub deferral: Vec<String>,
    #[serde(default = "default_refusal")]
    pub refusal: Vec<String>,
    #[serde(default = "default_whole_word_max_len")]
    pub whole_word_max_len: usize,
}

fn default_interest() -> Vec<String> {
    to_strings(vocabulary::INTEREST)
}
fn default_hedging() -> Vec<String> {
    to_strings(vocabulary::HEDGING)
}
fn default_immediacy() -> Vec<String> {
    to_strings(vocabulary::IMMEDIACY)
}
fn default_deferral() -> Vec<String> {
    to_strings(vocabulary::DEFERRAL)
}
fn default_refusal() -> Vec<String> {
    to_strings(vocabulary::REFUSAL)
}
fn default_whole_word_max_len() -> usize {
    vocabulary::WHOLE_WORD_MAX_LEN
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            interest: default_interest(),
            hedging: default_hedging(),
            immediacy: default_immediacy(),
            deferral: default_deferral(),
            refusal: default_refusal(),
            whole_word_max_len: default_whole_word_max_len(),
        }
    }
}

/// Points and tier thresholds for the lead scorer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRulesConfig {
    /// Equity must be strictly greater than this to earn points
    #[serde(default = "default_equity_threshold")]
    pub equity_threshold: f64,
    #[serde(default = "default_equity_points")]
    pub equity_points: u32,
    #[serde(default = "default_motivation_points")]
    pub high_motivation_points: u32,
    #[serde(default = "default_timeline_points")]
    pub immediate_timeline_points: u32,
    #[serde(default = "default_high_tier")]
    pub high_tier_min: u32,
    #[serde(default = "default_medium_tier")]
    pub medium_tier_min: u32,
}

fn default_equity_threshold() -> f64 {
    scoring::EQUITY_THRESHOLD
}
fn default_equity_points() -> u32 {
    scoring::EQUITY_POINTS
}
fn default_motivation_points() -> u32 {
    scoring::HIGH_MOTIVATION_POINTS
}
fn default_timeline_points() -> u32 {
    scoring::IMMEDIATE_TIMELINE_POINTS
}
fn default_high_tier() -> u32 {
    scoring::HIGH_TIER_MIN
}
fn default_medium_tier() -> u32 {
    scoring::MEDIUM_TIER_MIN
}

impl Default for ScoringRulesConfig {
    fn default() -> Self {
        Self {
            equity_threshold: default_equity_threshold(),
            equity_points: default_equity_points(),
            high_motivation_points: default_motivation_points(),
            immediate_timeline_points: default_timeline_points(),
            high_tier_min: default_high_tier(),
            medium_tier_min: default_medium_tier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QualificationConfig {
    #[serde(default)]
    pub vocabulary: VocabularyConfig,
    #[serde(default)]
    pub scoring: ScoringRulesConfig,
}

impl QualificationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let v = &self.vocabulary;
        for (field, words) in [
            ("qualification.vocabulary.interest", &v.interest),
            ("qualification.vocabulary.hedging", &v.hedging),
            ("qualification.vocabulary.immediacy", &v.immediacy),
            ("qualification.vocabulary.deferral", &v.deferral),
            ("qualification.vocabulary.refusal", &v.refusal),
        ] {
            if words.iter().all(|w| w.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Vocabulary needs at least one term".to_string(),
                });
            }
        }

        let s = &self.scoring;
        if !s.equity_threshold.is_finite() || s.equity_threshold < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "qualification.scoring.equity_threshold".to_string(),
                message: format!("Must be a non-negative number, got {}", s.equity_threshold),
            });
        }

        if s.medium_tier_min == 0 || s.medium_tier_min >= s.high_tier_min {
            return Err(ConfigError::InvalidValue {
                field: "qualification.scoring.high_tier_min".to_string(),
                message: format!(
                    "Tier thresholds must satisfy 0 < medium ({}) < high ({})",
                    s.medium_tier_min, s.high_tier_min
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = QualificationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scoring.high_tier_min, 6);
        assert!(config.vocabulary.refusal.contains(&"not interested".to_string()));
    }

    #[test]
    fn test_tier_order_enforced() {
        let mut config = QualificationConfig::default();
        config.scoring.medium_tier_min = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_vocabulary_rejected() {
        let mut config = QualificationConfig::default();
        config.vocabulary.immediacy = vec![" ".to_string()];
        assert!(config.validate().is_err());
    }
}
