//! Lead qualification: utterance -> signals -> score -> decision
//!
//! Every stage is pure and synchronous, so a call session can run the whole
//! chain while holding its own lock.

mod decision;
mod scoring;
mod signals;

pub use decision::DecisionEngine;
pub use scoring::LeadScorer;
pub use signals::KeywordSignalExtractor;

use std::sync::Arc;
use voice_dialer_config::QualificationConfig;
use voice_dialer_core::{
    Qualification, QualificationScore, Result, ScoreBreakdown, Signals, TextSignalExtractor,
};

pub struct QualificationPipeline {
    extractor: Arc<dyn TextSignalExtractor>,
    scorer: LeadScorer,
    decisions: DecisionEngine,
}

impl QualificationPipeline {
    pub fn new(extractor: Arc<dyn TextSignalExtractor>, scorer: LeadScorer) -> Self {
        Self {
            extractor,
            scorer,
            decisions: DecisionEngine,
        }
    }

    /// Keyword extractor and scorer built from configuration
    pub fn from_config(config: &QualificationConfig) -> Self {
        Self::new(
            Arc::new(KeywordSignalExtractor::new(&config.vocabulary)),
            LeadScorer::new(config.scoring.clone()),
        )
    }

    pub fn evaluate(&self, equity: f64, text: &str) -> Result<Qualification> {
        let signals = self.extractor.extract(text)?;
        let (breakdown, score) = self.scorer.score(equity, &signals);
        let decision = self.decisions.decide(score);

        tracing::debug!(
            extractor = self.extractor.name(),
            ?signals,
            points = breakdown.total(),
            %score,
            %decision,
            "Qualified utterance"
        );

        Ok(Qualification {
            signals,
            breakdown,
            score,
            decision,
        })
    }

    /// Outcome recorded when no final utterance arrives in time
    pub fn timeout_outcome(&self) -> Qualification {
        let score = QualificationScore::Low;
        Qualification {
            signals: Signals::default(),
            breakdown: ScoreBreakdown::default(),
            score,
            decision: self.decisions.decide(score),
        }
    }
}

impl Default for QualificationPipeline {
    fn default() -> Self {
        Self::from_config(&QualificationConfig::default())
    }
}
