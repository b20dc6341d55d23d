//! Lead scoring
//!
//! Additive points from equity, motivation and timeline, mapped to a tier
//! by config-driven thresholds. Objections are reported but do not score.

use voice_dialer_config::ScoringRulesConfig;
use voice_dialer_core::{Motivation, QualificationScore, ScoreBreakdown, Signals, Timeline};

#[derive(Debug, Clone, Default)]
pub struct LeadScorer {
    rules: ScoringRulesConfig,
}

impl LeadScorer {
    pub fn new(rules: ScoringRulesConfig) -> Self {
        Self { rules }
    }

    pub fn breakdown(&self, equity: f64, signals: &Signals) -> ScoreBreakdown {
        let r = &self.rules;
        ScoreBreakdown {
            equity_points: if equity > r.equity_threshold {
                r.equity_points
            } else {
                0
            },
            motivation_points: if signals.motivation == Motivation::High {
                r.high_motivation_points
            } else {
                0
            },
            timeline_points: if signals.timeline == Timeline::Now {
                r.immediate_timeline_points
            } else {
                0
            },
        }
    }

    /// Map a point total to a tier
    pub fn tier(&self, total: u32) -> QualificationScore {
        if total >= self.rules.high_tier_min {
            QualificationScore::High
        } else if total >= self.rules.medium_tier_min {
            QualificationScore::Medium
        } else {
            QualificationScore::Low
        }
    }

    pub fn score(&self, equity: f64, signals: &Signals) -> (ScoreBreakdown, QualificationScore) {
        let breakdown = self.breakdown(equity, signals);
        (breakdown, self.tier(breakdown.total()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(motivation: Motivation, timeline: Timeline) -> Signals {
        Signals {
            motivation,
            timeline,
            objection: false,
        }
    }

    #[test]
    fn test_tier_boundaries() {
        let scorer = LeadScorer::default();
        assert_eq!(scorer.tier(0), QualificationScore::Low);
        assert_eq!(scorer.tier(2), QualificationScore::Low);
        assert_eq!(scorer.tier(3), QualificationScore::Medium);
        assert_eq!(scorer.tier(5), QualificationScore::Medium);
        assert_eq!(scorer.tier(6), QualificationScore::High);
        assert_eq!(scorer.tier(8), QualificationScore::High);
    }

    #[test]
    fn test_full_score() {
        let scorer = LeadScorer::default();
        let (breakdown, score) = scorer.score(55.0, &signals(Motivation::High, Timeline::Now));
        assert_eq!(breakdown.total(), 8);
        assert_eq!(score, QualificationScore::High);
    }

    #[test]
    fn test_equity_threshold_is_strict() {
        let scorer = LeadScorer::default();
        let at = scorer.breakdown(40.0, &Signals::default());
        let above = scorer.breakdown(40.01, &Signals::default());
        assert_eq!(at.equity_points, 0);
        assert_eq!(above.equity_points, 3);
    }

    #[test]
    fn test_medium_motivation_earns_nothing() {
        let scorer = LeadScorer::default();
        let (breakdown, score) = scorer.score(30.0, &signals(Motivation::Medium, Timeline::Later));
        assert_eq!(breakdown.total(), 0);
        assert_eq!(score, QualificationScore::Low);
    }

    #[test]
    fn test_objection_does_not_change_points() {
        let scorer = LeadScorer::default();
        let mut s = signals(Motivation::Low, Timeline::Unknown);
        let without = scorer.breakdown(80.0, &s);
        s.objection = true;
        assert_eq!(scorer.breakdown(80.0, &s), without);
    }

    #[test]
    fn test_timeline_alone() {
        let scorer = LeadScorer::default();
        let (breakdown, score) = scorer.score(10.0, &signals(Motivation::Low, Timeline::Now));
        assert_eq!(breakdown.timeline_points, 2);
        assert_eq!(score, QualificationScore::Low);
    }
}
