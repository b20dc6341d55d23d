//! Score to decision mapping

use voice_dialer_core::{Decision, QualificationScore};

#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn decide(&self, score: QualificationScore) -> Decision {
        match score {
            QualificationScore::High => Decision::Continue,
            QualificationScore::Medium => Decision::FollowUp,
            QualificationScore::Low => Decision::End,
        }
    }
}
