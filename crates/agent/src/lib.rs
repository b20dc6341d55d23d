//! Outbound call engine
//!
//! Features:
//! - Call session state machine with a static transition table
//! - Keyword signal extraction, additive lead scoring and decision routing
//! - Media stream routing by per-connection correlation tokens
//! - Answer, analysis and follow-up timers per session
//! - Orchestrator facade with background summary persistence

pub mod call_session;
pub mod orchestrator;
pub mod qualification;
pub mod registry;
pub mod router;
pub mod supervisor;

pub use call_session::{CallSession, CallSnapshot, SessionContext};
pub use orchestrator::{CallOrchestrator, OrchestratorOptions};
pub use qualification::{
    DecisionEngine, KeywordSignalExtractor, LeadScorer, QualificationPipeline,
};
pub use registry::CallRegistry;
pub use router::{ConnectionStats, MediaConnection, MediaStreamRouter};
pub use supervisor::{spawn_supervisor, SessionTimeouts};
