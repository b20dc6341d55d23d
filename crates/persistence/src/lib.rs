//! Call summary persistence for the voice dialer
//!
//! Provides `CallSummarySink` implementations:
//! - In-memory store (default, local runs and tests)
//! - ScyllaDB store with per-phone call history

pub mod error;
pub mod schema;
pub mod summaries;

pub use error::PersistenceError;
pub use summaries::{CallHistoryEntry, InMemorySummaryStore, ScyllaSummaryStore};

use std::sync::Arc;
use voice_dialer_config::PersistenceConfig;
use voice_dialer_core::CallSummarySink;

/// Build the summary sink selected by configuration
pub async fn create_summary_sink(
    config: &PersistenceConfig,
) -> Result<Arc<dyn CallSummarySink>, PersistenceError> {
    if !config.enabled {
        tracing::info!("Persistence disabled, keeping call summaries in memory");
        return Ok(Arc::new(InMemorySummaryStore::new()));
    }

    Ok(Arc::new(ScyllaSummaryStore::connect(config).await?))
}
