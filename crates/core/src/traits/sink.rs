//! Summary sink trait

use crate::{CallSummary, Result};
use async_trait::async_trait;

/// Receives the terminal summary of every call
#[async_trait]
pub trait CallSummarySink: Send + Sync + 'static {
    async fn store(&self, summary: &CallSummary) -> Result<()>;

    /// Look up a stored summary. Write-only sinks keep the default.
    async fn fetch(&self, _call_id: &str) -> Result<Option<CallSummary>> {
        Ok(None)
    }

    fn name(&self) -> &str;
}
