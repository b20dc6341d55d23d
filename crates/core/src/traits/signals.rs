//! Signal extraction trait

use crate::{Result, Signals};

/// Turns a final utterance into qualification signals.
///
/// Must be total: every input yields either `Signals` or a typed error.
/// The keyword extractor is the default; a model-backed extractor can be
/// dropped in behind the same trait.
pub trait TextSignalExtractor: Send + Sync + 'static {
    fn extract(&self, text: &str) -> Result<Signals>;

    fn name(&self) -> &str;
}
