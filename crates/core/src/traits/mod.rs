//! Collaborator traits for the dialer
//!
//! Every external boundary is a trait so backends can be swapped by
//! configuration and replaced with mocks in tests.
//!
//! ```text
//! Telephony:
//!   - SignalingProvider: places the outbound call
//!
//! Speech:
//!   - SpeechRecognizer: per-connection audio -> partial/final text
//!   - RecognizerFactory: builds a recognizer for each media connection
//!
//! Qualification:
//!   - TextSignalExtractor: final utterance -> Signals
//!
//! Persistence:
//!   - CallSummarySink: receives terminal call summaries
//! ```

mod signals;
mod sink;
mod speech;
mod telephony;

pub use signals::TextSignalExtractor;
pub use sink::CallSummarySink;
pub use speech::{RecognizerContext, RecognizerFactory, SpeechEvent, SpeechRecognizer};
pub use telephony::{PlaceCallRequest, ProviderEvent, SignalingProvider};
