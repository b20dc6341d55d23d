//! Error types shared by every dialer crate

use crate::call::CallState;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A caller asked for a transition the state table does not allow.
    /// The session state is left untouched.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: CallState, to: CallState },

    #[error("invalid lead: {0}")]
    InvalidLead(String),

    /// The signaling provider rejected or failed to place the call
    #[error("provider error: {0}")]
    Provider(String),

    #[error("speech recognition error: {0}")]
    Recognizer(String),

    #[error("signal extraction error: {0}")]
    Signals(String),

    #[error("summary sink error: {0}")]
    Sink(String),

    #[error("call not found: {0}")]
    CallNotFound(String),

    #[error("capacity exceeded: {0}")]
    Capacity(String),
}

impl Error {
    /// True for errors that indicate a caller bug rather than a runtime fault
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::InvalidTransition { .. })
    }
}
