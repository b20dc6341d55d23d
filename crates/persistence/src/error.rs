//! Persistence errors

use scylla::transport::errors::{NewSessionError, QueryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Connection error: {0}")]
    Connection(#[from] NewSessionError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PersistenceError> for voice_dialer_core::Error {
    fn from(err: PersistenceError) -> Self {
        voice_dialer_core::Error::Sink(err.to_string())
    }
}
