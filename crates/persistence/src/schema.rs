//! ScyllaDB schema creation

use crate::error::PersistenceError;
use scylla::Session;

/// Create the keyspace if it doesn't exist
pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create keyspace: {}", e)))?;

    Ok(())
}

/// Create all required tables
pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    // One row per finished call; timestamps are epoch millis
    let summaries_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.call_summaries (
            call_id TEXT,
            provider_call_id TEXT,
            lead_phone TEXT,
            lead_equity DOUBLE,
            lead_address TEXT,
            transcript_json TEXT,
            signals_json TEXT,
            score TEXT,
            decision TEXT,
            end_reason_json TEXT,
            failure_reason TEXT,
            started_at BIGINT,
            ended_at BIGINT,
            PRIMARY KEY (call_id)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(summaries_table, &[])
        .await
        .map_err(|e| {
            PersistenceError::SchemaError(format!("Failed to create call_summaries table: {}", e))
        })?;

    // Call history per phone number, newest first
    let by_phone_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.calls_by_phone (
            lead_phone TEXT,
            ended_at BIGINT,
            call_id TEXT,
            score TEXT,
            decision TEXT,
            end_reason TEXT,
            PRIMARY KEY ((lead_phone), ended_at, call_id)
        ) WITH CLUSTERING ORDER BY (ended_at DESC, call_id ASC)
    "#,
        keyspace
    );

    session
        .query_unpaged(by_phone_table, &[])
        .await
        .map_err(|e| {
            PersistenceError::SchemaError(format!("Failed to create calls_by_phone table: {}", e))
        })?;

    tracing::info!("All tables created successfully");
    Ok(())
}
