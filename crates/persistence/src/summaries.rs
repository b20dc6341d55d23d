//! Call summary stores
//!
//! `ScyllaSummaryStore` keeps every finished call in `call_summaries` and a
//! per-phone history in `calls_by_phone`. `InMemorySummaryStore` keeps them
//! in process for local runs and tests.

use crate::{schema, PersistenceError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use scylla::{Session, SessionBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use voice_dialer_config::PersistenceConfig;
use voice_dialer_core::{
    CallSummary, CallSummarySink, Decision, EndReason, Lead, QualificationScore, Signals,
    TranscriptEntry,
};

/// One line of a phone number's call history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallHistoryEntry {
    pub call_id: String,
    pub ended_at: DateTime<Utc>,
    pub score: Option<QualificationScore>,
    pub decision: Option<Decision>,
    pub end_reason: String,
}

impl From<&CallSummary> for CallHistoryEntry {
    fn from(summary: &CallSummary) -> Self {
        Self {
            call_id: summary.call_id.clone(),
            ended_at: summary.ended_at,
            score: summary.score,
            decision: summary.decision,
            end_reason: summary.end_reason.label().to_string(),
        }
    }
}

fn parse_score(value: &str) -> Option<QualificationScore> {
    match value {
        "HIGH" => Some(QualificationScore::High),
        "MEDIUM" => Some(QualificationScore::Medium),
        "LOW" => Some(QualificationScore::Low),
        _ => None,
    }
}

fn parse_decision(value: &str) -> Option<Decision> {
    match value {
        "CONTINUE" => Some(Decision::Continue),
        "FOLLOW_UP" => Some(Decision::FollowUp),
        "END" => Some(Decision::End),
        _ => None,
    }
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| PersistenceError::InvalidData(format!("timestamp out of range: {}", millis)))
}

/// `keyspace.table`, as every statement below addresses its table
fn qualified(keyspace: &str, table: &str) -> String {
    format!("{keyspace}.{table}")
}

/// Summary store backed by ScyllaDB
#[derive(Clone)]
pub struct ScyllaSummaryStore {
    session: Arc<Session>,
    keyspace: String,
}

impl ScyllaSummaryStore {
    /// Connect to the configured hosts and create the keyspace and tables
    /// if they are missing
    pub async fn connect(config: &PersistenceConfig) -> Result<Self, PersistenceError> {
        tracing::info!(
            hosts = ?config.scylla_hosts,
            keyspace = %config.keyspace,
            "Connecting summary store to ScyllaDB"
        );

        let session = SessionBuilder::new()
            .known_nodes(&config.scylla_hosts)
            .build()
            .await?;

        schema::create_keyspace(&session, &config.keyspace, config.replication_factor).await?;
        schema::create_tables(&session, &config.keyspace).await?;
        tracing::info!(keyspace = %config.keyspace, "Summary tables ready");

        Ok(Self {
            session: Arc::new(session),
            keyspace: config.keyspace.clone(),
        })
    }

    fn table(&self, name: &str) -> String {
        qualified(&self.keyspace, name)
    }

    pub async fn insert(&self, summary: &CallSummary) -> Result<(), PersistenceError> {
        let transcript_json = serde_json::to_string(&summary.transcript)?;
        let signals_json = summary.signals.map(|s| serde_json::to_string(&s)).transpose()?;
        let end_reason_json = serde_json::to_string(&summary.end_reason)?;
        let score = summary.score.map(|s| s.as_str());
        let decision = summary.decision.map(|d| d.as_str());
        let started_at = summary.started_at.timestamp_millis();
        let ended_at = summary.ended_at.timestamp_millis();

        let query = format!(
            "INSERT INTO {} (
                call_id, provider_call_id, lead_phone, lead_equity, lead_address,
                transcript_json, signals_json, score, decision, end_reason_json,
                failure_reason, started_at, ended_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.table("call_summaries")
        );

        self.session
            .query_unpaged(
                query,
                (
                    summary.call_id.as_str(),
                    summary.provider_call_id.as_deref(),
                    summary.lead.phone.as_str(),
                    summary.lead.equity,
                    summary.lead.address.as_deref(),
                    transcript_json,
                    signals_json,
                    score,
                    decision,
                    end_reason_json,
                    summary.failure_reason.as_deref(),
                    started_at,
                    ended_at,
                ),
            )
            .await?;

        let history_query = format!(
            "INSERT INTO {} (
                lead_phone, ended_at, call_id, score, decision, end_reason
            ) VALUES (?, ?, ?, ?, ?, ?)",
            self.table("calls_by_phone")
        );

        self.session
            .query_unpaged(
                history_query,
                (
                    summary.lead.phone.as_str(),
                    ended_at,
                    summary.call_id.as_str(),
                    score,
                    decision,
                    summary.end_reason.label(),
                ),
            )
            .await?;

        tracing::info!(
            call_id = %summary.call_id,
            end_reason = summary.end_reason.label(),
            "Call summary persisted to ScyllaDB"
        );

        Ok(())
    }

    pub async fn get(&self, call_id: &str) -> Result<Option<CallSummary>, PersistenceError> {
        let query = format!(
            "SELECT call_id, provider_call_id, lead_phone, lead_equity, lead_address,
                    transcript_json, signals_json, score, decision, end_reason_json,
                    failure_reason, started_at, ended_at
             FROM {} WHERE call_id = ?",
            self.table("call_summaries")
        );

        let result = self.session.query_unpaged(query, (call_id,)).await?;

        let Some(row) = result.rows.and_then(|rows| rows.into_iter().next()) else {
            return Ok(None);
        };

        let (
            call_id,
            provider_call_id,
            lead_phone,
            lead_equity,
            lead_address,
            transcript_json,
            signals_json,
            score,
            decision,
            end_reason_json,
            failure_reason,
            started_at,
            ended_at,
        ): (
            String,
            Option<String>,
            String,
            f64,
            Option<String>,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            String,
            Option<String>,
            i64,
            i64,
        ) = row
            .into_typed()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        let transcript: Vec<TranscriptEntry> = serde_json::from_str(&transcript_json)?;
        let signals: Option<Signals> = signals_json
            .map(|s| serde_json::from_str(&s))
            .transpose()?;
        let end_reason: EndReason = serde_json::from_str(&end_reason_json)?;

        Ok(Some(CallSummary {
            call_id,
            provider_call_id,
            lead: Lead {
                phone: lead_phone,
                equity: lead_equity,
                address: lead_address,
            },
            transcript,
            signals,
            score: score.as_deref().and_then(parse_score),
            decision: decision.as_deref().and_then(parse_decision),
            end_reason,
            failure_reason,
            started_at: timestamp(started_at)?,
            ended_at: timestamp(ended_at)?,
        }))
    }

    /// Most recent calls to a phone number
    pub async fn history_for_phone(
        &self,
        phone: &str,
        limit: i32,
    ) -> Result<Vec<CallHistoryEntry>, PersistenceError> {
        let query = format!(
            "SELECT call_id, ended_at, score, decision, end_reason
             FROM {} WHERE lead_phone = ? LIMIT ?",
            self.table("calls_by_phone")
        );

        let result = self
            .session
            .query_unpaged(query, (phone, limit))
            .await?;

        let mut entries = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                let (call_id, ended_at, score, decision, end_reason): (
                    String,
                    i64,
                    Option<String>,
                    Option<String>,
                    String,
                ) = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

                entries.push(CallHistoryEntry {
                    call_id,
                    ended_at: timestamp(ended_at)?,
                    score: score.as_deref().and_then(parse_score),
                    decision: decision.as_deref().and_then(parse_decision),
                    end_reason,
                });
            }
        }

        Ok(entries)
    }
}

#[async_trait]
impl CallSummarySink for ScyllaSummaryStore {
    async fn store(&self, summary: &CallSummary) -> voice_dialer_core::Result<()> {
        Ok(self.insert(summary).await?)
    }

    async fn fetch(&self, call_id: &str) -> voice_dialer_core::Result<Option<CallSummary>> {
        Ok(self.get(call_id).await?)
    }

    fn name(&self) -> &str {
        "scylla"
    }
}

/// Process-local summary store
#[derive(Default)]
pub struct InMemorySummaryStore {
    summaries: RwLock<Vec<CallSummary>>,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<CallSummary> {
        self.summaries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.summaries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.read().is_empty()
    }

    /// Most recent calls to a phone number, newest first
    pub fn history_for_phone(&self, phone: &str, limit: usize) -> Vec<CallHistoryEntry> {
        let mut entries: Vec<_> = self
            .summaries
            .read()
            .iter()
            .filter(|s| s.lead.phone == phone)
            .map(CallHistoryEntry::from)
            .collect();
        entries.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));
        entries.truncate(limit);
        entries
    }
}

#[async_trait]
impl CallSummarySink for InMemorySummaryStore {
    async fn store(&self, summary: &CallSummary) -> voice_dialer_core::Result<()> {
        let mut summaries = self.summaries.write();
        summaries.retain(|s| s.call_id != summary.call_id);
        summaries.push(summary.clone());
        tracing::debug!(call_id = %summary.call_id, "Call summary stored in memory");
        Ok(())
    }

    async fn fetch(&self, call_id: &str) -> voice_dialer_core::Result<Option<CallSummary>> {
        Ok(self
            .summaries
            .read()
            .iter()
            .find(|s| s.call_id == call_id)
            .cloned())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn summary(call_id: &str, phone: &str, minutes_ago: i64) -> CallSummary {
        let ended_at = Utc::now() - Duration::minutes(minutes_ago);
        CallSummary {
            call_id: call_id.to_string(),
            provider_call_id: Some(format!("CA{}", call_id)),
            lead: Lead {
                phone: phone.to_string(),
                equity: 55.0,
                address: None,
            },
            transcript: vec![TranscriptEntry::final_("I'm interested")],
            signals: Some(Signals::default()),
            score: Some(QualificationScore::High),
            decision: Some(Decision::Continue),
            end_reason: EndReason::Completed,
            failure_reason: None,
            started_at: ended_at - Duration::seconds(30),
            ended_at,
        }
    }

    #[tokio::test]
    async fn test_memory_store_and_fetch() {
        let store = InMemorySummaryStore::new();
        store.store(&summary("c1", "+15550000001", 0)).await.unwrap();

        let fetched = store.fetch("c1").await.unwrap().unwrap();
        assert_eq!(fetched.call_id, "c1");
        assert!(store.fetch("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_replaces_same_call() {
        let store = InMemorySummaryStore::new();
        store.store(&summary("c1", "+15550000001", 5)).await.unwrap();
        store.store(&summary("c1", "+15550000001", 0)).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let store = InMemorySummaryStore::new();
        store.store(&summary("old", "+15550000001", 60)).await.unwrap();
        store.store(&summary("new", "+15550000001", 1)).await.unwrap();
        store.store(&summary("other", "+15550000002", 0)).await.unwrap();

        let history = store.history_for_phone("+15550000001", 10);
        let ids: Vec<_> = history.iter().map(|e| e.call_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(history[0].end_reason, "completed");
        assert_eq!(store.history_for_phone("+15550000001", 1).len(), 1);
    }

    #[test]
    fn test_parse_stored_values() {
        for score in [
            QualificationScore::High,
            QualificationScore::Medium,
            QualificationScore::Low,
        ] {
            assert_eq!(parse_score(score.as_str()), Some(score));
        }
        for decision in [Decision::Continue, Decision::FollowUp, Decision::End] {
            assert_eq!(parse_decision(decision.as_str()), Some(decision));
        }
        assert_eq!(parse_score("bogus"), None);
    }

    #[test]
    fn test_statements_address_configured_keyspace() {
        let config = PersistenceConfig {
            keyspace: "dialer_test".to_string(),
            ..Default::default()
        };
        assert_eq!(
            qualified(&config.keyspace, "calls_by_phone"),
            "dialer_test.calls_by_phone"
        );
    }

    #[test]
    fn test_end_reason_json_shape() {
        let json = serde_json::to_string(&EndReason::ProviderFailure("busy".into())).unwrap();
        assert_eq!(json, r#"{"kind":"provider_failure","detail":"busy"}"#);
        let back: EndReason = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EndReason::ProviderFailure("busy".into()));
    }
}
