//! Live call sessions and their correlation tokens

use crate::call_session::CallSession;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use voice_dialer_core::{Error, Result};

/// Sessions by call id, plus the tokens a media stream or provider callback
/// may use to refer to them (provider call id, our own call id)
pub struct CallRegistry {
    sessions: RwLock<HashMap<String, Arc<CallSession>>>,
    correlation: RwLock<HashMap<String, String>>,
    max_sessions: usize,
}

impl CallRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            correlation: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    pub fn insert(&self, session: Arc<CallSession>) -> Result<()> {
        let mut sessions = self.sessions.write();
        if sessions.len() >= self.max_sessions {
            return Err(Error::Capacity(format!(
                "{} concurrent calls already active",
                sessions.len()
            )));
        }
        sessions.insert(session.call_id().to_string(), session);
        Ok(())
    }

    /// Map an external token to a call id
    pub fn bind_correlation(&self, token: impl Into<String>, call_id: &str) {
        let token = token.into();
        tracing::debug!(call_id, token = %token, "Correlation token bound");
        self.correlation.write().insert(token, call_id.to_string());
    }

    /// Find a session by correlation token, provider call id or call id
    pub fn resolve(&self, token: &str) -> Option<Arc<CallSession>> {
        let call_id = self.correlation.read().get(token).cloned();
        let sessions = self.sessions.read();
        if let Some(session) = call_id.and_then(|id| sessions.get(&id).cloned()) {
            return Some(session);
        }
        if let Some(session) = sessions.get(token) {
            return Some(session.clone());
        }
        // The provider may report on a call before its id was bound
        sessions
            .values()
            .find(|s| s.provider_call_id().as_deref() == Some(token))
            .cloned()
    }

    pub fn get(&self, call_id: &str) -> Option<Arc<CallSession>> {
        self.sessions.read().get(call_id).cloned()
    }

    /// Drop a session and every token pointing at it
    pub fn remove(&self, call_id: &str) -> Option<Arc<CallSession>> {
        let removed = self.sessions.write().remove(call_id);
        self.correlation.write().retain(|_, id| id != call_id);
        removed
    }

    pub fn list(&self) -> Vec<Arc<CallSession>> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for CallRegistry {
    fn default() -> Self {
        Self::new(100)
    }
}
