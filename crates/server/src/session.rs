//! Call Registry
//!
//! Keyed lookup from WebSocket connection to the call it carries. The
//! session itself is owned by the connection task; the registry only holds
//! what the HTTP endpoints report and enforces the concurrent call limit.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::ServerError;

/// Snapshot of one connected call
#[derive(Debug, Clone, Serialize)]
pub struct CallInfo {
    pub connection_id: String,
    /// Set once the provider's `start` event arrives
    pub call_id: Option<String>,
    pub stream_id: Option<String>,
    pub connected_at: DateTime<Utc>,
}

pub struct CallRegistry {
    calls: RwLock<HashMap<String, CallInfo>>,
    max_calls: usize,
}

impl CallRegistry {
    pub fn new(max_calls: usize) -> Self {
        Self {
            calls: RwLock::new(HashMap::new()),
            max_calls,
        }
    }

    /// Reserve a slot for a new connection and return its id
    pub fn register(&self) -> Result<String, ServerError> {
        let mut calls = self.calls.write();
        if calls.len() >= self.max_calls {
            return Err(ServerError::CapacityExceeded(calls.len()));
        }

        let connection_id = uuid::Uuid::new_v4().to_string();
        calls.insert(
            connection_id.clone(),
            CallInfo {
                connection_id: connection_id.clone(),
                call_id: None,
                stream_id: None,
                connected_at: Utc::now(),
            },
        );

        tracing::debug!(connection_id = %connection_id, active = calls.len(), "Registered connection");
        Ok(connection_id)
    }

    /// Record the identifiers from the `start` event. They are set once.
    pub fn attach(&self, connection_id: &str, call_id: &str, stream_id: &str) {
        let mut calls = self.calls.write();
        match calls.get_mut(connection_id) {
            Some(info) if info.call_id.is_none() => {
                info.call_id = Some(call_id.to_string());
                info.stream_id = Some(stream_id.to_string());
            }
            Some(_) => {
                tracing::warn!(connection_id, call_id, "Connection already carries a call");
            }
            None => {
                tracing::warn!(connection_id, "Attach for unknown connection");
            }
        }
    }

    pub fn get(&self, connection_id: &str) -> Option<CallInfo> {
        self.calls.read().get(connection_id).cloned()
    }

    pub fn remove(&self, connection_id: &str) -> Option<CallInfo> {
        let removed = self.calls.write().remove(connection_id);
        if let Some(info) = &removed {
            tracing::info!(
                connection_id,
                call_id = info.call_id.as_deref().unwrap_or("-"),
                duration_secs = (Utc::now() - info.connected_at).num_seconds(),
                "Removed call"
            );
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.calls.read().len()
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn is_full(&self) -> bool {
        self.count() >= self.max_calls
    }

    /// Calls ordered by connection time
    pub fn list(&self) -> Vec<CallInfo> {
        let mut calls: Vec<_> = self.calls.read().values().cloned().collect();
        calls.sort_by_key(|info| info.connected_at);
        calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_remove() {
        let registry = CallRegistry::new(4);
        let id = registry.register().unwrap();

        assert_eq!(registry.count(), 1);
        assert!(registry.get(&id).unwrap().call_id.is_none());

        assert!(registry.remove(&id).is_some());
        assert!(registry.get(&id).is_none());
        assert!(registry.remove(&id).is_none());
    }

    #[test]
    fn test_capacity_is_enforced() {
        let registry = CallRegistry::new(2);
        let first = registry.register().unwrap();
        registry.register().unwrap();

        assert!(registry.is_full());
        assert!(matches!(
            registry.register(),
            Err(ServerError::CapacityExceeded(2))
        ));

        registry.remove(&first);
        assert!(registry.register().is_ok());
    }

    #[test]
    fn test_identifiers_are_set_once() {
        let registry = CallRegistry::new(2);
        let id = registry.register().unwrap();

        registry.attach(&id, "call-1", "stream-1");
        registry.attach(&id, "call-2", "stream-2");

        let info = registry.get(&id).unwrap();
        assert_eq!(info.call_id.as_deref(), Some("call-1"));
        assert_eq!(info.stream_id.as_deref(), Some("stream-1"));
    }

    #[test]
    fn test_list_serializes() {
        let registry = CallRegistry::new(2);
        let id = registry.register().unwrap();
        registry.attach(&id, "call-1", "stream-1");

        let json = serde_json::to_value(registry.list()).unwrap();
        assert_eq!(json[0]["call_id"], "call-1");
        assert_eq!(json[0]["connection_id"], id.as_str());
    }
}
