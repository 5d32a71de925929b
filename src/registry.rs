use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Connection registry: maps each user to their currently active delivery
/// endpoint. One active session per user: registering a new endpoint for a
/// user replaces the previous one (last writer wins).
pub struct ConnectionRegistry {
    inner: DashMap<String, ConnectionSender>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Record `endpoint` as the live connection for `user_id`, overwriting
    /// any existing mapping. Idempotent; no error condition.
    pub fn register(&self, user_id: &str, endpoint: ConnectionSender) {
        self.inner.insert(user_id.to_string(), endpoint);
        tracing::debug!(user_id = %user_id, "Connection registered");
    }

    /// Remove the mapping for `user_id`, but only while it still refers to
    /// `endpoint`. A stale disconnect from a superseded connection must not
    /// tear down the newer one. Returns whether an entry was removed.
    pub fn unregister(&self, user_id: &str, endpoint: &ConnectionSender) -> bool {
        let removed = self
            .inner
            .remove_if(user_id, |_, current| current.same_channel(endpoint))
            .is_some();
        if removed {
            tracing::debug!(user_id = %user_id, "Connection unregistered");
        }
        removed
    }

    /// Resolve each identity that currently has a live endpoint. Identities
    /// without one are silently skipped — an unconnected user is simply not
    /// delivered to. The order of the returned list is unspecified.
    pub fn resolve(&self, user_ids: &[String]) -> Vec<ConnectionSender> {
        user_ids
            .iter()
            .filter_map(|id| self.inner.get(id).map(|entry| entry.value().clone()))
            .collect()
    }

    /// Every currently registered endpoint, for process-wide broadcasts.
    pub fn all(&self) -> Vec<ConnectionSender> {
        self.inner
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn is_registered(&self, user_id: &str) -> bool {
        self.inner.contains_key(user_id)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
