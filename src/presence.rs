//! Server-side presence tracking.
//!
//! Presence is context-scoped: a user is marked online when they explicitly
//! enter a chat context, not merely on connecting. Disconnect always forces
//! them offline, so nobody stays "online" without a live connection.

use dashmap::DashSet;

/// The set of user identities currently marked present.
pub struct PresenceTracker {
    online: DashSet<String>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            online: DashSet::new(),
        }
    }

    /// Idempotent set add.
    pub fn mark_online(&self, user_id: &str) {
        self.online.insert(user_id.to_string());
    }

    /// Idempotent set remove.
    pub fn mark_offline(&self, user_id: &str) {
        self.online.remove(user_id);
    }

    /// A stable enumeration of the online set at call time. This is a
    /// snapshot, not a live view — it does not reflect later changes.
    pub fn snapshot(&self) -> Vec<String> {
        let mut users: Vec<String> = self.online.iter().map(|entry| entry.clone()).collect();
        users.sort();
        users
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_online_and_offline_are_idempotent() {
        let presence = PresenceTracker::new();
        presence.mark_online("u1");
        presence.mark_online("u1");
        assert_eq!(presence.snapshot(), vec!["u1".to_string()]);

        presence.mark_offline("u1");
        presence.mark_offline("u1");
        assert!(presence.snapshot().is_empty());
    }

    #[test]
    fn snapshot_is_sorted_and_owned() {
        let presence = PresenceTracker::new();
        presence.mark_online("zoe");
        presence.mark_online("ann");
        presence.mark_online("mia");

        let snapshot = presence.snapshot();
        assert_eq!(snapshot, vec!["ann", "mia", "zoe"]);

        // Later mutations do not affect an already-taken snapshot
        presence.mark_offline("ann");
        assert_eq!(snapshot.len(), 3);
    }
}
