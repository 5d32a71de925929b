use std::sync::Arc;

use crate::auth::{Authenticator, JwtAuthenticator};
use crate::chat::membership::MembershipEngine;
use crate::db::DbPool;
use crate::fanout::FanoutRouter;
use crate::presence::PresenceTracker;
use crate::registry::ConnectionRegistry;
use crate::repo::sqlite::SqliteStore;
use crate::repo::{MessageRepository, UserDirectory};

/// Shared application state passed to all handlers via axum State extractor.
///
/// The registry and presence tracker are explicit owned state constructed
/// once at startup and injected everywhere — never ambient globals.
#[derive(Clone)]
pub struct AppState {
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Verifies connection credentials at upgrade time
    pub authenticator: Arc<dyn Authenticator>,
    /// Active WebSocket endpoint per user
    pub registry: Arc<ConnectionRegistry>,
    /// Users currently marked online (context-scoped)
    pub presence: Arc<PresenceTracker>,
    /// Event fan-out over the registry
    pub fanout: Arc<FanoutRouter>,
    /// Group membership state machine
    pub membership: Arc<MembershipEngine>,
    /// Durable message storage (fire-and-forget from the gateway)
    pub messages: Arc<dyn MessageRepository>,
    /// Display-name lookup
    pub users: Arc<dyn UserDirectory>,
}

impl AppState {
    /// Wire the full component graph over a database handle and JWT secret.
    pub fn new(db: DbPool, jwt_secret: Vec<u8>) -> Self {
        let store = Arc::new(SqliteStore::new(db));
        let registry = Arc::new(ConnectionRegistry::new());
        let presence = Arc::new(PresenceTracker::new());
        let fanout = Arc::new(FanoutRouter::new(registry.clone()));
        let membership = Arc::new(MembershipEngine::new(
            store.clone(),
            store.clone(),
            fanout.clone(),
        ));

        Self {
            authenticator: Arc::new(JwtAuthenticator::new(jwt_secret.clone())),
            jwt_secret,
            registry,
            presence,
            fanout,
            membership,
            messages: store.clone(),
            users: store,
        }
    }
}
