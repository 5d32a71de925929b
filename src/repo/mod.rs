//! Storage collaborator interfaces.
//!
//! The real-time core never talks to SQLite directly — group persistence,
//! message persistence, and display-name lookup go through these seams so
//! the membership engine and gateway stay testable against in-memory fakes.

pub mod sqlite;

use async_trait::async_trait;

use crate::chat::group::ChatGroup;
use crate::error::ChatResult;

/// A message as handed to durable storage. The ephemeral wire representation
/// (client-facing id, sender display name) is built separately by the gateway.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub chat_id: String,
    pub sender: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn load(&self, id: &str) -> ChatResult<ChatGroup>;

    /// Persist the group atomically — a failed save leaves the stored member
    /// list exactly as it was; no partial mutation is ever observable.
    async fn save(&self, group: &ChatGroup) -> ChatResult<()>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn save(&self, message: StoredMessage) -> ChatResult<()>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve display names for the given ids. Unknown ids are simply
    /// absent from the result.
    async fn lookup(&self, ids: &[String]) -> ChatResult<Vec<UserProfile>>;
}
