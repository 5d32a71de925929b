//! SQLite-backed implementations of the storage collaborators.
//!
//! rusqlite is synchronous, so every call goes through
//! tokio::task::spawn_blocking against the shared connection.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::chat::group::ChatGroup;
use crate::db::DbPool;
use crate::error::{ChatError, ChatResult};
use crate::repo::{GroupRepository, MessageRepository, StoredMessage, UserDirectory, UserProfile};

pub struct SqliteStore {
    db: DbPool,
}

impl SqliteStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

fn lock_err() -> ChatError {
    ChatError::storage("database lock poisoned")
}

fn join_err(err: tokio::task::JoinError) -> ChatError {
    ChatError::storage(format!("blocking task failed: {}", err))
}

#[async_trait]
impl GroupRepository for SqliteStore {
    async fn load(&self, id: &str) -> ChatResult<ChatGroup> {
        let db = self.db.clone();
        let id = id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;

            let row = conn
                .query_row(
                    "SELECT name, group_chat, creator FROM chats WHERE id = ?1",
                    [&id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, bool>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;

            let (name, group_chat, creator) =
                row.ok_or_else(|| ChatError::chat_not_found(&id))?;

            let mut stmt = conn.prepare(
                "SELECT user_id FROM chat_members WHERE chat_id = ?1 ORDER BY position ASC",
            )?;
            let members = stmt
                .query_map([&id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<String>, _>>()?;

            Ok(ChatGroup {
                id,
                name,
                group_chat,
                creator,
                members,
            })
        })
        .await
        .map_err(join_err)?
    }

    async fn save(&self, group: &ChatGroup) -> ChatResult<()> {
        let db = self.db.clone();
        let group = group.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = db.lock().map_err(|_| lock_err())?;
            let now = Utc::now().to_rfc3339();

            // Replace the member list inside one transaction so a failure
            // can never leave a partially updated group behind.
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE chats SET name = ?2, creator = ?3, updated_at = ?4 WHERE id = ?1",
                params![group.id, group.name, group.creator, now],
            )?;
            if updated == 0 {
                return Err(ChatError::chat_not_found(&group.id));
            }
            tx.execute(
                "DELETE FROM chat_members WHERE chat_id = ?1",
                [&group.id],
            )?;
            for (position, member) in group.members.iter().enumerate() {
                tx.execute(
                    "INSERT INTO chat_members (chat_id, user_id, position) VALUES (?1, ?2, ?3)",
                    params![group.id, member, position as i64],
                )?;
            }
            tx.commit()?;

            Ok(())
        })
        .await
        .map_err(join_err)?
    }
}

#[async_trait]
impl MessageRepository for SqliteStore {
    async fn save(&self, message: StoredMessage) -> ChatResult<()> {
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;
            conn.execute(
                "INSERT INTO messages (id, chat_id, sender, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    message.chat_id,
                    message.sender,
                    message.content,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn lookup(&self, ids: &[String]) -> ChatResult<Vec<UserProfile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let db = self.db.clone();
        let ids = ids.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| lock_err())?;

            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!(
                "SELECT id, display_name FROM users WHERE id IN ({})",
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let profiles = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
                    Ok(UserProfile {
                        id: row.get(0)?,
                        display_name: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<UserProfile>, _>>()?;

            Ok(profiles)
        })
        .await
        .map_err(join_err)?
    }
}
