//! Chat group entity and its structural invariants.

use serde::{Deserialize, Serialize};

/// Upper bound on group-chat membership.
pub const MAX_GROUP_MEMBERS: usize = 100;

/// A group chat never shrinks below this after a remove or leave.
pub const MIN_GROUP_MEMBERS: usize = 3;

/// A chat group as loaded from and saved to the group repository.
///
/// `members` is ordered and duplicate-free, and always contains `creator`
/// while the group exists. Direct (non-group) chats hold exactly two members
/// and are immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatGroup {
    pub id: String,
    pub name: String,
    pub group_chat: bool,
    pub creator: String,
    pub members: Vec<String>,
}

impl ChatGroup {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }
}
