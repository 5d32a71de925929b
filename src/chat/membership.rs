//! Membership state machine for chat groups.
//!
//! Owns the rules under which a group's member set changes: size bounds,
//! creator privilege, and creator succession. Every operation validates
//! against in-memory state first, persists atomically, and only then
//! notifies — a failed save suppresses all notifications.
//!
//! The read-validate-mutate-persist-notify sequence is serialized per group
//! id, so two concurrent mutations of the same group can never both observe
//! a stale member count. Operations on different groups are independent.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Mutex;

use crate::chat::group::{ChatGroup, MAX_GROUP_MEMBERS, MIN_GROUP_MEMBERS};
use crate::error::{ChatError, ChatResult};
use crate::fanout::{EventKind, FanoutEvent, FanoutRouter};
use crate::repo::{GroupRepository, UserDirectory, UserProfile};

pub struct MembershipEngine {
    groups: Arc<dyn GroupRepository>,
    users: Arc<dyn UserDirectory>,
    fanout: Arc<FanoutRouter>,
    /// One mutation at a time per group id.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MembershipEngine {
    pub fn new(
        groups: Arc<dyn GroupRepository>,
        users: Arc<dyn UserDirectory>,
        fanout: Arc<FanoutRouter>,
    ) -> Self {
        Self {
            groups,
            users,
            fanout,
            locks: DashMap::new(),
        }
    }

    fn group_lock(&self, chat_id: &str) -> Arc<Mutex<()>> {
        self.locks.entry(chat_id.to_string()).or_default().clone()
    }

    /// Append the given users to a group chat. Creator-only. Identities
    /// already in the group are skipped; the result must stay within the
    /// member limit.
    pub async fn add_members(
        &self,
        chat_id: &str,
        requester: &str,
        new_ids: &[String],
    ) -> ChatResult<()> {
        let lock = self.group_lock(chat_id);
        let _guard = lock.lock().await;

        let mut group = self.groups.load(chat_id).await?;
        require_group_chat(&group)?;
        require_creator(&group, requester)?;

        let profiles = self.users.lookup(new_ids).await?;
        for id in new_ids {
            if !profiles.iter().any(|p| &p.id == id) {
                return Err(ChatError::user_not_found(id.clone()));
            }
        }

        // Skip ids already in the group, and repeats within the request
        let mut fresh: Vec<&UserProfile> = Vec::new();
        for profile in &profiles {
            if !group.is_member(&profile.id) && !fresh.iter().any(|f| f.id == profile.id) {
                fresh.push(profile);
            }
        }
        if fresh.is_empty() {
            // Everyone is already a member; nothing changed, nothing to announce.
            return Ok(());
        }
        if group.members.len() + fresh.len() > MAX_GROUP_MEMBERS {
            return Err(ChatError::invariant(format!(
                "Group member limit of {} reached",
                MAX_GROUP_MEMBERS
            )));
        }

        group.members.extend(fresh.iter().map(|p| p.id.clone()));
        self.groups.save(&group).await?;

        let names: Vec<&str> = fresh.iter().map(|p| p.display_name.as_str()).collect();
        self.notify(
            chat_id,
            &group.members,
            &group.members,
            format!("{} has been added to group", names.join(", ")),
        );
        Ok(())
    }

    /// Delete a member from a group chat. Creator-only; the group must keep
    /// at least the minimum member count afterwards, and the creator cannot
    /// be removed (they leave instead, which hands the role on).
    pub async fn remove_member(
        &self,
        chat_id: &str,
        requester: &str,
        target: &str,
    ) -> ChatResult<()> {
        let lock = self.group_lock(chat_id);
        let _guard = lock.lock().await;

        let mut group = self.groups.load(chat_id).await?;
        require_group_chat(&group)?;
        require_creator(&group, requester)?;

        if !group.is_member(target) {
            return Err(ChatError::user_not_found(target));
        }
        if target == group.creator {
            return Err(ChatError::invariant(
                "The creator cannot be removed from the group",
            ));
        }
        if group.members.len() - 1 < MIN_GROUP_MEMBERS {
            return Err(ChatError::invariant(format!(
                "A group chat must keep at least {} members",
                MIN_GROUP_MEMBERS
            )));
        }

        let ids = [target.to_string()];
        let profiles = self.users.lookup(&ids).await?;
        let target_name = profiles
            .first()
            .map(|p| p.display_name.clone())
            .ok_or_else(|| ChatError::user_not_found(target))?;

        let members_before = group.members.clone();
        group.members.retain(|m| m != target);
        self.groups.save(&group).await?;

        self.notify(
            chat_id,
            &group.members,
            &members_before,
            format!("{} has been removed from the group", target_name),
        );
        Ok(())
    }

    /// Leave a group chat. Any member may leave as long as the minimum size
    /// holds afterwards. A leaving creator hands the role to a uniformly
    /// random remaining member before the change is committed.
    pub async fn leave(&self, chat_id: &str, requester: &str) -> ChatResult<()> {
        let lock = self.group_lock(chat_id);
        let _guard = lock.lock().await;

        let mut group = self.groups.load(chat_id).await?;
        require_group_chat(&group)?;

        if !group.is_member(requester) {
            return Err(ChatError::user_not_found(requester));
        }
        if group.members.len() - 1 < MIN_GROUP_MEMBERS {
            return Err(ChatError::invariant(format!(
                "A group chat must keep at least {} members",
                MIN_GROUP_MEMBERS
            )));
        }

        let ids = [requester.to_string()];
        let profiles = self.users.lookup(&ids).await?;
        let leaver_name = profiles
            .first()
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| requester.to_string());

        let members_before = group.members.clone();
        group.members.retain(|m| m != requester);
        if group.creator == requester {
            let successor = rand::random_range(0..group.members.len());
            group.creator = group.members[successor].clone();
        }
        self.groups.save(&group).await?;

        self.notify(
            chat_id,
            &group.members,
            &members_before,
            format!("{} left the group", leaver_name),
        );
        Ok(())
    }

    /// Rename a group chat. Creator-only.
    pub async fn rename(&self, chat_id: &str, requester: &str, new_name: &str) -> ChatResult<()> {
        let lock = self.group_lock(chat_id);
        let _guard = lock.lock().await;

        let mut group = self.groups.load(chat_id).await?;
        require_group_chat(&group)?;
        require_creator(&group, requester)?;

        group.name = new_name.to_string();
        self.groups.save(&group).await?;

        self.notify(
            chat_id,
            &group.members,
            &group.members,
            format!("Group renamed to {}", new_name),
        );
        Ok(())
    }

    /// Post-commit notifications, in order: a human-readable `alert` to the
    /// post-transition member set, then `refetch-chats` to the set that was
    /// relevant before the mutation — so a removed or leaving member also
    /// learns their chat list changed.
    fn notify(&self, chat_id: &str, alert_to: &[String], refetch_to: &[String], message: String) {
        self.fanout.dispatch(FanoutEvent {
            kind: EventKind::Alert,
            target_members: alert_to.to_vec(),
            payload: json!({ "chatId": chat_id, "message": message }),
        });
        self.fanout.dispatch(FanoutEvent {
            kind: EventKind::RefetchChats,
            target_members: refetch_to.to_vec(),
            payload: json!({ "chatId": chat_id }),
        });
    }
}

fn require_group_chat(group: &ChatGroup) -> ChatResult<()> {
    if group.group_chat {
        Ok(())
    } else {
        Err(ChatError::invariant("Not a group chat"))
    }
}

fn require_creator(group: &ChatGroup, requester: &str) -> ChatResult<()> {
    if group.creator == requester {
        Ok(())
    } else {
        Err(ChatError::NotAuthorized)
    }
}
