//! Inbound event decoding and dispatch for an active connection.
//!
//! Frames are JSON: `{"event": <kind>, "payload": {...}}`. Unknown or
//! malformed frames are logged and dropped — a misbehaving client cannot
//! take the connection down.

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::fanout::{EventKind, FanoutEvent};
use crate::repo::StoredMessage;
use crate::state::AppState;

/// The inbound event kinds a client may send while Active.
/// Extra payload fields (such as a client-supplied user id) are ignored;
/// the authenticated identity is authoritative.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ClientEvent {
    #[serde(rename = "new-message", rename_all = "camelCase")]
    NewMessage {
        chat_id: String,
        members: Vec<String>,
        message: String,
    },
    #[serde(rename = "start-typing", rename_all = "camelCase")]
    StartTyping {
        chat_id: String,
        members: Vec<String>,
    },
    #[serde(rename = "stop-typing", rename_all = "camelCase")]
    StopTyping {
        chat_id: String,
        members: Vec<String>,
    },
    #[serde(rename = "chat-joined", rename_all = "camelCase")]
    ChatJoined { members: Vec<String> },
    #[serde(rename = "chat-leaved", rename_all = "camelCase")]
    ChatLeaved { members: Vec<String> },
}

/// Handle an incoming text frame: decode the event envelope and dispatch.
pub async fn handle_text_frame(text: &str, state: &AppState, user_id: &str, display_name: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                error = %e,
                "Failed to decode client event"
            );
            return;
        }
    };

    dispatch_client_event(event, state, user_id, display_name).await;
}

/// Dispatch a decoded client event to the appropriate handler.
async fn dispatch_client_event(
    event: ClientEvent,
    state: &AppState,
    user_id: &str,
    display_name: &str,
) {
    match event {
        ClientEvent::NewMessage {
            chat_id,
            members,
            message,
        } => {
            handle_new_message(state, user_id, display_name, chat_id, members, message);
        }
        ClientEvent::StartTyping { chat_id, members } => {
            handle_typing(state, EventKind::StartTyping, user_id, chat_id, members);
        }
        ClientEvent::StopTyping { chat_id, members } => {
            handle_typing(state, EventKind::StopTyping, user_id, chat_id, members);
        }
        ClientEvent::ChatJoined { members } => {
            state.presence.mark_online(user_id);
            dispatch_online_users(state, members);
        }
        ClientEvent::ChatLeaved { members } => {
            state.presence.mark_offline(user_id);
            dispatch_online_users(state, members);
        }
    }
}

/// Fan out a chat message to the member set, then persist it in the
/// background. The fan-out never waits for storage: live viewers get the
/// message at most once even if the save later fails, which is only logged.
fn handle_new_message(
    state: &AppState,
    user_id: &str,
    display_name: &str,
    chat_id: String,
    members: Vec<String>,
    content: String,
) {
    let ephemeral = json!({
        "_id": Uuid::new_v4().to_string(),
        "content": content,
        "sender": { "_id": user_id, "name": display_name },
        "chat": chat_id,
        "createdAt": Utc::now().to_rfc3339(),
    });

    state.fanout.dispatch(FanoutEvent {
        kind: EventKind::NewMessage,
        target_members: members.clone(),
        payload: json!({ "chatId": chat_id, "message": ephemeral }),
    });
    state.fanout.dispatch(FanoutEvent {
        kind: EventKind::NewMessageAlert,
        target_members: members,
        payload: json!({ "chatId": chat_id }),
    });

    let messages = state.messages.clone();
    let stored = StoredMessage {
        chat_id,
        sender: user_id.to_string(),
        content,
    };
    tokio::spawn(async move {
        if let Err(err) = messages.save(stored).await {
            tracing::error!(error = %err, "Failed to persist message");
        }
    });
}

/// Typing indicators go to the member set minus the sender — the sender
/// must not receive its own typing echo.
fn handle_typing(
    state: &AppState,
    kind: EventKind,
    user_id: &str,
    chat_id: String,
    members: Vec<String>,
) {
    let targets: Vec<String> = members.into_iter().filter(|m| m != user_id).collect();
    state.fanout.dispatch(FanoutEvent {
        kind,
        target_members: targets,
        payload: json!({ "chatId": chat_id }),
    });
}

/// Share the current presence snapshot with a chat's member set.
fn dispatch_online_users(state: &AppState, members: Vec<String>) {
    let snapshot = state.presence.snapshot();
    state.fanout.dispatch(FanoutEvent {
        kind: EventKind::OnlineUsers,
        target_members: members,
        payload: json!(snapshot),
    });
}
