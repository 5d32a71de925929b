//! Event fan-out: delivering one logical event to many live connections.
//!
//! The router resolves a member set to endpoints through the connection
//! registry only — never through group storage — so dispatching to a group
//! of up to 100 members involves no blocking calls.

use std::sync::{Arc, Mutex};

use axum::extract::ws::Message;
use serde::Serialize;
use serde_json::Value;

use crate::registry::ConnectionRegistry;

/// Wire-level event kinds. The serialized names are part of the client
/// contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    #[serde(rename = "new-message")]
    NewMessage,
    #[serde(rename = "new-message-alert")]
    NewMessageAlert,
    #[serde(rename = "start-typing")]
    StartTyping,
    #[serde(rename = "stop-typing")]
    StopTyping,
    #[serde(rename = "online-users")]
    OnlineUsers,
    #[serde(rename = "alert")]
    Alert,
    #[serde(rename = "refetch-chats")]
    RefetchChats,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewMessage => "new-message",
            Self::NewMessageAlert => "new-message-alert",
            Self::StartTyping => "start-typing",
            Self::StopTyping => "stop-typing",
            Self::OnlineUsers => "online-users",
            Self::Alert => "alert",
            Self::RefetchChats => "refetch-chats",
        }
    }
}

/// One dispatch call: deliver `payload` tagged with `kind` to every member
/// of `target_members` that currently holds a live connection. Transient —
/// exists only for the duration of the dispatch.
#[derive(Debug, Clone)]
pub struct FanoutEvent {
    pub kind: EventKind,
    pub target_members: Vec<String>,
    pub payload: Value,
}

/// Resolves member sets to endpoints and delivers events to them.
pub struct FanoutRouter {
    registry: Arc<ConnectionRegistry>,
    // Serializes resolve-and-deliver so each endpoint observes events in the
    // order the router processed them, never interleaved mid-dispatch.
    order: Mutex<()>,
}

impl FanoutRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            order: Mutex::new(()),
        }
    }

    /// Deliver an event to every resolvable target endpoint. Fire-and-forget:
    /// an endpoint that closed between resolution and send is skipped without
    /// error and without blocking delivery to the rest.
    pub fn dispatch(&self, event: FanoutEvent) {
        let frame = encode_frame(event.kind, &event.payload);
        let _guard = self.order.lock().unwrap_or_else(|e| e.into_inner());
        for endpoint in self.registry.resolve(&event.target_members) {
            let _ = endpoint.send(frame.clone());
        }
    }

    /// Deliver to every registered connection, member sets aside. Used for
    /// presence changes that all online users must learn about.
    pub fn broadcast(&self, kind: EventKind, payload: Value) {
        let frame = encode_frame(kind, &payload);
        let _guard = self.order.lock().unwrap_or_else(|e| e.into_inner());
        for endpoint in self.registry.all() {
            let _ = endpoint.send(frame.clone());
        }
    }
}

/// Encode an outbound frame: `{"event": <kind>, "payload": <payload>}`.
fn encode_frame(kind: EventKind, payload: &Value) -> Message {
    let body = serde_json::json!({ "event": kind, "payload": payload });
    Message::Text(body.to_string().into())
}
