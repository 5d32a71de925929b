//! One actor per active connection.
//!
//! The socket splits into a writer half, drained by a forwarding task that
//! owns the sink, and a reader half processed inline. Inbound events on one
//! connection are handled one at a time; separate connections run in
//! parallel.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::fanout::EventKind;
use crate::registry::ConnectionSender;
use crate::state::AppState;
use crate::ws::protocol;

/// Server-initiated ping cadence. Abruptly dropped clients would otherwise
/// leak half-open connections.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long a pong may lag before the connection is considered dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Own an authenticated connection until it closes.
pub async fn run_connection(socket: WebSocket, state: AppState, user_id: String) {
    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Authenticated → Active: this endpoint is now the user's live one.
    // Cloning `tx` is how the rest of the system reaches this client.
    state.registry.register(&user_id, tx.clone());

    let display_name = resolve_display_name(&state, &user_id).await;
    tracing::info!(user_id = %user_id, "WebSocket actor started");

    let writer = tokio::spawn(write_outbound(sink, rx));
    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let pinger = tokio::spawn(keepalive_loop(tx.clone(), pong_rx));

    read_inbound(stream, &state, &user_id, &display_name, &tx, &pong_tx).await;

    // Active → Closed, regardless of what was in flight
    writer.abort();
    pinger.abort();

    // A reconnect may already have replaced this endpoint; presence is only
    // cleared when the registry still pointed at it.
    if state.registry.unregister(&user_id, &tx) {
        state.presence.mark_offline(&user_id);
        let snapshot = state.presence.snapshot();
        state
            .fanout
            .broadcast(EventKind::OnlineUsers, serde_json::json!(snapshot));
    }

    tracing::info!(user_id = %user_id, "WebSocket actor stopped");
}

/// The sender's display name is resolved once per connection and reused on
/// every message it fans out.
async fn resolve_display_name(state: &AppState, user_id: &str) -> String {
    let ids = [user_id.to_string()];
    match state.users.lookup(&ids).await {
        Ok(profiles) => profiles
            .into_iter()
            .next()
            .map(|p| p.display_name)
            .unwrap_or_else(|| "Unknown".to_string()),
        Err(err) => {
            tracing::warn!(user_id = %user_id, error = %err, "Display name lookup failed");
            "Unknown".to_string()
        }
    }
}

/// Forward this connection's outbound queue into the socket sink.
async fn write_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(frame) = rx.recv().await {
        if sink.send(frame).await.is_err() {
            // Transport is broken; the reader loop will observe it too
            break;
        }
    }
}

/// Ping on a timer and require a pong within the timeout; a client gone
/// quiet is closed with 1001.
async fn keepalive_loop(tx: ConnectionSender, mut pong_rx: mpsc::UnboundedReceiver<()>) {
    let mut ticker = interval(PING_INTERVAL);
    // interval fires immediately on the first tick
    ticker.tick().await;

    loop {
        ticker.tick().await;

        if tx.send(Message::Ping(Vec::new().into())).is_err() {
            break;
        }

        match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                tracing::warn!("Pong timeout, closing connection");
                let _ = tx.send(Message::Close(Some(CloseFrame {
                    code: 1001,
                    reason: "Pong timeout".into(),
                })));
                break;
            }
        }
    }
}

/// Process inbound frames until the client closes, the transport errors, or
/// the stream ends.
async fn read_inbound(
    mut stream: SplitStream<WebSocket>,
    state: &AppState,
    user_id: &str,
    display_name: &str,
    tx: &ConnectionSender,
    pong_tx: &mpsc::UnboundedSender<()>,
) {
    while let Some(received) = stream.next().await {
        let frame = match received {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "WebSocket receive error");
                return;
            }
        };

        match frame {
            Message::Text(text) => {
                protocol::handle_text_frame(&text, state, user_id, display_name).await;
            }
            Message::Ping(data) => {
                let _ = tx.send(Message::Pong(data));
            }
            Message::Pong(_) => {
                let _ = pong_tx.send(());
            }
            Message::Binary(_) => {
                tracing::debug!(user_id = %user_id, "Ignoring binary frame on a JSON protocol");
            }
            Message::Close(frame) => {
                tracing::info!(user_id = %user_id, reason = ?frame, "Client initiated close");
                return;
            }
        }
    }

    tracing::info!(user_id = %user_id, "WebSocket stream ended");
}
