//! WebSocket upgrade endpoint: the Connecting → Authenticated transition.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::auth::AuthError;
use crate::state::AppState;
use crate::ws::actor;

/// Credential material arrives as a query parameter, `?token=JWT`, since
/// browsers cannot attach headers to a WebSocket upgrade.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

/// Close codes the client distinguishes: 4001 expired token, 4002 invalid.
const CLOSE_TOKEN_EXPIRED: u16 = 4001;
const CLOSE_TOKEN_INVALID: u16 = 4002;

/// GET /ws?token=JWT
///
/// A failed verification still completes the upgrade, then closes right
/// away with the matching code — the connection never becomes active and
/// nothing is registered. A verified connection hands off to the actor.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    match state.authenticator.verify(&query.token) {
        Ok(user_id) => {
            tracing::info!(user_id = %user_id, "WebSocket connection authenticated");
            ws.on_upgrade(move |socket| actor::run_connection(socket, state, user_id))
        }
        Err(reason) => {
            let code = match reason {
                AuthError::Expired => CLOSE_TOKEN_EXPIRED,
                AuthError::Invalid => CLOSE_TOKEN_INVALID,
            };
            tracing::warn!(close_code = code, error = %reason, "WebSocket auth failed");

            ws.on_upgrade(move |mut socket| async move {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.to_string().into(),
                    })))
                    .await;
            })
        }
    }
}
