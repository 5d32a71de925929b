use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, put},
    Router,
};

use crate::auth::middleware::JwtSecret;
use crate::chat::crud;
use crate::state::AppState;
use crate::ws::handler;

/// Assemble the HTTP surface: membership mutations, the WebSocket upgrade,
/// and a liveness probe.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/chat/addmembers", put(crud::add_members))
        .route("/api/v1/chat/removemember", put(crud::remove_member))
        .route("/api/v1/chat/leave/{id}", delete(crud::leave_group))
        .route("/api/v1/chat/{id}", put(crud::rename_group))
        .route("/ws", get(handler::ws_upgrade))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            expose_jwt_secret,
        ))
        .with_state(state)
}

/// Put the signing secret into request extensions, where the `Claims`
/// extractor expects it.
async fn expose_jwt_secret(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    request
        .extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(request).await
}

async fn health() -> &'static str {
    "ok"
}
