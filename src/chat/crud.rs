//! REST surface for group-membership mutations.
//!
//! Thin handlers over the membership engine; the engine owns validation,
//! persistence, and post-commit fan-out.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::error::ChatError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMembersRequest {
    pub chat_id: String,
    pub members: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMemberRequest {
    pub chat_id: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub success: bool,
    pub message: String,
}

fn ok(message: &str) -> Json<MutationResponse> {
    Json(MutationResponse {
        success: true,
        message: message.to_string(),
    })
}

fn into_http(err: ChatError) -> (StatusCode, String) {
    (err.status(), err.to_string())
}

/// PUT /api/v1/chat/addmembers — Add users to a group chat. Creator only.
pub async fn add_members(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<AddMembersRequest>,
) -> Result<Json<MutationResponse>, (StatusCode, String)> {
    if req.members.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Please provide members".to_string()));
    }

    state
        .membership
        .add_members(&req.chat_id, &claims.sub, &req.members)
        .await
        .map_err(into_http)?;

    Ok(ok("Members added successfully"))
}

/// PUT /api/v1/chat/removemember — Remove a user from a group chat. Creator only.
pub async fn remove_member(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<RemoveMemberRequest>,
) -> Result<Json<MutationResponse>, (StatusCode, String)> {
    state
        .membership
        .remove_member(&req.chat_id, &claims.sub, &req.user_id)
        .await
        .map_err(into_http)?;

    Ok(ok("Member removed successfully"))
}

/// DELETE /api/v1/chat/leave/{id} — Leave a group chat.
pub async fn leave_group(
    State(state): State<AppState>,
    claims: Claims,
    Path(chat_id): Path<String>,
) -> Result<Json<MutationResponse>, (StatusCode, String)> {
    state
        .membership
        .leave(&chat_id, &claims.sub)
        .await
        .map_err(into_http)?;

    Ok(ok("Left group successfully"))
}

/// PUT /api/v1/chat/{id} — Rename a group chat. Creator only.
pub async fn rename_group(
    State(state): State<AppState>,
    claims: Claims,
    Path(chat_id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<MutationResponse>, (StatusCode, String)> {
    state
        .membership
        .rename(&chat_id, &claims.sub, &req.name)
        .await
        .map_err(into_http)?;

    Ok(ok("Group renamed"))
}
