//! Chat lifecycle routes
//!
//! Request/response surface for creating, claiming, and resolving
//! conversations. Handlers stay thin: all state-machine logic lives in the
//! lifecycle coordinator.

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use livedesk_shared::{Chat, ChatStatus, Identity};

use crate::{
    chat::NewChat,
    error::{ApiError, ApiResult},
    state::AppState,
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub customer_name: String,
    pub customer_email: String,
    pub initial_message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub chat: Chat,
}

#[derive(Debug, Serialize)]
pub struct ChatsListResponse {
    pub chats: Vec<Chat>,
}

#[derive(Debug, Deserialize)]
pub struct ListChatsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a new chat (customer widget; no credentials)
pub async fn create_chat(
    State(state): State<AppState>,
    Json(req): Json<CreateChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let chat = state
        .lifecycle
        .create(NewChat {
            customer_name: req.customer_name,
            customer_email: req.customer_email,
            initial_message: req.initial_message,
        })
        .await?;

    Ok(Json(ChatResponse { chat }))
}

/// List chats for the agent dashboard, newest first
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(_identity): Extension<Identity>,
    Query(query): Query<ListChatsQuery>,
) -> ApiResult<Json<ChatsListResponse>> {
    let status = match query.status.as_deref() {
        Some(s) => Some(
            ChatStatus::parse(s)
                .ok_or_else(|| ApiError::Validation(format!("Unknown status: {s}")))?,
        ),
        None => None,
    };
    let limit = query.limit.unwrap_or(50).clamp(1, 100);

    let chats = state.store.list_chats(status, limit).await?;
    Ok(Json(ChatsListResponse { chats }))
}

/// Get a chat snapshot
pub async fn get_chat(
    State(state): State<AppState>,
    Extension(_identity): Extension<Identity>,
    Path(chat_id): Path<Uuid>,
) -> ApiResult<Json<ChatResponse>> {
    let chat = state
        .store
        .get_chat(chat_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(ChatResponse { chat }))
}

/// Claim a waiting chat for the authenticated agent
pub async fn claim_chat(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(chat_id): Path<Uuid>,
) -> ApiResult<Json<ChatResponse>> {
    let chat = state.lifecycle.claim(chat_id, &identity).await?;
    Ok(Json(ChatResponse { chat }))
}

/// Resolve a chat
pub async fn resolve_chat(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(chat_id): Path<Uuid>,
) -> ApiResult<Json<ChatResponse>> {
    let chat = state.lifecycle.resolve(chat_id, &identity).await?;
    Ok(Json(ChatResponse { chat }))
}
