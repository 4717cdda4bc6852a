//! Message history route
//!
//! Reconnecting clients reconcile through history rather than the live
//! channel; delivery over the socket is best-effort only.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use livedesk_shared::Message;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub chat_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MessagesListResponse {
    pub messages: Vec<Message>,
}

/// Fetch all messages for a chat, timestamp ascending
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Json<MessagesListResponse>> {
    // Unknown chats 404 rather than returning an empty transcript
    state
        .store
        .get_chat(query.chat_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let messages = state.store.list_messages(query.chat_id).await?;
    Ok(Json(MessagesListResponse { messages }))
}
