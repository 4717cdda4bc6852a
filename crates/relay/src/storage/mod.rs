//! Storage collaborator for chats and messages
//!
//! The relay never mutates conversation state directly: every status
//! transition goes through `cas_update_status`, an atomic compare-and-set
//! against the persisted record. That CAS is the arbitration mechanism for
//! concurrent claim/resolve attempts and stays correct even when multiple
//! relay instances share one store.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use livedesk_shared::{Chat, ChatStatus, Message, SenderType};

pub use postgres::PgChatStore;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(String),
}

/// Input for creating a conversation (starts in `waiting`).
#[derive(Debug, Clone)]
pub struct NewChatRecord {
    pub customer_name: String,
    pub customer_email: String,
}

/// Input for persisting a message. The timestamp is assigned by the relay
/// before the record reaches the store.
#[derive(Debug, Clone)]
pub struct NewMessageRecord {
    pub chat_id: Uuid,
    pub sender_type: SenderType,
    pub sender_ref: String,
    pub sender_name: String,
    pub content: String,
    pub timestamp: OffsetDateTime,
}

/// Fields written alongside a status transition.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub new_status: ChatStatus,
    pub agent_id: Option<Uuid>,
    pub agent_name: Option<String>,
    pub ended_at: Option<OffsetDateTime>,
}

/// Outcome of a compare-and-set status transition.
#[derive(Debug, Clone)]
pub enum CasOutcome {
    /// The expected status matched; exactly this caller committed the
    /// transition.
    Updated(Chat),
    /// The chat exists but its status was not the expected one (a racing
    /// caller already transitioned it, or the operation is illegal in the
    /// current state).
    StatusMismatch(ChatStatus),
    /// No chat with that id.
    NotFound,
}

/// Narrow persistence contract consumed by the relay core.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_chat(&self, record: NewChatRecord) -> Result<Chat, StoreError>;

    async fn get_chat(&self, chat_id: Uuid) -> Result<Option<Chat>, StoreError>;

    /// List chats, optionally filtered by status, newest first.
    async fn list_chats(
        &self,
        status: Option<ChatStatus>,
        limit: i64,
    ) -> Result<Vec<Chat>, StoreError>;

    /// Atomically transition `chat_id` from `expected` to `update.new_status`,
    /// writing the accompanying fields. Never overwrites a status that no
    /// longer matches `expected`.
    async fn cas_update_status(
        &self,
        chat_id: Uuid,
        expected: ChatStatus,
        update: StatusUpdate,
    ) -> Result<CasOutcome, StoreError>;

    async fn create_message(&self, record: NewMessageRecord) -> Result<Message, StoreError>;

    /// Messages for a chat, timestamp ascending.
    async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<Message>, StoreError>;
}
