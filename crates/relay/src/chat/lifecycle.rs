//! Chat lifecycle coordinator
//!
//! Owns the `waiting -> active -> resolved` state machine. Claim and resolve
//! are arbitrated by the storage layer's compare-and-set, never an
//! in-process lock, so arbitration stays correct with multiple relay
//! instances sharing one store. Within this process each transition and its
//! narrative run under the chat's lock from [`ChatLocks`], the same lock
//! message commits take, so a resolve cannot interleave with an in-flight
//! send. Every committed transition emits exactly one system message
//! through the relay's ordering path before the updated conversation
//! snapshot is broadcast.

use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

use livedesk_shared::{Chat, ChatStatus, Identity, SenderType};

use crate::error::{ApiError, ApiResult};
use crate::storage::{CasOutcome, ChatStore, NewChatRecord, StatusUpdate};
use crate::websocket::{RoomManager, ServerEvent};

use super::ordering::ChatLocks;
use super::relay::MessageRelay;

const MAX_NAME_LENGTH: usize = 200;
const MAX_EMAIL_LENGTH: usize = 320;

/// Input for opening a conversation from the customer widget.
#[derive(Debug, Clone)]
pub struct NewChat {
    pub customer_name: String,
    pub customer_email: String,
    pub initial_message: String,
}

/// Coordinates conversation state transitions and their side effects.
pub struct ChatLifecycle {
    store: Arc<dyn ChatStore>,
    rooms: Arc<RoomManager>,
    relay: Arc<MessageRelay>,
    locks: Arc<ChatLocks>,
}

impl ChatLifecycle {
    pub fn new(
        store: Arc<dyn ChatStore>,
        rooms: Arc<RoomManager>,
        relay: Arc<MessageRelay>,
        locks: Arc<ChatLocks>,
    ) -> Self {
        Self {
            store,
            rooms,
            relay,
            locks,
        }
    }

    /// Open a new conversation in `waiting` and relay the customer's first
    /// message. All input is validated before anything is written.
    pub async fn create(&self, new_chat: NewChat) -> ApiResult<Chat> {
        let customer_name = new_chat.customer_name.trim().to_string();
        let customer_email = new_chat.customer_email.trim().to_string();
        let initial_message = new_chat.initial_message.trim().to_string();

        if customer_name.is_empty() {
            return Err(ApiError::Validation("Customer name cannot be empty".into()));
        }
        if customer_name.len() > MAX_NAME_LENGTH {
            return Err(ApiError::Validation(format!(
                "Customer name too long (max {MAX_NAME_LENGTH} characters)"
            )));
        }
        if customer_email.is_empty() {
            return Err(ApiError::Validation("Customer email cannot be empty".into()));
        }
        if customer_email.len() > MAX_EMAIL_LENGTH || !customer_email.contains('@') {
            return Err(ApiError::Validation("Customer email is not valid".into()));
        }
        if initial_message.is_empty() {
            return Err(ApiError::Validation("Initial message cannot be empty".into()));
        }

        let chat = self
            .store
            .create_chat(NewChatRecord {
                customer_name: customer_name.clone(),
                customer_email: customer_email.clone(),
            })
            .await?;

        self.relay
            .send(
                chat.id,
                SenderType::Customer,
                customer_email,
                customer_name,
                initial_message,
            )
            .await?;

        tracing::info!(
            chat_id = %chat.id,
            "Chat created, waiting for an agent"
        );

        Ok(chat)
    }

    /// Claim a waiting chat for an agent.
    ///
    /// Under concurrent claims exactly one caller's CAS commits; the rest
    /// observe a status mismatch and get `InvalidState`.
    pub async fn claim(&self, chat_id: Uuid, agent: &Identity) -> ApiResult<Chat> {
        // Existence check before taking a slot, so unknown chat ids never
        // allocate a lock entry
        self.store
            .get_chat(chat_id)
            .await?
            .ok_or(ApiError::NotFound)?;

        let slot = self.locks.slot(chat_id).await;
        let mut ordering = slot.lock().await;

        let outcome = self
            .store
            .cas_update_status(
                chat_id,
                ChatStatus::Waiting,
                StatusUpdate {
                    new_status: ChatStatus::Active,
                    agent_id: Some(agent.id),
                    agent_name: Some(agent.name.clone()),
                    ended_at: None,
                },
            )
            .await?;

        let chat = match outcome {
            CasOutcome::Updated(chat) => chat,
            CasOutcome::StatusMismatch(status) => {
                tracing::info!(
                    chat_id = %chat_id,
                    agent_id = %agent.id,
                    status = %status,
                    "Claim rejected: chat is not waiting"
                );
                if status == ChatStatus::Resolved {
                    drop(ordering);
                    self.locks.evict(chat_id).await;
                }
                return Err(ApiError::InvalidState("Chat is not available".into()));
            }
            CasOutcome::NotFound => return Err(ApiError::NotFound),
        };

        self.relay
            .relay_system_locked(
                &mut ordering,
                chat_id,
                format!("Agent {} joined the chat", agent.name),
            )
            .await?;
        self.publish_snapshot(&chat).await;
        drop(ordering);

        tracing::info!(
            chat_id = %chat_id,
            agent_id = %agent.id,
            "Chat claimed"
        );

        Ok(chat)
    }

    /// Resolve a chat. A second resolve reports `InvalidState` rather than
    /// silently succeeding, so duplicate clicks are detectable.
    pub async fn resolve(&self, chat_id: Uuid, agent: &Identity) -> ApiResult<Chat> {
        // Fast path, mirrors the relay's: unknown and already-resolved
        // chats never allocate a lock entry
        let current = self
            .store
            .get_chat(chat_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        if current.status == ChatStatus::Resolved {
            return Err(ApiError::InvalidState("Chat is already resolved".into()));
        }

        let slot = self.locks.slot(chat_id).await;
        let mut ordering = slot.lock().await;

        // Status is re-read under the chat lock, where no send can be in
        // flight and no send can start until the lock is released.
        let current = self
            .store
            .get_chat(chat_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        if current.status == ChatStatus::Resolved {
            drop(ordering);
            self.locks.evict(chat_id).await;
            return Err(ApiError::InvalidState("Chat is already resolved".into()));
        }

        let outcome = self
            .store
            .cas_update_status(
                chat_id,
                current.status,
                StatusUpdate {
                    new_status: ChatStatus::Resolved,
                    agent_id: None,
                    agent_name: None,
                    ended_at: Some(OffsetDateTime::now_utc()),
                },
            )
            .await?;

        let chat = match outcome {
            CasOutcome::Updated(chat) => chat,
            // Lost a cross-instance race against a concurrent resolve
            CasOutcome::StatusMismatch(status) => {
                if status == ChatStatus::Resolved {
                    drop(ordering);
                    self.locks.evict(chat_id).await;
                }
                return Err(ApiError::InvalidState("Chat is already resolved".into()));
            }
            CasOutcome::NotFound => return Err(ApiError::NotFound),
        };

        // The narrative message bypasses the resolved-chat rejection: the
        // transition has already committed by the time it is relayed.
        self.relay
            .relay_system_locked(&mut ordering, chat_id, "Chat has been resolved".to_string())
            .await?;
        self.publish_snapshot(&chat).await;

        // The chat takes no further messages; stop tracking its lock.
        drop(ordering);
        self.locks.evict(chat_id).await;

        tracing::info!(
            chat_id = %chat_id,
            agent_id = %agent.id,
            "Chat resolved"
        );

        Ok(chat)
    }

    async fn publish_snapshot(&self, chat: &Chat) {
        self.rooms
            .broadcast(&chat.id, ServerEvent::ChatUpdated { chat: chat.clone() })
            .await;
    }
}
