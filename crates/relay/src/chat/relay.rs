//! Message relay
//!
//! Accepts a candidate message, assigns its authoritative timestamp,
//! persists it, then publishes it to the conversation room. All commits for
//! one chat run under that chat's lock from [`ChatLocks`], so every
//! subscriber sees messages in commit order; unrelated chats stay
//! concurrent. The resolved-chat rejection is decided under the same lock,
//! which the lifecycle coordinator holds across a resolve, so a send racing
//! a resolve either commits before the transition or is rejected.

use std::sync::Arc;
use uuid::Uuid;

use livedesk_shared::{ChatStatus, Message, SenderType};

use crate::error::{ApiError, ApiResult};
use crate::storage::{ChatStore, NewMessageRecord};
use crate::websocket::{RoomManager, ServerEvent};

use super::ordering::{ChatLocks, ChatOrdering};

const MAX_CONTENT_LENGTH: usize = 10_000;

/// Relays messages: persist first, then publish the durable copy.
pub struct MessageRelay {
    store: Arc<dyn ChatStore>,
    rooms: Arc<RoomManager>,
    locks: Arc<ChatLocks>,
}

impl MessageRelay {
    pub fn new(store: Arc<dyn ChatStore>, rooms: Arc<RoomManager>, locks: Arc<ChatLocks>) -> Self {
        Self {
            store,
            rooms,
            locks,
        }
    }

    /// Relay a participant message into a chat.
    ///
    /// Rejects empty content (`Validation`), unknown chats (`NotFound`) and
    /// resolved chats (`InvalidState`). The timestamp on the returned
    /// message is the authoritative one; clients must not trust their own.
    pub async fn send(
        &self,
        chat_id: Uuid,
        sender_type: SenderType,
        sender_ref: String,
        sender_name: String,
        content: String,
    ) -> ApiResult<Message> {
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(ApiError::Validation("Message content cannot be empty".into()));
        }
        if content.len() > MAX_CONTENT_LENGTH {
            return Err(ApiError::Validation(format!(
                "Message too long (max {MAX_CONTENT_LENGTH} characters)"
            )));
        }

        // Fast path, keeps unknown and resolved chats out of the lock map
        let chat = self
            .store
            .get_chat(chat_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        if chat.status == ChatStatus::Resolved {
            self.locks.evict(chat_id).await;
            return Err(resolved_rejection());
        }

        let slot = self.locks.slot(chat_id).await;
        let mut ordering = slot.lock().await;

        // Re-read under the chat lock. A resolve cannot commit while this
        // lock is held, and one that committed while this send was in
        // flight is visible here.
        let chat = self
            .store
            .get_chat(chat_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        if chat.status == ChatStatus::Resolved {
            drop(ordering);
            self.locks.evict(chat_id).await;
            return Err(resolved_rejection());
        }

        self.commit(&mut ordering, chat_id, sender_type, sender_ref, sender_name, content)
            .await
    }

    /// Relay a platform-authored system message while the caller holds the
    /// chat's lock.
    ///
    /// Used by the lifecycle coordinator for transition narratives; shares
    /// the ordering path with user messages but skips the resolved-chat
    /// rejection so the resolve transition can narrate itself.
    pub(crate) async fn relay_system_locked(
        &self,
        ordering: &mut ChatOrdering,
        chat_id: Uuid,
        content: String,
    ) -> ApiResult<Message> {
        self.commit(
            ordering,
            chat_id,
            SenderType::System,
            "system".to_string(),
            "System".to_string(),
            content,
        )
        .await
    }

    async fn commit(
        &self,
        ordering: &mut ChatOrdering,
        chat_id: Uuid,
        sender_type: SenderType,
        sender_ref: String,
        sender_name: String,
        content: String,
    ) -> ApiResult<Message> {
        // Persist and publish under the chat's lock: broadcast order now
        // matches commit order for every subscriber.
        let timestamp = ordering.next_timestamp();

        let message = self
            .store
            .create_message(NewMessageRecord {
                chat_id,
                sender_type,
                sender_ref,
                sender_name,
                content,
                timestamp,
            })
            .await?;

        self.rooms
            .broadcast(
                &chat_id,
                ServerEvent::NewMessage {
                    message: message.clone(),
                },
            )
            .await;

        tracing::debug!(
            chat_id = %chat_id,
            message_id = %message.id,
            sender_type = %message.sender_type,
            "Message relayed"
        );

        Ok(message)
    }
}

fn resolved_rejection() -> ApiError {
    ApiError::InvalidState("Chat is resolved; no further messages are accepted".into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryChatStore;
    use crate::storage::{NewChatRecord, StatusUpdate};
    use crate::websocket::connection::{Connection, OUTBOUND_BUFFER};
    use time::OffsetDateTime;
    use tokio::sync::mpsc;

    struct Harness {
        relay: Arc<MessageRelay>,
        store: Arc<dyn ChatStore>,
        rooms: Arc<RoomManager>,
        locks: Arc<ChatLocks>,
        chat_id: Uuid,
    }

    async fn setup() -> Harness {
        let store: Arc<dyn ChatStore> = Arc::new(MemoryChatStore::new());
        let rooms = Arc::new(RoomManager::new());
        let locks = Arc::new(ChatLocks::new());
        let relay = Arc::new(MessageRelay::new(
            Arc::clone(&store),
            Arc::clone(&rooms),
            Arc::clone(&locks),
        ));

        let chat = store
            .create_chat(NewChatRecord {
                customer_name: "Ada".to_string(),
                customer_email: "a@x.com".to_string(),
            })
            .await
            .unwrap();

        Harness {
            relay,
            store,
            rooms,
            locks,
            chat_id: chat.id,
        }
    }

    async fn join_member(
        rooms: &Arc<RoomManager>,
        chat_id: Uuid,
    ) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        rooms.join(chat_id, Arc::new(Connection::new(None, tx))).await;
        rx
    }

    fn received_contents(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<String> {
        let mut contents = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ServerEvent::NewMessage { message } = event {
                contents.push(message.content);
            }
        }
        contents
    }

    #[tokio::test]
    async fn test_send_persists_then_publishes() {
        let h = setup().await;
        let mut rx = join_member(&h.rooms, h.chat_id).await;

        let message = h
            .relay
            .send(
                h.chat_id,
                SenderType::Customer,
                "a@x.com".to_string(),
                "Ada".to_string(),
                "help".to_string(),
            )
            .await
            .unwrap();

        // Durable copy carries the relay-assigned identity and timestamp
        let stored = h.store.list_messages(h.chat_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, message.id);

        // The published event carries the same durable copy
        match rx.try_recv().unwrap() {
            ServerEvent::NewMessage { message: published } => {
                assert_eq!(published.id, message.id);
                assert_eq!(published.timestamp, message.timestamp);
            }
            other => panic!("Unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_members_observe_identical_order() {
        let h = setup().await;
        let mut rx1 = join_member(&h.rooms, h.chat_id).await;
        let mut rx2 = join_member(&h.rooms, h.chat_id).await;

        h.relay
            .send(
                h.chat_id,
                SenderType::Agent,
                Uuid::new_v4().to_string(),
                "Agent A".to_string(),
                "hi".to_string(),
            )
            .await
            .unwrap();
        h.relay
            .send(
                h.chat_id,
                SenderType::Customer,
                "a@x.com".to_string(),
                "Ada".to_string(),
                "hello".to_string(),
            )
            .await
            .unwrap();

        let order1 = received_contents(&mut rx1);
        let order2 = received_contents(&mut rx2);
        assert_eq!(order1, vec!["hi", "hello"]);
        assert_eq!(order1, order2);
    }

    #[tokio::test]
    async fn test_timestamps_non_decreasing_per_chat() {
        let h = setup().await;

        for i in 0..5 {
            h.relay
                .send(
                    h.chat_id,
                    SenderType::Customer,
                    "a@x.com".to_string(),
                    "Ada".to_string(),
                    format!("message {i}"),
                )
                .await
                .unwrap();
        }

        let messages = h.store.list_messages(h.chat_id).await.unwrap();
        for pair in messages.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn test_rejects_empty_content() {
        let h = setup().await;

        let result = h
            .relay
            .send(
                h.chat_id,
                SenderType::Customer,
                "a@x.com".to_string(),
                "Ada".to_string(),
                "   ".to_string(),
            )
            .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_rejects_unknown_chat_without_tracking_it() {
        let h = setup().await;

        let result = h
            .relay
            .send(
                Uuid::new_v4(),
                SenderType::Customer,
                "a@x.com".to_string(),
                "Ada".to_string(),
                "help".to_string(),
            )
            .await;
        assert!(matches!(result, Err(ApiError::NotFound)));
        assert_eq!(h.locks.tracked_chats().await, 0);
    }

    #[tokio::test]
    async fn test_send_after_external_resolve_rejected_and_untracked() {
        let h = setup().await;

        h.relay
            .send(
                h.chat_id,
                SenderType::Customer,
                "a@x.com".to_string(),
                "Ada".to_string(),
                "help".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(h.locks.tracked_chats().await, 1);

        // Another relay instance sharing the store resolves the chat
        h.store
            .cas_update_status(
                h.chat_id,
                ChatStatus::Waiting,
                StatusUpdate {
                    new_status: ChatStatus::Resolved,
                    agent_id: None,
                    agent_name: None,
                    ended_at: Some(OffsetDateTime::now_utc()),
                },
            )
            .await
            .unwrap();

        let result = h
            .relay
            .send(
                h.chat_id,
                SenderType::Customer,
                "a@x.com".to_string(),
                "Ada".to_string(),
                "still there?".to_string(),
            )
            .await;
        assert!(matches!(result, Err(ApiError::InvalidState(_))));
        assert_eq!(h.locks.tracked_chats().await, 0);

        let messages = h.store.list_messages(h.chat_id).await.unwrap();
        assert_eq!(messages.len(), 1);
    }
}
