//! In-memory chat store for tests
//!
//! Implements the same compare-and-set contract as the Postgres store so the
//! coordinator tests exercise real arbitration semantics without a database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use livedesk_shared::{Chat, ChatStatus, Message};

use super::{CasOutcome, ChatStore, NewChatRecord, NewMessageRecord, StatusUpdate, StoreError};

#[derive(Default)]
struct Tables {
    chats: HashMap<Uuid, Chat>,
    messages: Vec<Message>,
}

/// Test double for the storage collaborator.
#[derive(Default)]
pub struct MemoryChatStore {
    tables: Mutex<Tables>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn create_chat(&self, record: NewChatRecord) -> Result<Chat, StoreError> {
        let chat = Chat {
            id: Uuid::new_v4(),
            customer_name: record.customer_name,
            customer_email: record.customer_email,
            status: ChatStatus::Waiting,
            agent_id: None,
            agent_name: None,
            started_at: OffsetDateTime::now_utc(),
            ended_at: None,
        };
        self.lock()?.chats.insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn get_chat(&self, chat_id: Uuid) -> Result<Option<Chat>, StoreError> {
        Ok(self.lock()?.chats.get(&chat_id).cloned())
    }

    async fn list_chats(
        &self,
        status: Option<ChatStatus>,
        limit: i64,
    ) -> Result<Vec<Chat>, StoreError> {
        let mut chats: Vec<Chat> = self
            .lock()?
            .chats
            .values()
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        chats.truncate(limit.max(0) as usize);
        Ok(chats)
    }

    async fn cas_update_status(
        &self,
        chat_id: Uuid,
        expected: ChatStatus,
        update: StatusUpdate,
    ) -> Result<CasOutcome, StoreError> {
        let mut tables = self.lock()?;
        let Some(chat) = tables.chats.get_mut(&chat_id) else {
            return Ok(CasOutcome::NotFound);
        };
        if chat.status != expected {
            return Ok(CasOutcome::StatusMismatch(chat.status));
        }
        chat.status = update.new_status;
        if update.agent_id.is_some() {
            chat.agent_id = update.agent_id;
        }
        if update.agent_name.is_some() {
            chat.agent_name = update.agent_name;
        }
        if update.ended_at.is_some() {
            chat.ended_at = update.ended_at;
        }
        Ok(CasOutcome::Updated(chat.clone()))
    }

    async fn create_message(&self, record: NewMessageRecord) -> Result<Message, StoreError> {
        let message = Message {
            id: Uuid::new_v4(),
            chat_id: record.chat_id,
            sender_type: record.sender_type,
            sender_ref: record.sender_ref,
            sender_name: record.sender_name,
            content: record.content,
            timestamp: record.timestamp,
        };
        self.lock()?.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let mut messages: Vec<Message> = self
            .lock()?
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cas_commits_once() {
        let store = MemoryChatStore::new();
        let chat = store
            .create_chat(NewChatRecord {
                customer_name: "Ada".to_string(),
                customer_email: "a@x.com".to_string(),
            })
            .await
            .unwrap();

        let update = StatusUpdate {
            new_status: ChatStatus::Active,
            agent_id: Some(Uuid::new_v4()),
            agent_name: Some("Agent A".to_string()),
            ended_at: None,
        };

        let first = store
            .cas_update_status(chat.id, ChatStatus::Waiting, update.clone())
            .await
            .unwrap();
        assert!(matches!(first, CasOutcome::Updated(_)));

        let second = store
            .cas_update_status(chat.id, ChatStatus::Waiting, update)
            .await
            .unwrap();
        assert!(matches!(
            second,
            CasOutcome::StatusMismatch(ChatStatus::Active)
        ));
    }

    #[tokio::test]
    async fn test_cas_unknown_chat() {
        let store = MemoryChatStore::new();
        let outcome = store
            .cas_update_status(
                Uuid::new_v4(),
                ChatStatus::Waiting,
                StatusUpdate {
                    new_status: ChatStatus::Active,
                    agent_id: None,
                    agent_name: None,
                    ended_at: None,
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, CasOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_list_messages_ordered() {
        let store = MemoryChatStore::new();
        let chat_id = Uuid::new_v4();
        let base = OffsetDateTime::now_utc();
        for (i, content) in ["first", "second", "third"].iter().enumerate() {
            store
                .create_message(NewMessageRecord {
                    chat_id,
                    sender_type: livedesk_shared::SenderType::Customer,
                    sender_ref: "a@x.com".to_string(),
                    sender_name: "Ada".to_string(),
                    content: content.to_string(),
                    timestamp: base + time::Duration::seconds(i as i64),
                })
                .await
                .unwrap();
        }

        let messages = store.list_messages(chat_id).await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }
}
