//! Per-chat serialization
//!
//! One async lock per live chat, shared by the message relay and the
//! lifecycle coordinator. Every commit for a chat, whether a participant
//! message or a lifecycle transition with its narrative, runs under that
//! chat's lock, so subscribers observe a single total order and a resolve
//! cannot interleave with an in-flight send. Entries are evicted when the
//! chat resolves; unknown chats never allocate one, so the registry only
//! tracks live conversations.

use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

/// State guarded by a chat's lock. Timestamps are clamped so they never
/// decrease within a chat even if the wall clock steps backwards.
#[derive(Default)]
pub struct ChatOrdering {
    last_timestamp: Option<OffsetDateTime>,
}

impl ChatOrdering {
    /// Next authoritative timestamp for this chat.
    pub fn next_timestamp(&mut self) -> OffsetDateTime {
        let mut timestamp = OffsetDateTime::now_utc();
        if let Some(last) = self.last_timestamp {
            if timestamp < last {
                timestamp = last;
            }
        }
        self.last_timestamp = Some(timestamp);
        timestamp
    }
}

/// Registry of per-chat locks.
#[derive(Default)]
pub struct ChatLocks {
    slots: Mutex<HashMap<Uuid, Arc<Mutex<ChatOrdering>>>>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for a chat, created on first use. Callers must confirm
    /// the chat exists before taking a slot.
    pub async fn slot(&self, chat_id: Uuid) -> Arc<Mutex<ChatOrdering>> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(chat_id).or_default())
    }

    /// Drop a chat's entry once it can take no further messages. Tasks
    /// already holding the old handle finish against it; later lookups see
    /// the chat's terminal status and evict again, so the removal is
    /// idempotent.
    pub async fn evict(&self, chat_id: Uuid) {
        self.slots.lock().await.remove(&chat_id);
    }

    /// Number of chats currently tracked.
    pub async fn tracked_chats(&self) -> usize {
        self.slots.lock().await.len()
    }
}
