//! Typing indicator debounce
//!
//! Per `(chat, connection)` pair the coordinator holds at most one pending
//! expiry timer. The first `typing` signal in a window publishes
//! `user-typing`; repeats only re-arm the timer; 2 seconds of silence (or an
//! explicit `stop-typing`) publishes `user-stop-typing`. Pure coordination
//! state, nothing persisted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::events::ServerEvent;
use super::room::RoomManager;

/// Inactivity window after which a typing indicator expires
pub const TYPING_EXPIRY: Duration = Duration::from_secs(2);

/// (chat_id, session_id)
type TypingKey = (Uuid, Uuid);

struct Inner {
    rooms: Arc<RoomManager>,
    timers: Mutex<HashMap<TypingKey, JoinHandle<()>>>,
}

/// Debounced typing/stop-typing signaling on top of the broadcaster
#[derive(Clone)]
pub struct TypingCoordinator {
    inner: Arc<Inner>,
}

impl TypingCoordinator {
    pub fn new(rooms: Arc<RoomManager>) -> Self {
        Self {
            inner: Arc::new(Inner {
                rooms,
                timers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Handle a `typing` signal from a connection.
    ///
    /// Publishes `user-typing` only when no timer is armed for this pair;
    /// otherwise just re-arms the expiry.
    pub async fn notify_typing(&self, chat_id: Uuid, session_id: Uuid, user_name: String) {
        let key = (chat_id, session_id);
        let mut timers = self.inner.timers.lock().await;

        let was_armed = match timers.remove(&key) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        };

        if !was_armed {
            self.inner
                .rooms
                .broadcast(
                    &chat_id,
                    ServerEvent::UserTyping {
                        chat_id,
                        user_name: user_name.clone(),
                    },
                )
                .await;
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(TYPING_EXPIRY).await;
            inner.timers.lock().await.remove(&key);
            inner
                .rooms
                .broadcast(&chat_id, ServerEvent::UserStopTyping { chat_id })
                .await;
        });
        timers.insert(key, handle);

        tracing::trace!(
            chat_id = %chat_id,
            session_id = %session_id,
            rearmed = was_armed,
            "Typing timer armed"
        );
    }

    /// Handle an explicit `stop-typing` signal. No-op when no timer is armed.
    pub async fn notify_stop_typing(&self, chat_id: Uuid, session_id: Uuid) {
        let key = (chat_id, session_id);
        let removed = self.inner.timers.lock().await.remove(&key);

        if let Some(handle) = removed {
            handle.abort();
            self.inner
                .rooms
                .broadcast(&chat_id, ServerEvent::UserStopTyping { chat_id })
                .await;
        }
    }

    /// Cancel every timer a connection owns, publishing the terminal
    /// `user-stop-typing` for each armed chat. Called on disconnect.
    pub async fn cancel_for_connection(&self, session_id: &Uuid) {
        let cancelled: Vec<Uuid> = {
            let mut timers = self.inner.timers.lock().await;
            let keys: Vec<TypingKey> = timers
                .keys()
                .filter(|(_, sid)| sid == session_id)
                .copied()
                .collect();
            keys.into_iter()
                .filter_map(|key| timers.remove(&key).map(|h| (key.0, h)))
                .map(|(chat_id, handle)| {
                    handle.abort();
                    chat_id
                })
                .collect()
        };

        for chat_id in cancelled {
            self.inner
                .rooms
                .broadcast(&chat_id, ServerEvent::UserStopTyping { chat_id })
                .await;
        }
    }

    /// Number of armed timers (diagnostics)
    pub async fn active_timers(&self) -> usize {
        self.inner.timers.lock().await.len()
    }
}
