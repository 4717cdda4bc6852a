//! Shared application state

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::JwtManager;
use crate::chat::{ChatLifecycle, ChatLocks, MessageRelay};
use crate::config::Config;
use crate::storage::{ChatStore, PgChatStore};
use crate::websocket::WebSocketState;

/// Application state shared across all handlers and connections
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub jwt_manager: Arc<JwtManager>,
    pub store: Arc<dyn ChatStore>,
    pub ws_state: WebSocketState,
    pub relay: Arc<MessageRelay>,
    pub lifecycle: Arc<ChatLifecycle>,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool) -> Self {
        let jwt_manager = Arc::new(JwtManager::new(&config.jwt_secret));
        let store: Arc<dyn ChatStore> = Arc::new(PgChatStore::new(pool.clone()));
        let ws_state = WebSocketState::new();
        let locks = Arc::new(ChatLocks::new());
        let relay = Arc::new(MessageRelay::new(
            Arc::clone(&store),
            Arc::clone(&ws_state.rooms),
            Arc::clone(&locks),
        ));
        let lifecycle = Arc::new(ChatLifecycle::new(
            Arc::clone(&store),
            Arc::clone(&ws_state.rooms),
            Arc::clone(&relay),
            locks,
        ));

        Self {
            config: Arc::new(config),
            pool,
            jwt_manager,
            store,
            ws_state,
            relay,
            lifecycle,
        }
    }
}
