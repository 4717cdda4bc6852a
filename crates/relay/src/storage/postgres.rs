//! Postgres-backed chat store

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use livedesk_shared::{Chat, ChatStatus, Message, SenderType};

use super::{CasOutcome, ChatStore, NewChatRecord, NewMessageRecord, StatusUpdate, StoreError};

/// Production storage collaborator backed by Postgres.
#[derive(Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct ChatRow {
    id: Uuid,
    customer_name: String,
    customer_email: String,
    status: String,
    agent_id: Option<Uuid>,
    agent_name: Option<String>,
    started_at: OffsetDateTime,
    ended_at: Option<OffsetDateTime>,
}

impl TryFrom<ChatRow> for Chat {
    type Error = StoreError;

    fn try_from(row: ChatRow) -> Result<Self, StoreError> {
        let status = ChatStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Database(format!("unknown chat status: {}", row.status)))?;
        Ok(Chat {
            id: row.id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            status,
            agent_id: row.agent_id,
            agent_name: row.agent_name,
            started_at: row.started_at,
            ended_at: row.ended_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: Uuid,
    chat_id: Uuid,
    sender_type: String,
    sender_ref: String,
    sender_name: String,
    content: String,
    timestamp: OffsetDateTime,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, StoreError> {
        let sender_type = SenderType::parse(&row.sender_type).ok_or_else(|| {
            StoreError::Database(format!("unknown sender type: {}", row.sender_type))
        })?;
        Ok(Message {
            id: row.id,
            chat_id: row.chat_id,
            sender_type,
            sender_ref: row.sender_ref,
            sender_name: row.sender_name,
            content: row.content,
            timestamp: row.timestamp,
        })
    }
}

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

const CHAT_COLUMNS: &str =
    "id, customer_name, customer_email, status, agent_id, agent_name, started_at, ended_at";

#[async_trait]
impl ChatStore for PgChatStore {
    async fn create_chat(&self, record: NewChatRecord) -> Result<Chat, StoreError> {
        let row: ChatRow = sqlx::query_as(
            r#"
            INSERT INTO chats (customer_name, customer_email, status)
            VALUES ($1, $2, 'waiting')
            RETURNING id, customer_name, customer_email, status, agent_id, agent_name,
                      started_at, ended_at
            "#,
        )
        .bind(&record.customer_name)
        .bind(&record.customer_email)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        row.try_into()
    }

    async fn get_chat(&self, chat_id: Uuid) -> Result<Option<Chat>, StoreError> {
        let row: Option<ChatRow> = sqlx::query_as(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE id = $1"
        ))
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Chat::try_from).transpose()
    }

    async fn list_chats(
        &self,
        status: Option<ChatStatus>,
        limit: i64,
    ) -> Result<Vec<Chat>, StoreError> {
        let rows: Vec<ChatRow> = if let Some(status) = status {
            sqlx::query_as(&format!(
                "SELECT {CHAT_COLUMNS} FROM chats WHERE status = $1 \
                 ORDER BY started_at DESC LIMIT $2"
            ))
            .bind(status.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
        } else {
            sqlx::query_as(&format!(
                "SELECT {CHAT_COLUMNS} FROM chats ORDER BY started_at DESC LIMIT $1"
            ))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
        };

        rows.into_iter().map(Chat::try_from).collect()
    }

    async fn cas_update_status(
        &self,
        chat_id: Uuid,
        expected: ChatStatus,
        update: StatusUpdate,
    ) -> Result<CasOutcome, StoreError> {
        // The WHERE clause on status is the whole point: under concurrent
        // claim attempts exactly one UPDATE matches.
        let row: Option<ChatRow> = sqlx::query_as(
            r#"
            UPDATE chats
            SET status = $3,
                agent_id = COALESCE($4, agent_id),
                agent_name = COALESCE($5, agent_name),
                ended_at = COALESCE($6, ended_at)
            WHERE id = $1 AND status = $2
            RETURNING id, customer_name, customer_email, status, agent_id, agent_name,
                      started_at, ended_at
            "#,
        )
        .bind(chat_id)
        .bind(expected.as_str())
        .bind(update.new_status.as_str())
        .bind(update.agent_id)
        .bind(update.agent_name.as_deref())
        .bind(update.ended_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        if let Some(row) = row {
            return Ok(CasOutcome::Updated(row.try_into()?));
        }

        // Lost the CAS or the chat never existed; a follow-up read tells
        // the caller which.
        match self.get_chat(chat_id).await? {
            Some(chat) => Ok(CasOutcome::StatusMismatch(chat.status)),
            None => Ok(CasOutcome::NotFound),
        }
    }

    async fn create_message(&self, record: NewMessageRecord) -> Result<Message, StoreError> {
        let row: MessageRow = sqlx::query_as(
            r#"
            INSERT INTO messages (chat_id, sender_type, sender_ref, sender_name, content, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, chat_id, sender_type, sender_ref, sender_name, content, timestamp
            "#,
        )
        .bind(record.chat_id)
        .bind(record.sender_type.as_str())
        .bind(&record.sender_ref)
        .bind(&record.sender_name)
        .bind(&record.content)
        .bind(record.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        row.try_into()
    }

    async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, chat_id, sender_type, sender_ref, sender_name, content, timestamp
            FROM messages
            WHERE chat_id = $1
            ORDER BY timestamp ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(Message::try_from).collect()
    }
}
