//! Conversation store: persistence and queries for conversations and their
//! messages.
//!
//! Uses SqlitePoolManager; messages are immutable once appended and strictly
//! time-ordered per conversation. Safety flags and context snapshots live in
//! JSON columns.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use assistant_core::{
    ContextSnapshot, Conversation, Message, MessageRole, ProviderKind, SafetyFlag,
};

use crate::error::StorageError;
use crate::sqlite_pool::SqlitePoolManager;

/// Persistence boundary for conversations and messages.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), StorageError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StorageError>;

    /// Conversations for one user, most recently active first.
    async fn list_recent(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Conversation>, StorageError>;

    async fn set_title(&self, id: &str, title: &str) -> Result<(), StorageError>;

    async fn set_archived(&self, id: &str, archived: bool) -> Result<(), StorageError>;

    /// Deletes the conversation and all of its messages. Returns whether a
    /// conversation row was removed.
    async fn delete_conversation(&self, id: &str) -> Result<bool, StorageError>;

    /// Appends a message and bumps the owning conversation's
    /// `last_message_at` and `message_count` in the same transaction.
    async fn append_message(&self, message: &Message) -> Result<(), StorageError>;

    /// All messages of a conversation in timestamp order.
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StorageError>;

    /// The last `limit` messages of a conversation, oldest first.
    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> Result<Vec<Message>, StorageError>;
}

#[derive(Clone)]
pub struct SqliteConversationStore {
    pool_manager: SqlitePoolManager,
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: String,
    user_id: String,
    title: String,
    created_at: DateTime<Utc>,
    last_message_at: DateTime<Utc>,
    message_count: i64,
    provider_used: String,
    model_used: String,
    is_archived: bool,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = StorageError;

    fn try_from(row: ConversationRow) -> Result<Self, Self::Error> {
        let provider_used =
            ProviderKind::from_str(&row.provider_used).map_err(StorageError::Database)?;
        Ok(Conversation {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            created_at: row.created_at,
            last_message_at: row.last_message_at,
            message_count: row.message_count,
            provider_used,
            model_used: row.model_used,
            is_archived: row.is_archived,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    timestamp: DateTime<Utc>,
    context_snapshot: Option<String>,
    safety_flags: String,
    tokens_used: Option<i64>,
    latency_ms: Option<i64>,
    provider_used: Option<String>,
    model_used: Option<String>,
}

impl TryFrom<MessageRow> for Message {
    type Error = StorageError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let role = MessageRole::from_str(&row.role).map_err(StorageError::Database)?;
        let provider_used = row
            .provider_used
            .as_deref()
            .map(ProviderKind::from_str)
            .transpose()
            .map_err(StorageError::Database)?;
        let context_snapshot: Option<ContextSnapshot> = row
            .context_snapshot
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let safety_flags: Vec<SafetyFlag> = serde_json::from_str(&row.safety_flags)?;

        Ok(Message {
            id: row.id,
            conversation_id: row.conversation_id,
            role,
            content: row.content,
            timestamp: row.timestamp,
            context_snapshot,
            safety_flags,
            tokens_used: row.tokens_used.map(|t| t as u32),
            latency_ms: row.latency_ms.map(|l| l as u64),
            provider_used,
            model_used: row.model_used,
        })
    }
}

impl SqliteConversationStore {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        let store = Self { pool_manager };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), StorageError> {
        info!("Creating database tables if not exist");

        let pool = self.pool_manager.pool();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_message_at TEXT NOT NULL,
                message_count INTEGER NOT NULL DEFAULT 0,
                provider_used TEXT NOT NULL,
                model_used TEXT NOT NULL,
                is_archived INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                context_snapshot TEXT,
                safety_flags TEXT NOT NULL,
                tokens_used INTEGER,
                latency_ms INTEGER,
                provider_used TEXT,
                model_used TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_user_recent
             ON conversations(user_id, last_message_at)",
        )
        .execute(pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation_time
             ON messages(conversation_id, timestamp)",
        )
        .execute(pool)
        .await?;

        info!("Database tables created successfully");
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), StorageError> {
        let pool = self.pool_manager.pool();

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT id FROM conversations WHERE id = ?")
                .bind(&conversation.id)
                .fetch_optional(pool)
                .await?;
        if existing.is_some() {
            return Err(StorageError::AlreadyExists(conversation.id.clone()));
        }

        sqlx::query(
            r#"
            INSERT INTO conversations
                (id, user_id, title, created_at, last_message_at, message_count,
                 provider_used, model_used, is_archived)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&conversation.id)
        .bind(&conversation.user_id)
        .bind(&conversation.title)
        .bind(conversation.created_at)
        .bind(conversation.last_message_at)
        .bind(conversation.message_count)
        .bind(conversation.provider_used.as_str())
        .bind(&conversation.model_used)
        .bind(conversation.is_archived)
        .execute(pool)
        .await?;

        info!(
            "Created conversation: id={}, user_id={}",
            conversation.id, conversation.user_id
        );
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StorageError> {
        let pool = self.pool_manager.pool();

        let row: Option<ConversationRow> =
            sqlx::query_as("SELECT * FROM conversations WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await?;

        row.map(Conversation::try_from).transpose()
    }

    async fn list_recent(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Conversation>, StorageError> {
        let pool = self.pool_manager.pool();

        let rows: Vec<ConversationRow> = sqlx::query_as(
            "SELECT * FROM conversations
             WHERE user_id = ? AND is_archived = 0
             ORDER BY last_message_at DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Conversation::try_from).collect()
    }

    async fn set_title(&self, id: &str, title: &str) -> Result<(), StorageError> {
        let pool = self.pool_manager.pool();

        let result = sqlx::query("UPDATE conversations SET title = ? WHERE id = ?")
            .bind(title)
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn set_archived(&self, id: &str, archived: bool) -> Result<(), StorageError> {
        let pool = self.pool_manager.pool();

        let result = sqlx::query("UPDATE conversations SET is_archived = ? WHERE id = ?")
            .bind(archived)
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> Result<bool, StorageError> {
        let pool = self.pool_manager.pool();
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let deleted = result.rows_affected() > 0;
        info!("Deleted conversation: id={}, existed={}", id, deleted);
        Ok(deleted)
    }

    async fn append_message(&self, message: &Message) -> Result<(), StorageError> {
        let pool = self.pool_manager.pool();
        let mut tx = pool.begin().await?;

        let safety_flags = serde_json::to_string(&message.safety_flags)?;
        let context_snapshot = message
            .context_snapshot
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO messages
                (id, conversation_id, role, content, timestamp, context_snapshot,
                 safety_flags, tokens_used, latency_ms, provider_used, model_used)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.timestamp)
        .bind(&context_snapshot)
        .bind(&safety_flags)
        .bind(message.tokens_used.map(|t| t as i64))
        .bind(message.latency_ms.map(|l| l as i64))
        .bind(message.provider_used.map(|p| p.as_str()))
        .bind(&message.model_used)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "UPDATE conversations
             SET last_message_at = ?, message_count = message_count + 1
             WHERE id = ?",
        )
        .bind(message.timestamp)
        .bind(&message.conversation_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(message.conversation_id.clone()));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StorageError> {
        let pool = self.pool_manager.pool();

        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT * FROM messages WHERE conversation_id = ?
             ORDER BY timestamp ASC, rowid ASC",
        )
        .bind(conversation_id)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> Result<Vec<Message>, StorageError> {
        let pool = self.pool_manager.pool();

        // Newest N selected descending, then flipped back to chronological.
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT * FROM messages WHERE conversation_id = ?
             ORDER BY timestamp DESC, rowid DESC LIMIT ?",
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        let mut messages: Vec<Message> = rows
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<_, _>>()?;
        messages.reverse();
        Ok(messages)
    }
}
