//! Core chat types: provider kinds, conversation, message, safety flags, and stream chunks.

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ContextSnapshot;

/// The closed set of generation backends. Dispatch over this set happens
/// explicitly at the registry boundary, never via open-ended plugin lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    Local,
}

impl ProviderKind {
    /// Stable identifier used in persistence and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Local => "local",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            "local" => Ok(ProviderKind::Local),
            other => Err(format!("unknown provider kind: {other}")),
        }
    }
}

/// Role of a chat message, one-to-one with chat API `role` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

/// A plain role + content pair, the unit of conversation history handed to
/// providers. Lighter than [`Message`]: no ids, flags or metadata.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// What a triggered safety flag classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyFlagKind {
    Emergency,
    MedicalAdvice,
    SelfHarm,
    DangerousRecommendation,
}

/// What the engine did about a triggered flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyAction {
    Block,
    Warn,
    Log,
}

/// Safety annotation attached to a message at creation time; never mutated
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyFlag {
    pub kind: SafetyFlagKind,
    pub description: String,
    pub triggered: bool,
    pub action: SafetyAction,
}

/// A conversation owned by one user. Title is derived from the first user
/// message (truncated to 50 chars); counters and timestamps are bumped on
/// every appended message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub message_count: i64,
    pub provider_used: ProviderKind,
    pub model_used: String,
    pub is_archived: bool,
}

impl Conversation {
    /// Creates a fresh conversation with a generated UUID and placeholder title.
    pub fn new(user_id: impl Into<String>, provider: ProviderKind, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: "New Conversation".to_string(),
            created_at: now,
            last_message_at: now,
            message_count: 0,
            provider_used: provider,
            model_used: model.into(),
            is_archived: false,
        }
    }
}

/// One committed message inside a conversation. Immutable once stored;
/// corrections are new messages, never in-place edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Lightweight denormalized health facts active at send time, for audit.
    pub context_snapshot: Option<ContextSnapshot>,
    pub safety_flags: Vec<SafetyFlag>,
    pub tokens_used: Option<u32>,
    pub latency_ms: Option<u64>,
    pub provider_used: Option<ProviderKind>,
    pub model_used: Option<String>,
}

impl Message {
    /// Creates a message with a generated UUID and current timestamp.
    pub fn new(
        conversation_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            context_snapshot: None,
            safety_flags: Vec::new(),
            tokens_used: None,
            latency_ms: None,
            provider_used: None,
            model_used: None,
        }
    }

    pub fn with_safety_flag(mut self, flag: SafetyFlag) -> Self {
        self.safety_flags.push(flag);
        self
    }

    pub fn with_context_snapshot(mut self, snapshot: ContextSnapshot) -> Self {
        self.context_snapshot = Some(snapshot);
        self
    }
}

/// Why a generation stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
}

/// One transient unit of a streamed generation response. Consumers
/// pattern-match on the variant instead of relying on thrown errors
/// mid-sequence; a failed stream ends with [`StreamChunk::Error`].
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Incremental content.
    Content(String),
    /// Clean terminal marker.
    Done(FinishReason),
    /// Terminal error payload.
    Error(String),
}

/// A finite, single-pass, cancellable stream of chunks. Dropping the stream
/// releases the underlying backend connection; no chunks are buffered
/// indefinitely.
pub type ChunkStream = BoxStream<'static, StreamChunk>;
