//! # chat-session
//!
//! The per-turn state machine tying the pieces together: sanitize the input,
//! short-circuit emergencies with a canned crisis response, assemble the
//! health context, stream the reply through the fallback chain, and commit
//! the exchange to storage. One in-flight turn per conversation is the
//! caller's contract.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;
use tracing::{info, instrument, warn};

use assistant_core::{
    BiometricSample, ChatMessage, ContextSnapshot, Conversation, HealthProfile, LlmContext,
    Message, MessageRole, PlanFlags, ProviderKind, SafetyAction, SafetyFlag, SafetyFlagKind,
    StreamChunk,
};
use fallback_chain::{ChainError, FallbackChain};
use llm_providers::ProviderRegistry;
use prompt::{detect_emergency, emergency_response, sanitize_user_input, EmergencyKind};
use storage::{ConversationStore, StorageError};

/// Live health data for one user, read fresh at the start of every turn.
#[async_trait]
pub trait HealthDataSource: Send + Sync {
    async fn health_profile(&self, user_id: &str) -> Option<HealthProfile>;

    /// Rolling window of daily aggregates, oldest first.
    async fn recent_biometrics(&self, user_id: &str) -> Vec<BiometricSample>;

    async fn plan_flags(&self, user_id: &str) -> PlanFlags;
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The stream errored after partial output; nothing was committed for
    /// the assistant side of the turn.
    #[error("stream aborted: {0}")]
    StreamAborted(String),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How many prior messages are included in the provider context.
    pub history_limit: usize,
    /// Derived conversation titles are cut to this many characters.
    pub title_max_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: 10,
            title_max_chars: 50,
        }
    }
}

/// What a completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub conversation_id: String,
    pub user_message: Message,
    pub assistant_message: Message,
    /// True when the turn was answered by the crisis responder without any
    /// provider call.
    pub emergency: bool,
}

pub struct ChatSession {
    registry: Arc<ProviderRegistry>,
    chain: Arc<FallbackChain>,
    store: Arc<dyn ConversationStore>,
    health: Arc<dyn HealthDataSource>,
    config: SessionConfig,
}

fn derive_title(content: &str, max_chars: usize) -> String {
    let truncated: String = content.chars().take(max_chars).collect();
    if content.chars().count() > max_chars {
        format!("{truncated}...")
    } else {
        truncated
    }
}

fn snapshot_from(
    profile: &Option<HealthProfile>,
    biometrics: &[BiometricSample],
) -> ContextSnapshot {
    let latest = biometrics.last();
    ContextSnapshot {
        recent_steps: latest.map(|s| s.steps),
        recent_sleep: latest.map(|s| s.sleep_hours),
        active_conditions: profile
            .as_ref()
            .map(|p| p.conditions.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default(),
    }
}

fn history_to_chat(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| match m.role {
            MessageRole::Assistant => ChatMessage::assistant(&m.content),
            MessageRole::System => ChatMessage::system(&m.content),
            MessageRole::User => ChatMessage::user(&m.content),
        })
        .collect()
}

impl ChatSession {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        chain: Arc<FallbackChain>,
        store: Arc<dyn ConversationStore>,
        health: Arc<dyn HealthDataSource>,
        config: SessionConfig,
    ) -> Self {
        Self {
            registry,
            chain,
            store,
            health,
            config,
        }
    }

    /// Starts a fresh conversation for the user, seeded with the first
    /// backend in the chain order and its current model.
    pub async fn new_conversation(&self, user_id: &str) -> Result<Conversation, SessionError> {
        let kind = self
            .chain
            .last_successful()
            .or_else(|| self.chain.order().first().copied())
            .unwrap_or(ProviderKind::Local);
        let model = self.registry.get(kind).config().model;
        let conversation = Conversation::new(user_id, kind, model);
        self.store.create_conversation(&conversation).await?;
        Ok(conversation)
    }

    pub async fn list_conversations(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Conversation>, SessionError> {
        Ok(self.store.list_recent(user_id, limit).await?)
    }

    pub async fn conversation_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, SessionError> {
        Ok(self.store.list_messages(conversation_id).await?)
    }

    pub async fn archive_conversation(&self, conversation_id: &str) -> Result<(), SessionError> {
        Ok(self.store.set_archived(conversation_id, true).await?)
    }

    /// Deletes the conversation and its messages.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<bool, SessionError> {
        Ok(self.store.delete_conversation(conversation_id).await?)
    }

    /// Runs one user turn. `on_delta` observes content increments as they
    /// stream, for live UI updates; the committed assistant message carries
    /// the full accumulated text.
    #[instrument(skip(self, content, on_delta))]
    pub async fn send_message<F>(
        &self,
        user_id: &str,
        conversation_id: Option<&str>,
        content: &str,
        mut on_delta: F,
    ) -> Result<TurnOutcome, SessionError>
    where
        F: FnMut(&str) + Send,
    {
        let sanitized = sanitize_user_input(content);

        let conversation = match conversation_id {
            Some(id) => self
                .store
                .get_conversation(id)
                .await?
                .ok_or_else(|| StorageError::NotFound(id.to_string()))?,
            None => self.new_conversation(user_id).await?,
        };
        let first_exchange = conversation.message_count == 0;

        let profile = self.health.health_profile(user_id).await;
        let biometrics = self.health.recent_biometrics(user_id).await;
        let snapshot = snapshot_from(&profile, &biometrics);

        // Emergency turns never reach a generation backend.
        let emergency = detect_emergency(&sanitized);
        if emergency.is_emergency {
            let kind = emergency.kind.unwrap_or(EmergencyKind::Unknown);
            warn!(
                conversation_id = %conversation.id,
                keywords = ?emergency.matched_keywords,
                "emergency detected, short-circuiting turn"
            );

            let flag_kind = match kind {
                EmergencyKind::MentalHealth => SafetyFlagKind::SelfHarm,
                _ => SafetyFlagKind::Emergency,
            };
            let user_message = Message::new(&conversation.id, MessageRole::User, &sanitized)
                .with_safety_flag(SafetyFlag {
                    kind: flag_kind,
                    description: format!(
                        "Emergency keywords detected: {}",
                        emergency.matched_keywords.join(", ")
                    ),
                    triggered: true,
                    action: SafetyAction::Warn,
                })
                .with_context_snapshot(snapshot);
            self.store.append_message(&user_message).await?;

            let mut assistant_message = Message::new(
                &conversation.id,
                MessageRole::Assistant,
                emergency_response(kind),
            );
            assistant_message.provider_used = Some(ProviderKind::Local);
            self.store.append_message(&assistant_message).await?;

            if first_exchange {
                self.store
                    .set_title(
                        &conversation.id,
                        &derive_title(&sanitized, self.config.title_max_chars),
                    )
                    .await?;
            }

            return Ok(TurnOutcome {
                conversation_id: conversation.id,
                user_message,
                assistant_message,
                emergency: true,
            });
        }

        let history = self
            .store
            .recent_messages(&conversation.id, self.config.history_limit as i64)
            .await?;
        let ctx = LlmContext {
            health_profile: profile,
            recent_biometrics: biometrics,
            plans: Some(self.health.plan_flags(user_id).await),
            conversation_history: history_to_chat(&history),
            max_history_messages: self.config.history_limit,
        };

        let user_message = Message::new(&conversation.id, MessageRole::User, &sanitized)
            .with_context_snapshot(snapshot);
        self.store.append_message(&user_message).await?;

        let start = Instant::now();
        let mut stream = self.chain.stream_complete(&sanitized, &ctx).await;
        let mut accumulated = String::new();

        while let Some(chunk) = stream.next().await {
            match chunk {
                StreamChunk::Content(delta) => {
                    on_delta(&delta);
                    accumulated.push_str(&delta);
                }
                StreamChunk::Done(reason) => {
                    info!(
                        conversation_id = %conversation.id,
                        finish_reason = ?reason,
                        chars = accumulated.len(),
                        "assistant turn complete"
                    );
                    break;
                }
                StreamChunk::Error(message) => {
                    warn!(
                        conversation_id = %conversation.id,
                        error = %message,
                        "stream aborted, assistant message not committed"
                    );
                    return Err(SessionError::StreamAborted(message));
                }
            }
        }
        let latency_ms = start.elapsed().as_millis() as u64;

        let provider_used = self.chain.last_successful();
        let model_used = provider_used.map(|kind| self.registry.get(kind).config().model);

        let mut assistant_message =
            Message::new(&conversation.id, MessageRole::Assistant, &accumulated);
        assistant_message.provider_used = provider_used;
        assistant_message.model_used = model_used;
        assistant_message.latency_ms = Some(latency_ms);
        self.store.append_message(&assistant_message).await?;

        if first_exchange {
            self.store
                .set_title(
                    &conversation.id,
                    &derive_title(&sanitized, self.config.title_max_chars),
                )
                .await?;
        }

        Ok(TurnOutcome {
            conversation_id: conversation.id,
            user_message,
            assistant_message,
            emergency: false,
        })
    }
}
