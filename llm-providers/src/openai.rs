//! OpenAI adapter: wraps [async-openai] for chat completion (non-stream and
//! stream), mapping backend failures into the provider error taxonomy.

use std::sync::RwLock;
use std::time::Instant;

use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, FinishReason as OpenAiFinishReason,
};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, instrument, warn};

use assistant_core::{
    ChunkStream, FinishReason, HealthReport, LlmContext, MessageRole, ProviderError, ProviderKind,
    StreamChunk,
};
use prompt::build_system_prompt;

use crate::config::{mask_token, ConfigUpdate, ProviderConfig};
use crate::{catalog, LlmProvider, ModelInfo};

struct Inner {
    config: ProviderConfig,
    client: Option<Client<OpenAIConfig>>,
    /// Outcome of the last health probe; `None` before the first probe.
    last_health_ok: Option<bool>,
}

/// Adapter for the OpenAI chat completions API.
pub struct OpenAiProvider {
    inner: RwLock<Inner>,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = build_client(&config);
        Self {
            inner: RwLock::new(Inner {
                config,
                client,
                last_health_ok: None,
            }),
        }
    }

    /// Snapshot of the client and config so no lock is held across awaits.
    fn snapshot(&self) -> (Option<Client<OpenAIConfig>>, ProviderConfig) {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        (inner.client.clone(), inner.config.clone())
    }

    fn record_health(&self, ok: bool) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.last_health_ok = Some(ok);
    }
}

fn build_client(config: &ProviderConfig) -> Option<Client<OpenAIConfig>> {
    let api_key = config.api_key.as_deref()?;
    let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(endpoint) = &config.endpoint {
        openai_config = openai_config.with_api_base(endpoint);
    }
    Some(Client::with_config(openai_config))
}

fn build_messages(
    user_prompt: &str,
    ctx: &LlmContext,
) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    let mut messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(build_system_prompt(ctx))
            .build()?
            .into(),
    ];

    for msg in ctx.bounded_history() {
        match msg.role {
            MessageRole::User => messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.content.clone())
                    .build()?
                    .into(),
            ),
            MessageRole::Assistant => messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(msg.content.clone())
                    .build()?
                    .into(),
            ),
            // History system entries are already folded into the system prompt.
            MessageRole::System => {}
        }
    }

    messages.push(
        ChatCompletionRequestUserMessageArgs::default()
            .content(user_prompt.to_string())
            .build()?
            .into(),
    );

    Ok(messages)
}

fn build_request(
    config: &ProviderConfig,
    messages: Vec<ChatCompletionRequestMessage>,
) -> Result<async_openai::types::CreateChatCompletionRequest, OpenAIError> {
    let mut args = CreateChatCompletionRequestArgs::default();
    args.model(&config.model)
        .messages(messages)
        .temperature(config.temperature)
        .max_tokens(config.max_tokens);
    if let Some(top_p) = config.top_p {
        args.top_p(top_p);
    }
    if let Some(frequency_penalty) = config.frequency_penalty {
        args.frequency_penalty(frequency_penalty);
    }
    if let Some(presence_penalty) = config.presence_penalty {
        args.presence_penalty(presence_penalty);
    }
    args.build()
}

fn map_error(err: OpenAIError) -> ProviderError {
    let provider = ProviderKind::OpenAi;
    match err {
        OpenAIError::ApiError(api) => {
            let message = api.message.clone();
            let lower = message.to_lowercase();
            if lower.contains("api key") {
                ProviderError::ApiKeyInvalid { provider }
            } else if lower.contains("rate limit") || lower.contains("quota") {
                ProviderError::RateLimited { provider, message }
            } else if lower.contains("context length") || lower.contains("maximum context") {
                ProviderError::ContextTooLong { provider, message }
            } else if lower.contains("content management") || lower.contains("content policy") {
                ProviderError::ContentFiltered { provider, message }
            } else if lower.contains("does not exist") && lower.contains("model") {
                ProviderError::ModelNotAvailable {
                    provider,
                    model: message,
                }
            } else {
                ProviderError::Provider { provider, message }
            }
        }
        OpenAIError::Reqwest(e) => ProviderError::NetworkError {
            provider,
            message: e.to_string(),
        },
        other => ProviderError::Provider {
            provider,
            message: other.to_string(),
        },
    }
}

fn map_finish_reason(reason: OpenAiFinishReason) -> FinishReason {
    match reason {
        OpenAiFinishReason::Stop => FinishReason::Stop,
        OpenAiFinishReason::Length => FinishReason::Length,
        OpenAiFinishReason::ContentFilter => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn name(&self) -> &'static str {
        "OpenAI"
    }

    fn config(&self) -> ProviderConfig {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .config
            .clone()
    }

    fn set_config(&self, update: &ConfigUpdate) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.config.apply(update);
        if update.changes_credentials() || inner.client.is_none() {
            // Client and config swap together under the write lock; readers
            // never observe a half-updated credential/client pair.
            inner.client = build_client(&inner.config);
            inner.last_health_ok = None;
        }
    }

    fn models(&self) -> &'static [ModelInfo] {
        catalog::OPENAI_MODELS
    }

    async fn is_available(&self) -> bool {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.client.is_some() && inner.last_health_ok.unwrap_or(true)
    }

    async fn health_check(&self) -> HealthReport {
        let (client, config) = self.snapshot();
        let Some(client) = client else {
            return HealthReport::unavailable("API key not configured");
        };

        let probe = ChatCompletionRequestUserMessageArgs::default()
            .content("Hi")
            .build();
        let probe: ChatCompletionRequestMessage = match probe {
            Ok(msg) => msg.into(),
            Err(e) => return HealthReport::unavailable(e.to_string()),
        };
        let request = match CreateChatCompletionRequestArgs::default()
            .model(&config.model)
            .messages(vec![probe])
            .max_tokens(5u32)
            .build()
        {
            Ok(request) => request,
            Err(e) => return HealthReport::unavailable(e.to_string()),
        };

        let start = Instant::now();
        match client.chat().create(request).await {
            Ok(_) => {
                self.record_health(true);
                HealthReport::available(start.elapsed().as_millis() as u64)
            }
            Err(e) => {
                self.record_health(false);
                HealthReport {
                    available: false,
                    latency_ms: Some(start.elapsed().as_millis() as u64),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    #[instrument(skip(self, user_prompt, ctx))]
    async fn complete(
        &self,
        user_prompt: &str,
        ctx: &LlmContext,
    ) -> Result<String, ProviderError> {
        let (client, config) = self.snapshot();
        let client = client.ok_or(ProviderError::ApiKeyMissing {
            provider: ProviderKind::OpenAi,
        })?;

        info!(
            model = %config.model,
            api_key = %config.api_key.as_deref().map(mask_token).unwrap_or_else(|| "***".into()),
            "OpenAI completion request"
        );

        let messages = build_messages(user_prompt, ctx).map_err(map_error)?;
        let request = build_request(&config, messages).map_err(map_error)?;

        let response = client.chat().create(request).await.map_err(map_error)?;

        if let Some(usage) = &response.usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "OpenAI completion usage"
            );
        }

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ProviderError::Provider {
                provider: ProviderKind::OpenAi,
                message: "no content in response".to_string(),
            })
    }

    #[instrument(skip(self, user_prompt, ctx))]
    async fn stream_complete(&self, user_prompt: &str, ctx: &LlmContext) -> ChunkStream {
        let (client, config) = self.snapshot();
        let (tx, rx) = mpsc::channel::<StreamChunk>(32);

        let messages = build_messages(user_prompt, ctx);

        tokio::spawn(async move {
            let Some(client) = client else {
                let _ = tx
                    .send(StreamChunk::Error(
                        "OpenAI client not initialized; configure an API key".to_string(),
                    ))
                    .await;
                return;
            };

            let request = match messages.and_then(|m| build_request(&config, m)) {
                Ok(request) => request,
                Err(e) => {
                    let _ = tx.send(StreamChunk::Error(map_error(e).to_string())).await;
                    return;
                }
            };

            let mut stream = match client.chat().create_stream(request).await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(StreamChunk::Error(map_error(e).to_string())).await;
                    return;
                }
            };

            while let Some(result) = stream.next().await {
                match result {
                    Ok(response) => {
                        let Some(choice) = response.choices.first() else {
                            continue;
                        };
                        if let Some(content) = &choice.delta.content {
                            if !content.is_empty()
                                && tx.send(StreamChunk::Content(content.clone())).await.is_err()
                            {
                                // Consumer dropped the stream; stop pulling.
                                return;
                            }
                        }
                        if let Some(reason) = choice.finish_reason {
                            let _ = tx.send(StreamChunk::Done(map_finish_reason(reason))).await;
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "OpenAI stream error");
                        let _ = tx.send(StreamChunk::Error(map_error(e).to_string())).await;
                        return;
                    }
                }
            }

            // Backend closed the stream without a finish reason.
            let _ = tx.send(StreamChunk::Done(FinishReason::Stop)).await;
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    fn api_error(message: &str) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: message.to_string(),
            r#type: None,
            param: None,
            code: None,
        })
    }

    #[test]
    fn maps_api_errors_into_taxonomy() {
        assert!(matches!(
            map_error(api_error("Incorrect API key provided")),
            ProviderError::ApiKeyInvalid { .. }
        ));
        assert!(matches!(
            map_error(api_error("Rate limit reached for requests")),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(
            map_error(api_error("This model's maximum context length is 8192 tokens")),
            ProviderError::ContextTooLong { .. }
        ));
        assert!(matches!(
            map_error(api_error("flagged by our content management policy")),
            ProviderError::ContentFiltered { .. }
        ));
        assert!(matches!(
            map_error(api_error("something else went wrong")),
            ProviderError::Provider { .. }
        ));
    }

    #[tokio::test]
    async fn unconfigured_adapter_is_unavailable_and_fails_complete() {
        let provider = OpenAiProvider::new(ProviderConfig::for_provider(ProviderKind::OpenAi));
        assert!(!provider.is_available().await);

        let err = provider
            .complete("hi", &LlmContext::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ApiKeyMissing { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn setting_api_key_initializes_client() {
        let provider = OpenAiProvider::new(ProviderConfig::for_provider(ProviderKind::OpenAi));
        provider.set_config(&ConfigUpdate::new().with_api_key("sk-test"));
        assert!(provider.is_available().await);
        assert_eq!(provider.config().api_key.as_deref(), Some("sk-test"));
    }
}
