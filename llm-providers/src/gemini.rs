//! Gemini adapter: direct reqwest client for the Generative Language API
//! (generateContent and SSE streamGenerateContent).
//!
//! Gemini has no separate system role, so the system prompt and history are
//! folded into one text prompt.

use std::sync::RwLock;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
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

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Authenticated client state: http client, key, and endpoint move together.
#[derive(Clone)]
struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

struct Inner {
    config: ProviderConfig,
    client: Option<GeminiClient>,
    last_health_ok: Option<bool>,
}

/// Adapter for the Google Gemini API.
pub struct GeminiProvider {
    inner: RwLock<Inner>,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiResponse {
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.as_ref()?.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().map(|p| p.text.as_str()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl GeminiProvider {
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

    fn snapshot(&self) -> (Option<GeminiClient>, ProviderConfig) {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        (inner.client.clone(), inner.config.clone())
    }

    fn record_health(&self, ok: bool) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.last_health_ok = Some(ok);
    }
}

fn build_client(config: &ProviderConfig) -> Option<GeminiClient> {
    let api_key = config.api_key.clone()?;
    Some(GeminiClient {
        http: reqwest::Client::new(),
        api_key,
        base_url: config
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
    })
}

/// Folds the system prompt, bounded history, and current message into one
/// text prompt, since the API takes no separate system message.
fn build_prompt(user_prompt: &str, ctx: &LlmContext) -> String {
    let mut full = format!(
        "Instructions for this conversation:\n{}\n\n",
        build_system_prompt(ctx)
    );

    let history = ctx.bounded_history();
    if !history.is_empty() {
        full.push_str("Previous conversation:\n");
        for msg in history {
            let role = match msg.role {
                MessageRole::Assistant => "Assistant",
                _ => "User",
            };
            full.push_str(&format!("{}: {}\n", role, msg.content));
        }
        full.push('\n');
    }

    full.push_str(&format!("User: {}\n\nAssistant:", user_prompt));
    full
}

fn build_request(config: &ProviderConfig, full_prompt: String) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            parts: vec![GeminiPart { text: full_prompt }],
        }],
        generation_config: GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_tokens,
            top_p: config.top_p,
        },
    }
}

fn map_status_error(status: u16, body: &str) -> ProviderError {
    let provider = ProviderKind::Gemini;
    let lower = body.to_lowercase();
    if status == 401 || status == 403 || lower.contains("api_key_invalid") || lower.contains("api key")
    {
        ProviderError::ApiKeyInvalid { provider }
    } else if status == 429 || lower.contains("rate_limit") || lower.contains("quota") {
        ProviderError::RateLimited {
            provider,
            message: body.to_string(),
        }
    } else if lower.contains("token") && lower.contains("exceed") {
        ProviderError::ContextTooLong {
            provider,
            message: body.to_string(),
        }
    } else if lower.contains("safety") || lower.contains("blocked") {
        ProviderError::ContentFiltered {
            provider,
            message: body.to_string(),
        }
    } else if status == 404 && lower.contains("model") {
        ProviderError::ModelNotAvailable {
            provider,
            model: body.to_string(),
        }
    } else {
        ProviderError::Provider {
            provider,
            message: format!("HTTP {status}: {body}"),
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    ProviderError::NetworkError {
        provider: ProviderKind::Gemini,
        message: e.to_string(),
    }
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "PROHIBITED_CONTENT" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

async fn generate(
    client: &GeminiClient,
    config: &ProviderConfig,
    full_prompt: String,
) -> Result<GeminiResponse, ProviderError> {
    let url = format!(
        "{}/v1beta/models/{}:generateContent?key={}",
        client.base_url, config.model, client.api_key
    );
    let body = build_request(config, full_prompt);

    let resp = client
        .http
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(map_transport_error)?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(map_status_error(status, &text));
    }

    resp.json::<GeminiResponse>()
        .await
        .map_err(map_transport_error)
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn name(&self) -> &'static str {
        "Google Gemini"
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
            inner.client = build_client(&inner.config);
            inner.last_health_ok = None;
        }
    }

    fn models(&self) -> &'static [ModelInfo] {
        catalog::GEMINI_MODELS
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

        let start = Instant::now();
        match generate(&client, &config, "Hi".to_string()).await {
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
            provider: ProviderKind::Gemini,
        })?;

        info!(
            model = %config.model,
            api_key = %mask_token(&client.api_key),
            "Gemini completion request"
        );

        let response = generate(&client, &config, build_prompt(user_prompt, ctx)).await?;

        if let Some(feedback) = &response.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(ProviderError::ContentFiltered {
                    provider: ProviderKind::Gemini,
                    message: format!("blocked: {reason}"),
                });
            }
        }

        response.text().ok_or_else(|| ProviderError::Provider {
            provider: ProviderKind::Gemini,
            message: "no content in response".to_string(),
        })
    }

    #[instrument(skip(self, user_prompt, ctx))]
    async fn stream_complete(&self, user_prompt: &str, ctx: &LlmContext) -> ChunkStream {
        let (client, config) = self.snapshot();
        let full_prompt = build_prompt(user_prompt, ctx);
        let (tx, rx) = mpsc::channel::<StreamChunk>(32);

        tokio::spawn(async move {
            let Some(client) = client else {
                let _ = tx
                    .send(StreamChunk::Error(
                        "Gemini client not initialized; configure an API key".to_string(),
                    ))
                    .await;
                return;
            };

            let url = format!(
                "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
                client.base_url, config.model, client.api_key
            );
            let body = build_request(&config, full_prompt);

            let resp = match client
                .http
                .post(&url)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    let _ = tx
                        .send(StreamChunk::Error(map_transport_error(e).to_string()))
                        .await;
                    return;
                }
            };

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let text = resp.text().await.unwrap_or_default();
                let _ = tx
                    .send(StreamChunk::Error(map_status_error(status, &text).to_string()))
                    .await;
                return;
            }

            let mut byte_stream = resp.bytes_stream();
            let mut buffer = String::new();
            let mut finish = FinishReason::Stop;

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!(error = %e, "Gemini stream transport error");
                        let _ = tx
                            .send(StreamChunk::Error(map_transport_error(e).to_string()))
                            .await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE framing: one JSON payload per "data: " line.
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer = buffer[pos + 1..].to_string();

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let Ok(event) = serde_json::from_str::<GeminiResponse>(data) else {
                        continue;
                    };

                    if let Some(feedback) = &event.prompt_feedback {
                        if let Some(reason) = &feedback.block_reason {
                            let _ = tx
                                .send(StreamChunk::Error(format!(
                                    "content blocked by safety settings: {reason}"
                                )))
                                .await;
                            return;
                        }
                    }

                    if let Some(text) = event.text() {
                        if tx.send(StreamChunk::Content(text)).await.is_err() {
                            // Consumer dropped the stream; stop pulling.
                            return;
                        }
                    }
                    if let Some(reason) = event
                        .candidates
                        .as_ref()
                        .and_then(|c| c.first())
                        .and_then(|c| c.finish_reason.as_deref())
                    {
                        finish = map_finish_reason(reason);
                    }
                }
            }

            let _ = tx.send(StreamChunk::Done(finish)).await;
        });

        Box::pin(ReceiverStream::new(rx))
    }
}
