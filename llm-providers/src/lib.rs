//! # llm-providers
//!
//! Uniform abstraction over the generation backends: the [`LlmProvider`]
//! trait, the static model catalog, the three concrete adapters (OpenAI,
//! Gemini, local rule-based), and the [`ProviderRegistry`] that owns adapter
//! lifecycle.
//!
//! The provider set is closed ([`ProviderKind`]): the registry switches on it
//! explicitly, adapters are sealed cases, and callers hold `Arc<dyn
//! LlmProvider>` handles.

use assistant_core::{ChunkStream, HealthReport, LlmContext, ProviderError, ProviderKind};
use async_trait::async_trait;
use serde::Serialize;

pub mod catalog;
pub mod config;
mod gemini;
mod local;
mod openai;
mod registry;

pub use catalog::{default_model, models_for, ModelInfo, GEMINI_MODELS, LOCAL_MODELS, OPENAI_MODELS};
pub use config::{mask_token, ConfigUpdate, EnvSettings, ProviderConfig};
pub use gemini::GeminiProvider;
pub use local::LocalProvider;
pub use openai::OpenAiProvider;
pub use registry::ProviderRegistry;

/// The uniform capability interface every backend adapter implements.
///
/// All methods are safe to call concurrently from different turns; an
/// adapter's authenticated client is replaced atomically on reconfiguration
/// so no caller observes a half-updated credential/client pair.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn name(&self) -> &'static str;

    /// Snapshot of the current config.
    fn config(&self) -> ProviderConfig;

    /// Merge-updates the config. When the credential or endpoint changed,
    /// the underlying authenticated client is rebuilt before this returns.
    fn set_config(&self, update: &ConfigUpdate);

    /// Static per-backend catalog.
    fn models(&self) -> &'static [ModelInfo];

    /// Cheap capability check: credential configured and the last health
    /// probe (if any) succeeded. No network round-trip.
    async fn is_available(&self) -> bool;

    /// One minimal real round-trip with latency measurement. Never errors;
    /// all failure is reported inside the result.
    async fn health_check(&self) -> HealthReport;

    /// Synchronous single-shot generation. Builds the system prompt from
    /// `ctx`, applies the sampling config, and returns the generated text.
    async fn complete(&self, user_prompt: &str, ctx: &LlmContext)
        -> Result<String, ProviderError>;

    /// Incremental generation with the same semantics as [`complete`].
    /// Finite and single-pass; a fresh call re-issues a fresh backend
    /// request. Mid-stream failure yields a terminal
    /// [`StreamChunk::Error`](assistant_core::StreamChunk::Error) instead of
    /// panicking, so the consumer decides whether to fail over. Dropping the
    /// stream cancels the underlying request.
    async fn stream_complete(&self, user_prompt: &str, ctx: &LlmContext) -> ChunkStream;
}

/// Backend metadata for configuration surfaces (settings UI, diagnostics).
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub kind: ProviderKind,
    pub name: &'static str,
    pub description: &'static str,
    pub models: &'static [ModelInfo],
    pub is_configured: bool,
    pub requires_api_key: bool,
    pub supports_streaming: bool,
    pub supports_offline: bool,
}
