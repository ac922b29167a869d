//! Provider registry: owns one adapter instance per backend and hands out
//! shared handles.
//!
//! Adapters are created lazily on first request and reused afterwards, so a
//! config update through the registry is visible to every holder of the
//! handle. Tests can [`register`](ProviderRegistry::register) substitutes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use assistant_core::ProviderKind;

use crate::config::{ConfigUpdate, EnvSettings, ProviderConfig};
use crate::{GeminiProvider, LlmProvider, LocalProvider, OpenAiProvider, ProviderInfo};

pub struct ProviderRegistry {
    providers: Mutex<HashMap<ProviderKind, Arc<dyn LlmProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// Builds a registry with cloud credentials taken from the environment.
    pub fn from_env(settings: &EnvSettings) -> Self {
        let registry = Self::new();

        if let Some(key) = &settings.openai_api_key {
            let mut update = ConfigUpdate::default().with_api_key(key.clone());
            if let Some(base) = &settings.openai_base_url {
                update = update.with_endpoint(base.clone());
            }
            registry.update_config(ProviderKind::OpenAi, &update);
        }
        if let Some(key) = &settings.gemini_api_key {
            let mut update = ConfigUpdate::default().with_api_key(key.clone());
            if let Some(base) = &settings.gemini_base_url {
                update = update.with_endpoint(base.clone());
            }
            registry.update_config(ProviderKind::Gemini, &update);
        }

        registry
    }

    fn build(kind: ProviderKind) -> Arc<dyn LlmProvider> {
        let config = ProviderConfig::for_provider(kind);
        match kind {
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config)),
            ProviderKind::Gemini => Arc::new(GeminiProvider::new(config)),
            ProviderKind::Local => Arc::new(LocalProvider::new(config)),
        }
    }

    /// Returns the shared adapter for `kind`, creating it on first use.
    pub fn get(&self, kind: ProviderKind) -> Arc<dyn LlmProvider> {
        let mut providers = self.providers.lock().unwrap_or_else(|e| e.into_inner());
        providers
            .entry(kind)
            .or_insert_with(|| {
                info!(provider = %kind, "initializing provider adapter");
                Self::build(kind)
            })
            .clone()
    }

    /// Rebuilds the adapter for `kind` with an explicit config, replacing
    /// any cached instance.
    pub fn get_with_config(
        &self,
        kind: ProviderKind,
        config: ProviderConfig,
    ) -> Arc<dyn LlmProvider> {
        let provider: Arc<dyn LlmProvider> = match kind {
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config)),
            ProviderKind::Gemini => Arc::new(GeminiProvider::new(config)),
            ProviderKind::Local => Arc::new(LocalProvider::new(config)),
        };
        self.register(kind, provider.clone());
        provider
    }

    /// Replaces the adapter for `kind`. Used by tests to inject doubles.
    pub fn register(&self, kind: ProviderKind, provider: Arc<dyn LlmProvider>) {
        self.providers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind, provider);
    }

    /// Drops the cached adapter so the next [`get`](Self::get) builds a
    /// fresh one with default config.
    pub fn reset(&self, kind: ProviderKind) {
        self.providers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&kind);
    }

    /// Drops every cached adapter. Used on configuration teardown; all
    /// subsequent [`get`](Self::get) calls build fresh default instances.
    pub fn reset_all(&self) {
        self.providers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn update_config(&self, kind: ProviderKind, update: &ConfigUpdate) {
        self.get(kind).set_config(update);
    }

    pub async fn is_available(&self, kind: ProviderKind) -> bool {
        self.get(kind).is_available().await
    }

    /// First provider in `order` that reports itself available.
    pub async fn best_available(&self, order: &[ProviderKind]) -> Option<Arc<dyn LlmProvider>> {
        for &kind in order {
            let provider = self.get(kind);
            if provider.is_available().await {
                return Some(provider);
            }
        }
        None
    }

    pub fn provider_info(&self, kind: ProviderKind) -> ProviderInfo {
        let provider = self.get(kind);
        let config = provider.config();
        let (description, requires_api_key, supports_offline) = match kind {
            ProviderKind::OpenAi => ("OpenAI GPT models via the chat completions API", true, false),
            ProviderKind::Gemini => ("Google Gemini models via the generative language API", true, false),
            ProviderKind::Local => ("On-device fallback with offline support", false, true),
        };
        ProviderInfo {
            kind,
            name: provider.name(),
            description,
            models: provider.models(),
            is_configured: !requires_api_key || config.api_key.is_some(),
            requires_api_key,
            supports_streaming: true,
            supports_offline,
        }
    }

    /// Metadata for every backend, in catalog order.
    pub fn all_provider_info(&self) -> Vec<ProviderInfo> {
        [ProviderKind::OpenAi, ProviderKind::Gemini, ProviderKind::Local]
            .into_iter()
            .map(|kind| self.provider_info(kind))
            .collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
