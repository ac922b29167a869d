//! Provider configuration: the live per-adapter config, the merge-update
//! partial, and env-based bootstrap.

use assistant_core::ProviderKind;
use std::env;

use crate::catalog;

/// Live configuration of one adapter. An adapter holds exactly one of these
/// and rebuilds its authenticated client whenever the credential or endpoint
/// changes.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub local_model_path: Option<String>,
    /// Sampling temperature, 0.0–2.0.
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
}

impl ProviderConfig {
    /// Defaults for one backend: its catalog default model, temperature 0.7,
    /// and an output cap suited to the backend.
    pub fn for_provider(provider: ProviderKind) -> Self {
        let max_tokens = match provider {
            ProviderKind::Local => 1024,
            _ => 2048,
        };
        Self {
            provider,
            model: catalog::default_model(provider).id.to_string(),
            api_key: None,
            endpoint: None,
            local_model_path: None,
            temperature: 0.7,
            max_tokens,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
        }
    }

    /// Merges a partial update into this config. Fields absent from the
    /// update keep their current values.
    pub fn apply(&mut self, update: &ConfigUpdate) {
        if let Some(model) = &update.model {
            self.model = model.clone();
        }
        if let Some(api_key) = &update.api_key {
            self.api_key = Some(api_key.clone());
        }
        if let Some(endpoint) = &update.endpoint {
            self.endpoint = Some(endpoint.clone());
        }
        if let Some(path) = &update.local_model_path {
            self.local_model_path = Some(path.clone());
        }
        if let Some(temperature) = update.temperature {
            self.temperature = temperature;
        }
        if let Some(max_tokens) = update.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(top_p) = update.top_p {
            self.top_p = Some(top_p);
        }
        if let Some(frequency_penalty) = update.frequency_penalty {
            self.frequency_penalty = Some(frequency_penalty);
        }
        if let Some(presence_penalty) = update.presence_penalty {
            self.presence_penalty = Some(presence_penalty);
        }
    }
}

/// Partial config for merge-updates. Builder-style setters; unset fields
/// leave the live config untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub local_model_path: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
}

impl ConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Whether applying this update requires rebuilding the authenticated
    /// client before the next call.
    pub fn changes_credentials(&self) -> bool {
        self.api_key.is_some() || self.endpoint.is_some()
    }
}

/// Provider settings read from the environment at startup.
/// Runtime reconfiguration goes through [`ConfigUpdate`] afterwards.
#[derive(Debug, Clone)]
pub struct EnvSettings {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: Option<String>,
    pub fallback_order: Vec<ProviderKind>,
}

impl EnvSettings {
    /// Reads `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `GEMINI_API_KEY`,
    /// `GEMINI_BASE_URL`, and `FALLBACK_ORDER` (comma-separated provider
    /// ids). A `.env` file is loaded first when present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let fallback_order = env::var("FALLBACK_ORDER")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .filter_map(|part| part.trim().parse().ok())
                    .collect::<Vec<ProviderKind>>()
            })
            .filter(|order| !order.is_empty())
            .unwrap_or_else(|| {
                vec![ProviderKind::OpenAi, ProviderKind::Gemini, ProviderKind::Local]
            });

        Self {
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|s| !s.is_empty()),
            openai_base_url: env::var("OPENAI_BASE_URL").ok().filter(|s| !s.is_empty()),
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|s| !s.is_empty()),
            gemini_base_url: env::var("GEMINI_BASE_URL").ok().filter(|s| !s.is_empty()),
            fallback_order,
        }
    }
}

/// Masks an API key for safe logging: first 7 chars + "***" + last 4 chars.
/// Keys of 11 chars or fewer become "***" so no part leaks.
pub fn mask_token(token: &str) -> String {
    let len = token.len();
    if len <= 11 {
        "***".to_string()
    } else {
        let head_len = 7.min(len);
        let tail_len = 4.min(len.saturating_sub(head_len));
        let head = &token[..head_len];
        let tail = if tail_len > 0 {
            &token[len - tail_len..]
        } else {
            ""
        };
        format!("{}***{}", head, tail)
    }
}
