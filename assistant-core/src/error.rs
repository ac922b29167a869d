//! Provider error taxonomy.
//!
//! Every adapter failure is typed with a `retryable` classification that the
//! fallback orchestrator uses as its sole branching signal: retryable errors
//! fail over to the next backend, non-retryable errors abort the whole chain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProviderKind;

/// Typed failure from one provider adapter.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Credential rejected by the backend. User must reconfigure.
    #[error("{provider}: invalid API key")]
    ApiKeyInvalid { provider: ProviderKind },

    /// No credential configured for a backend that needs one.
    #[error("{provider}: API key not configured")]
    ApiKeyMissing { provider: ProviderKind },

    /// Backend rate limit hit; a later backend (or retry) may succeed.
    #[error("{provider}: rate limited: {message}")]
    RateLimited {
        provider: ProviderKind,
        message: String,
    },

    /// The request exceeds the model's context window. The message must be
    /// shortened; trying another backend will not help.
    #[error("{provider}: context too long: {message}")]
    ContextTooLong {
        provider: ProviderKind,
        message: String,
    },

    /// The selected model is not available on this backend right now.
    #[error("{provider}: model not available: {model}")]
    ModelNotAvailable {
        provider: ProviderKind,
        model: String,
    },

    #[error("{provider}: network error: {message}")]
    NetworkError {
        provider: ProviderKind,
        message: String,
    },

    /// The backend blocked the content on policy grounds. Must never be
    /// papered over by trying another backend.
    #[error("{provider}: content filtered: {message}")]
    ContentFiltered {
        provider: ProviderKind,
        message: String,
    },

    /// The local model file is not loaded. The local adapter answers through
    /// its rule-based responder instead of surfacing this to the user.
    #[error("{provider}: local model not loaded")]
    LocalModelNotLoaded { provider: ProviderKind },

    /// Anything else, including responses with no usable content.
    /// Retryable by default.
    #[error("{provider}: {message}")]
    Provider {
        provider: ProviderKind,
        message: String,
    },
}

impl ProviderError {
    /// Whether the fallback chain may try the next backend after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. }
            | ProviderError::NetworkError { .. }
            | ProviderError::ModelNotAvailable { .. }
            | ProviderError::Provider { .. } => true,
            ProviderError::ApiKeyInvalid { .. }
            | ProviderError::ApiKeyMissing { .. }
            | ProviderError::ContextTooLong { .. }
            | ProviderError::ContentFiltered { .. }
            | ProviderError::LocalModelNotLoaded { .. } => false,
        }
    }

    /// Which backend produced the error.
    pub fn provider(&self) -> ProviderKind {
        match self {
            ProviderError::ApiKeyInvalid { provider }
            | ProviderError::ApiKeyMissing { provider }
            | ProviderError::RateLimited { provider, .. }
            | ProviderError::ContextTooLong { provider, .. }
            | ProviderError::ModelNotAvailable { provider, .. }
            | ProviderError::NetworkError { provider, .. }
            | ProviderError::ContentFiltered { provider, .. }
            | ProviderError::LocalModelNotLoaded { provider }
            | ProviderError::Provider { provider, .. } => *provider,
        }
    }
}

/// Result of a provider health probe. Probes never fail; every outcome is
/// reported in the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub available: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

impl HealthReport {
    pub fn available(latency_ms: u64) -> Self {
        Self {
            available: true,
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            available: false,
            latency_ms: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification_matches_taxonomy() {
        let p = ProviderKind::OpenAi;
        assert!(ProviderError::RateLimited {
            provider: p,
            message: "429".into()
        }
        .is_retryable());
        assert!(ProviderError::NetworkError {
            provider: p,
            message: "refused".into()
        }
        .is_retryable());
        assert!(!ProviderError::ContentFiltered {
            provider: p,
            message: "policy".into()
        }
        .is_retryable());
        assert!(!ProviderError::ApiKeyMissing { provider: p }.is_retryable());
        assert!(!ProviderError::ContextTooLong {
            provider: p,
            message: "too long".into()
        }
        .is_retryable());
    }

    #[test]
    fn error_reports_originating_provider() {
        let err = ProviderError::ApiKeyInvalid {
            provider: ProviderKind::Gemini,
        };
        assert_eq!(err.provider(), ProviderKind::Gemini);
    }
}
