//! Static model catalog: the selectable models per backend with their context
//! windows, output caps, and per-1k-token cost. Pure data.

use assistant_core::ProviderKind;
use serde::Serialize;

/// One selectable model on one backend. Immutable, statically registered.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Context window size in tokens.
    pub context_window: u32,
    pub max_output_tokens: u32,
    /// USD per 1k tokens; `None` for local models.
    pub cost_per_1k_tokens: Option<f64>,
    pub is_default: bool,
}

pub static OPENAI_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gpt-4o",
        name: "GPT-4o",
        description: "Most capable model, best for complex health queries",
        context_window: 128_000,
        max_output_tokens: 4_096,
        cost_per_1k_tokens: Some(0.005),
        is_default: true,
    },
    ModelInfo {
        id: "gpt-4o-mini",
        name: "GPT-4o Mini",
        description: "Fast and affordable, good for most queries",
        context_window: 128_000,
        max_output_tokens: 16_384,
        cost_per_1k_tokens: Some(0.00015),
        is_default: false,
    },
    ModelInfo {
        id: "gpt-3.5-turbo",
        name: "GPT-3.5 Turbo",
        description: "Legacy model, fastest response times",
        context_window: 16_385,
        max_output_tokens: 4_096,
        cost_per_1k_tokens: Some(0.0005),
        is_default: false,
    },
];

pub static GEMINI_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gemini-2.5-flash",
        name: "Gemini 2.5 Flash",
        description: "Fast and efficient, latest generation",
        context_window: 1_000_000,
        max_output_tokens: 8_192,
        cost_per_1k_tokens: Some(0.0001),
        is_default: true,
    },
    ModelInfo {
        id: "gemini-2.0-flash",
        name: "Gemini 2.0 Flash",
        description: "Previous generation flash model",
        context_window: 1_000_000,
        max_output_tokens: 8_192,
        cost_per_1k_tokens: Some(0.0001),
        is_default: false,
    },
    ModelInfo {
        id: "gemini-1.5-pro",
        name: "Gemini 1.5 Pro",
        description: "Most capable Gemini model",
        context_window: 1_000_000,
        max_output_tokens: 8_192,
        cost_per_1k_tokens: Some(0.00125),
        is_default: false,
    },
];

pub static LOCAL_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "llama-3-8b-health",
        name: "Llama 3 8B (Health)",
        description: "Local model fine-tuned for health queries",
        context_window: 8_192,
        max_output_tokens: 2_048,
        cost_per_1k_tokens: None,
        is_default: true,
    },
    ModelInfo {
        id: "phi-3-mini",
        name: "Phi-3 Mini",
        description: "Small but capable local model",
        context_window: 4_096,
        max_output_tokens: 1_024,
        cost_per_1k_tokens: None,
        is_default: false,
    },
];

/// The static catalog for one backend.
pub fn models_for(kind: ProviderKind) -> &'static [ModelInfo] {
    match kind {
        ProviderKind::OpenAi => OPENAI_MODELS,
        ProviderKind::Gemini => GEMINI_MODELS,
        ProviderKind::Local => LOCAL_MODELS,
    }
}

/// The default model for one backend. Every catalog has exactly one default.
pub fn default_model(kind: ProviderKind) -> &'static ModelInfo {
    let models = models_for(kind);
    models
        .iter()
        .find(|m| m.is_default)
        .unwrap_or(&models[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_backend_has_exactly_one_default() {
        for kind in [ProviderKind::OpenAi, ProviderKind::Gemini, ProviderKind::Local] {
            let defaults = models_for(kind).iter().filter(|m| m.is_default).count();
            assert_eq!(defaults, 1, "{kind} should have one default model");
        }
    }

    #[test]
    fn default_models_match_catalog() {
        assert_eq!(default_model(ProviderKind::OpenAi).id, "gpt-4o");
        assert_eq!(default_model(ProviderKind::Gemini).id, "gemini-2.5-flash");
        assert_eq!(default_model(ProviderKind::Local).id, "llama-3-8b-health");
    }

    #[test]
    fn cloud_models_have_cost_local_models_do_not() {
        assert!(OPENAI_MODELS.iter().all(|m| m.cost_per_1k_tokens.is_some()));
        assert!(GEMINI_MODELS.iter().all(|m| m.cost_per_1k_tokens.is_some()));
        assert!(LOCAL_MODELS.iter().all(|m| m.cost_per_1k_tokens.is_none()));
    }
}
