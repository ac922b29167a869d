//! On-device fallback provider.
//!
//! No inference runtime ships yet, so this adapter answers from a small set
//! of rule-based health responses personalized from the caller's context.
//! It reports itself unavailable so the chain only reaches it after every
//! cloud provider has failed.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, instrument};

use assistant_core::{
    ChunkStream, FinishReason, HealthReport, LlmContext, ProviderError, ProviderKind, StreamChunk,
};

use crate::config::{ConfigUpdate, ProviderConfig};
use crate::{catalog, LlmProvider, ModelInfo};

/// Rule-based responder standing in for a local inference runtime.
pub struct LocalProvider {
    inner: RwLock<ProviderConfig>,
}

impl LocalProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            inner: RwLock::new(config),
        }
    }

    /// Returns the not-loaded error a real model load would clear.
    pub fn load_model(&self) -> Result<(), ProviderError> {
        Err(ProviderError::LocalModelNotLoaded {
            provider: ProviderKind::Local,
        })
    }
}

fn contains_any(input: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| input.contains(k))
}

/// Picks a canned response bucket from the message and personalizes it with
/// whatever context is on hand.
fn rule_based_response(user_prompt: &str, ctx: &LlmContext) -> String {
    let lower = user_prompt.to_lowercase();

    if contains_any(&lower, &["emergency", "chest pain", "can't breathe", "911"]) {
        return "If you are experiencing a medical emergency, please call 911 (US) or your \
                local emergency number immediately. Do not wait for an app response."
            .to_string();
    }

    if contains_any(&lower, &["eat", "diet", "food", "meal", "nutrition"]) {
        let mut response = String::from(
            "I'm currently offline, so here is general guidance: aim for balanced meals with \
             vegetables, lean protein, whole grains, and plenty of water.",
        );
        let conditions: Vec<&str> = ctx
            .health_profile
            .as_ref()
            .map(|p| p.conditions.iter().map(|c| c.name.as_str()).collect())
            .unwrap_or_default();
        if !conditions.is_empty() {
            response.push_str(&format!(
                " Since you manage {}, please confirm dietary changes with your care team.",
                conditions.join(", ")
            ));
        }
        return response;
    }

    if contains_any(&lower, &["exercise", "workout", "run", "training", "gym"]) {
        let mut response = String::from(
            "I'm currently offline, so here is general guidance: regular moderate activity, \
             such as 30 minutes of brisk walking most days, benefits nearly everyone.",
        );
        let recent_steps: u64 = ctx.recent_biometrics.iter().map(|s| s.steps).sum();
        if !ctx.recent_biometrics.is_empty() {
            let avg = recent_steps / ctx.recent_biometrics.len() as u64;
            response.push_str(&format!(
                " Your recent average of {avg} steps per day is a good base to build on."
            ));
        }
        return response;
    }

    if contains_any(&lower, &["supplement", "vitamin", "protein powder", "creatine"]) {
        return "I'm currently offline, so I can only offer general guidance: supplements are \
                not a substitute for a balanced diet, and some interact with medications. \
                Please check with a pharmacist or doctor before starting one."
            .to_string();
    }

    "I'm currently in offline mode with limited capabilities. I can offer general wellness \
     guidance, but for personalized advice please try again when you're back online, or \
     consult a healthcare professional."
        .to_string()
}

#[async_trait]
impl LlmProvider for LocalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn name(&self) -> &'static str {
        "On-Device Model"
    }

    fn config(&self) -> ProviderConfig {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_config(&self, update: &ConfigUpdate) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .apply(update);
    }

    fn models(&self) -> &'static [ModelInfo] {
        catalog::LOCAL_MODELS
    }

    /// Always false: this provider is a last resort, never a preferred pick.
    async fn is_available(&self) -> bool {
        false
    }

    async fn health_check(&self) -> HealthReport {
        HealthReport::unavailable("local model not loaded")
    }

    #[instrument(skip(self, user_prompt, ctx))]
    async fn complete(
        &self,
        user_prompt: &str,
        ctx: &LlmContext,
    ) -> Result<String, ProviderError> {
        info!("serving rule-based offline response");
        Ok(rule_based_response(user_prompt, ctx))
    }

    #[instrument(skip(self, user_prompt, ctx))]
    async fn stream_complete(&self, user_prompt: &str, ctx: &LlmContext) -> ChunkStream {
        let response = rule_based_response(user_prompt, ctx);
        let (tx, rx) = mpsc::channel::<StreamChunk>(32);

        tokio::spawn(async move {
            // Emit word by word so the UI sees the same cadence as a cloud
            // provider, just faster.
            for word in response.split_inclusive(' ') {
                if tx
                    .send(StreamChunk::Content(word.to_string()))
                    .await
                    .is_err()
                {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            let _ = tx.send(StreamChunk::Done(FinishReason::Stop)).await;
        });

        Box::pin(ReceiverStream::new(rx))
    }
}
