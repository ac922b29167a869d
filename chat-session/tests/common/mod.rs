//! Shared doubles for session tests: a scriptable provider and a static
//! health data source.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_stream::wrappers::ReceiverStream;

use assistant_core::{
    BiometricSample, ChunkStream, FinishReason, HealthProfile, HealthReport, LlmContext,
    PlanFlags, ProviderError, ProviderKind, StreamChunk,
};
use chat_session::HealthDataSource;
use llm_providers::{ConfigUpdate, LlmProvider, ModelInfo, ProviderConfig, ProviderRegistry};

#[derive(Clone)]
pub enum ScriptedBehavior {
    StreamOk(Vec<&'static str>),
    StreamError(&'static str),
}

pub struct ScriptedProvider {
    kind: ProviderKind,
    behavior: ScriptedBehavior,
    pub stream_calls: AtomicUsize,
    /// History length observed on each streaming call.
    pub seen_history_lens: Mutex<Vec<usize>>,
}

impl ScriptedProvider {
    pub fn new(kind: ProviderKind, behavior: ScriptedBehavior) -> Arc<Self> {
        Arc::new(Self {
            kind,
            behavior,
            stream_calls: AtomicUsize::new(0),
            seen_history_lens: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        "Scripted"
    }

    fn config(&self) -> ProviderConfig {
        ProviderConfig::for_provider(self.kind)
    }

    fn set_config(&self, _update: &ConfigUpdate) {}

    fn models(&self) -> &'static [ModelInfo] {
        llm_providers::models_for(self.kind)
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn health_check(&self) -> HealthReport {
        HealthReport::available(1)
    }

    async fn complete(
        &self,
        _user_prompt: &str,
        _ctx: &LlmContext,
    ) -> Result<String, ProviderError> {
        match &self.behavior {
            ScriptedBehavior::StreamOk(parts) => Ok(parts.concat()),
            ScriptedBehavior::StreamError(message) => Err(ProviderError::NetworkError {
                provider: self.kind,
                message: message.to_string(),
            }),
        }
    }

    async fn stream_complete(&self, _user_prompt: &str, ctx: &LlmContext) -> ChunkStream {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_history_lens
            .lock()
            .unwrap()
            .push(ctx.conversation_history.len());

        let chunks: Vec<StreamChunk> = match &self.behavior {
            ScriptedBehavior::StreamOk(parts) => parts
                .iter()
                .map(|p| StreamChunk::Content(p.to_string()))
                .chain(std::iter::once(StreamChunk::Done(FinishReason::Stop)))
                .collect(),
            ScriptedBehavior::StreamError(message) => {
                vec![StreamChunk::Error(message.to_string())]
            }
        };

        let (tx, rx) = tokio::sync::mpsc::channel(32);
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(chunk).await.is_err() {
                    return;
                }
            }
        });
        Box::pin(ReceiverStream::new(rx))
    }
}

pub struct StaticHealthSource {
    pub profile: Option<HealthProfile>,
    pub biometrics: Vec<BiometricSample>,
    pub plans: PlanFlags,
}

impl StaticHealthSource {
    pub fn empty() -> Self {
        Self {
            profile: None,
            biometrics: Vec::new(),
            plans: PlanFlags::default(),
        }
    }
}

#[async_trait]
impl HealthDataSource for StaticHealthSource {
    async fn health_profile(&self, _user_id: &str) -> Option<HealthProfile> {
        self.profile.clone()
    }

    async fn recent_biometrics(&self, _user_id: &str) -> Vec<BiometricSample> {
        self.biometrics.clone()
    }

    async fn plan_flags(&self, _user_id: &str) -> PlanFlags {
        self.plans
    }
}

pub fn registry_with(mocks: &[(ProviderKind, Arc<ScriptedProvider>)]) -> Arc<ProviderRegistry> {
    let registry = Arc::new(ProviderRegistry::new());
    for (kind, provider) in mocks {
        registry.register(*kind, provider.clone());
    }
    registry
}
