//! Shared mock provider for orchestrator tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_stream::wrappers::ReceiverStream;

use assistant_core::{
    ChunkStream, FinishReason, HealthReport, LlmContext, ProviderError, ProviderKind, StreamChunk,
};
use llm_providers::{ConfigUpdate, LlmProvider, ModelInfo, ProviderConfig, ProviderRegistry};

/// What the mock does when asked to generate.
#[derive(Clone)]
pub enum MockBehavior {
    Succeed(&'static str),
    RateLimited,
    ContentFiltered,
    NetworkError,
    Unavailable,
    /// Streams the given content chunks then a clean `Done(Stop)`.
    StreamOk(Vec<&'static str>),
    /// Streams the given content chunks (possibly none) then an error chunk.
    StreamThenError(Vec<&'static str>, &'static str),
}

pub struct MockProvider {
    kind: ProviderKind,
    behavior: MockBehavior,
    pub complete_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(kind: ProviderKind, behavior: MockBehavior) -> Arc<Self> {
        Arc::new(Self {
            kind,
            behavior,
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
        })
    }

    fn error(&self) -> ProviderError {
        match self.behavior {
            MockBehavior::RateLimited => ProviderError::RateLimited {
                provider: self.kind,
                message: "429".to_string(),
            },
            MockBehavior::ContentFiltered => ProviderError::ContentFiltered {
                provider: self.kind,
                message: "policy".to_string(),
            },
            _ => ProviderError::NetworkError {
                provider: self.kind,
                message: "connection reset".to_string(),
            },
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        "Mock"
    }

    fn config(&self) -> ProviderConfig {
        ProviderConfig::for_provider(self.kind)
    }

    fn set_config(&self, _update: &ConfigUpdate) {}

    fn models(&self) -> &'static [ModelInfo] {
        llm_providers::models_for(self.kind)
    }

    async fn is_available(&self) -> bool {
        !matches!(self.behavior, MockBehavior::Unavailable)
    }

    async fn health_check(&self) -> HealthReport {
        if self.is_available().await {
            HealthReport::available(1)
        } else {
            HealthReport::unavailable("mock unavailable")
        }
    }

    async fn complete(
        &self,
        _user_prompt: &str,
        _ctx: &LlmContext,
    ) -> Result<String, ProviderError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::Succeed(text) => Ok(text.to_string()),
            MockBehavior::StreamOk(chunks) => Ok(chunks.concat()),
            _ => Err(self.error()),
        }
    }

    async fn stream_complete(&self, _user_prompt: &str, _ctx: &LlmContext) -> ChunkStream {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let chunks: Vec<StreamChunk> = match &self.behavior {
            MockBehavior::Succeed(text) => vec![
                StreamChunk::Content(text.to_string()),
                StreamChunk::Done(FinishReason::Stop),
            ],
            MockBehavior::StreamOk(parts) => parts
                .iter()
                .map(|p| StreamChunk::Content(p.to_string()))
                .chain(std::iter::once(StreamChunk::Done(FinishReason::Stop)))
                .collect(),
            MockBehavior::StreamThenError(parts, error) => parts
                .iter()
                .map(|p| StreamChunk::Content(p.to_string()))
                .chain(std::iter::once(StreamChunk::Error(error.to_string())))
                .collect(),
            _ => vec![StreamChunk::Error(self.error().to_string())],
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

/// Registry pre-loaded with mocks for the given behaviors.
pub fn registry_with(
    mocks: &[(ProviderKind, Arc<MockProvider>)],
) -> Arc<ProviderRegistry> {
    let registry = Arc::new(ProviderRegistry::new());
    for (kind, provider) in mocks {
        registry.register(*kind, provider.clone());
    }
    registry
}
