//! # Fallback chain
//!
//! Orchestrates generation across the registered providers: builds a
//! try-order that prefers the last backend that succeeded (sticky hint),
//! skips unavailable backends, fails over on retryable errors, and aborts
//! immediately on non-retryable ones. Content-filter blocks are policy
//! decisions about the message itself and must surface to the caller rather
//! than be masked by another backend's answer.

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument, warn};

use assistant_core::{
    ChunkStream, FinishReason, HealthReport, LlmContext, ProviderError, ProviderKind, StreamChunk,
};
use llm_providers::ProviderRegistry;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Every backend in the try-order was exhausted without a success.
    #[error("all providers failed: {summary}")]
    AllFailed {
        summary: String,
        attempts: Vec<(ProviderKind, String)>,
    },
}

impl ChainError {
    fn all_failed(attempts: Vec<(ProviderKind, String)>) -> Self {
        let summary = summarize(&attempts);
        Self::AllFailed { summary, attempts }
    }
}

fn summarize(attempts: &[(ProviderKind, String)]) -> String {
    if attempts.is_empty() {
        return "no providers attempted".to_string();
    }
    attempts
        .iter()
        .map(|(kind, message)| format!("{kind}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Per-backend health result from [`FallbackChain::chain_status`].
#[derive(Debug, Clone)]
pub struct ChainStatusEntry {
    pub provider: ProviderKind,
    pub report: HealthReport,
}

/// Snapshot of the chain's current configuration and sticky state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub order: Vec<ProviderKind>,
    pub last_successful: Option<ProviderKind>,
}

pub struct FallbackChain {
    registry: Arc<ProviderRegistry>,
    order: Mutex<Vec<ProviderKind>>,
    last_successful: Arc<Mutex<Option<ProviderKind>>>,
}

impl FallbackChain {
    pub fn new(registry: Arc<ProviderRegistry>, order: Vec<ProviderKind>) -> Self {
        Self {
            registry,
            order: Mutex::new(order),
            last_successful: Arc::new(Mutex::new(None)),
        }
    }

    pub fn order(&self) -> Vec<ProviderKind> {
        self.order.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_order(&self, order: Vec<ProviderKind>) {
        *self.order.lock().unwrap_or_else(|e| e.into_inner()) = order;
    }

    pub fn config(&self) -> ChainConfig {
        ChainConfig {
            order: self.order(),
            last_successful: self.last_successful(),
        }
    }

    pub fn last_successful(&self) -> Option<ProviderKind> {
        *self
            .last_successful
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Sticky hint first, then the rest of the preference list.
    fn try_order(&self) -> Vec<ProviderKind> {
        let order = self.order();
        let sticky = self.last_successful();
        match sticky {
            Some(hint) => {
                let mut out = vec![hint];
                out.extend(order.into_iter().filter(|&k| k != hint));
                out
            }
            None => order,
        }
    }

    fn record_success(last_successful: &Mutex<Option<ProviderKind>>, kind: ProviderKind) {
        *last_successful.lock().unwrap_or_else(|e| e.into_inner()) = Some(kind);
    }

    /// Single-shot completion with failover.
    #[instrument(skip(self, prompt, ctx))]
    pub async fn complete(
        &self,
        prompt: &str,
        ctx: &LlmContext,
    ) -> Result<String, ChainError> {
        let try_order = self.try_order();
        let mut attempts: Vec<(ProviderKind, String)> = Vec::new();

        for kind in try_order {
            let provider = self.registry.get(kind);
            if !provider.is_available().await {
                debug!(provider = %kind, "skipping unavailable provider");
                attempts.push((kind, "not available".to_string()));
                continue;
            }

            info!(provider = %kind, "attempting completion");
            match provider.complete(prompt, ctx).await {
                Ok(text) => {
                    Self::record_success(&self.last_successful, kind);
                    return Ok(text);
                }
                Err(e) => {
                    warn!(provider = %kind, error = %e, "provider failed");
                    let retryable = e.is_retryable();
                    attempts.push((kind, e.to_string()));
                    if !retryable {
                        return Err(ChainError::Provider(e));
                    }
                }
            }
        }

        Err(ChainError::all_failed(attempts))
    }

    /// Streaming completion with failover. A backend that produced at least
    /// one content chunk is terminal: on a later error the error chunk is
    /// forwarded and no other backend is tried, since the consumer has
    /// already rendered partial output. A backend erroring before any
    /// content is skipped silently.
    #[instrument(skip(self, prompt, ctx))]
    pub async fn stream_complete(&self, prompt: &str, ctx: &LlmContext) -> ChunkStream {
        let try_order = self.try_order();
        let registry = Arc::clone(&self.registry);
        let last_successful = Arc::clone(&self.last_successful);
        let prompt = prompt.to_string();
        let ctx = ctx.clone();
        let (tx, rx) = mpsc::channel::<StreamChunk>(32);

        tokio::spawn(async move {
            let mut attempts: Vec<(ProviderKind, String)> = Vec::new();

            for kind in try_order {
                let provider = registry.get(kind);
                if !provider.is_available().await {
                    debug!(provider = %kind, "skipping unavailable provider");
                    attempts.push((kind, "not available".to_string()));
                    continue;
                }

                info!(provider = %kind, "attempting streaming completion");
                let mut stream = provider.stream_complete(&prompt, &ctx).await;
                let mut has_content = false;

                while let Some(chunk) = stream.next().await {
                    match chunk {
                        StreamChunk::Content(text) => {
                            has_content = true;
                            if tx.send(StreamChunk::Content(text)).await.is_err() {
                                return;
                            }
                        }
                        StreamChunk::Done(reason) => {
                            Self::record_success(&last_successful, kind);
                            let _ = tx.send(StreamChunk::Done(reason)).await;
                            return;
                        }
                        StreamChunk::Error(message) => {
                            if has_content {
                                // Partial output already reached the
                                // consumer; this backend is terminal.
                                warn!(provider = %kind, error = %message,
                                    "stream failed after partial output");
                                Self::record_success(&last_successful, kind);
                                let _ = tx.send(StreamChunk::Error(message)).await;
                                return;
                            }
                            warn!(provider = %kind, error = %message,
                                "stream failed before any output, failing over");
                            attempts.push((kind, message));
                            break;
                        }
                    }
                }

                if has_content {
                    // Backend closed without a finish marker; still terminal.
                    Self::record_success(&last_successful, kind);
                    let _ = tx.send(StreamChunk::Done(FinishReason::Stop)).await;
                    return;
                }
            }

            let _ = tx
                .send(StreamChunk::Error(format!(
                    "all providers failed: {}",
                    summarize(&attempts)
                )))
                .await;
        });

        Box::pin(ReceiverStream::new(rx))
    }

    /// Health-checks backends in preference order, short-circuiting once
    /// one reports available. Diagnostics only.
    pub async fn chain_status(&self) -> Vec<ChainStatusEntry> {
        let mut entries = Vec::new();
        for kind in self.order() {
            let report = self.registry.get(kind).health_check().await;
            let available = report.available;
            entries.push(ChainStatusEntry {
                provider: kind,
                report,
            });
            if available {
                break;
            }
        }
        entries
    }
}
