mod common;

use std::sync::atomic::Ordering;

use futures::StreamExt;

use assistant_core::{LlmContext, ProviderError, ProviderKind, StreamChunk};
use common::{registry_with, MockBehavior, MockProvider};
use fallback_chain::{ChainError, FallbackChain};

fn order() -> Vec<ProviderKind> {
    vec![ProviderKind::OpenAi, ProviderKind::Gemini, ProviderKind::Local]
}

/// **Test:** a retryable failure on the first provider fails over to the
/// second, and the second becomes the sticky hint for the next turn.
#[tokio::test]
async fn retryable_failure_fails_over_and_updates_sticky() {
    let openai = MockProvider::new(ProviderKind::OpenAi, MockBehavior::RateLimited);
    let gemini = MockProvider::new(ProviderKind::Gemini, MockBehavior::Succeed("from gemini"));
    let registry = registry_with(&[
        (ProviderKind::OpenAi, openai.clone()),
        (ProviderKind::Gemini, gemini.clone()),
    ]);
    let chain = FallbackChain::new(registry, order());
    let ctx = LlmContext::empty();

    let text = chain.complete("hello", &ctx).await.unwrap();
    assert_eq!(text, "from gemini");
    assert_eq!(chain.last_successful(), Some(ProviderKind::Gemini));

    // Second turn goes straight to the sticky provider.
    let text = chain.complete("hello again", &ctx).await.unwrap();
    assert_eq!(text, "from gemini");
    assert_eq!(openai.complete_calls.load(Ordering::SeqCst), 1);
    assert_eq!(gemini.complete_calls.load(Ordering::SeqCst), 2);
}

/// **Test:** a content-filter block aborts the whole chain without trying
/// any other provider.
#[tokio::test]
async fn content_filtered_aborts_without_fallback() {
    let openai = MockProvider::new(ProviderKind::OpenAi, MockBehavior::ContentFiltered);
    let gemini = MockProvider::new(ProviderKind::Gemini, MockBehavior::Succeed("masked"));
    let registry = registry_with(&[
        (ProviderKind::OpenAi, openai.clone()),
        (ProviderKind::Gemini, gemini.clone()),
    ]);
    let chain = FallbackChain::new(registry, order());

    let err = chain
        .complete("hello", &LlmContext::empty())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ChainError::Provider(ProviderError::ContentFiltered { .. })
    ));
    assert_eq!(openai.complete_calls.load(Ordering::SeqCst), 1);
    assert_eq!(gemini.complete_calls.load(Ordering::SeqCst), 0);
    assert_eq!(chain.last_successful(), None);
}

/// **Test:** unavailable providers are skipped without a generation attempt.
#[tokio::test]
async fn unavailable_providers_are_skipped() {
    let openai = MockProvider::new(ProviderKind::OpenAi, MockBehavior::Unavailable);
    let gemini = MockProvider::new(ProviderKind::Gemini, MockBehavior::Succeed("ok"));
    let registry = registry_with(&[
        (ProviderKind::OpenAi, openai.clone()),
        (ProviderKind::Gemini, gemini.clone()),
    ]);
    let chain = FallbackChain::new(registry, order());

    let text = chain.complete("hello", &LlmContext::empty()).await.unwrap();
    assert_eq!(text, "ok");
    assert_eq!(openai.complete_calls.load(Ordering::SeqCst), 0);
}

/// **Test:** exhausting every provider yields `AllFailed` carrying one
/// attempt record per backend.
#[tokio::test]
async fn exhaustion_aggregates_every_attempt() {
    let openai = MockProvider::new(ProviderKind::OpenAi, MockBehavior::RateLimited);
    let gemini = MockProvider::new(ProviderKind::Gemini, MockBehavior::NetworkError);
    let registry = registry_with(&[
        (ProviderKind::OpenAi, openai),
        (ProviderKind::Gemini, gemini),
    ]);
    // Local is built by the registry on demand and always reports
    // unavailable, so it is skipped.
    let chain = FallbackChain::new(registry, order());

    let err = chain
        .complete("hello", &LlmContext::empty())
        .await
        .unwrap_err();
    match err {
        ChainError::AllFailed { summary, attempts } => {
            assert_eq!(attempts.len(), 3);
            assert!(summary.contains("openai"));
            assert!(summary.contains("gemini"));
        }
        other => panic!("expected AllFailed, got {other}"),
    }
}

/// **Test:** a stream that errors before any content is skipped silently and
/// the next provider serves the turn.
#[tokio::test]
async fn stream_error_before_content_fails_over_silently() {
    let openai = MockProvider::new(
        ProviderKind::OpenAi,
        MockBehavior::StreamThenError(vec![], "boom"),
    );
    let gemini = MockProvider::new(
        ProviderKind::Gemini,
        MockBehavior::StreamOk(vec!["hel", "lo"]),
    );
    let registry = registry_with(&[
        (ProviderKind::OpenAi, openai.clone()),
        (ProviderKind::Gemini, gemini.clone()),
    ]);
    let chain = FallbackChain::new(registry, order());

    let chunks: Vec<StreamChunk> = chain
        .stream_complete("hello", &LlmContext::empty())
        .await
        .collect()
        .await;

    // No error chunk reached the consumer.
    assert!(chunks
        .iter()
        .all(|c| !matches!(c, StreamChunk::Error(_))));
    let text: String = chunks
        .iter()
        .filter_map(|c| match c {
            StreamChunk::Content(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "hello");
    assert_eq!(chain.last_successful(), Some(ProviderKind::Gemini));
}

/// **Test:** once a provider has produced content, a later stream error is
/// terminal: the error is forwarded and no other provider is tried.
#[tokio::test]
async fn stream_error_after_content_is_terminal() {
    let openai = MockProvider::new(
        ProviderKind::OpenAi,
        MockBehavior::StreamThenError(vec!["partial "], "connection dropped"),
    );
    let gemini = MockProvider::new(
        ProviderKind::Gemini,
        MockBehavior::StreamOk(vec!["never seen"]),
    );
    let registry = registry_with(&[
        (ProviderKind::OpenAi, openai.clone()),
        (ProviderKind::Gemini, gemini.clone()),
    ]);
    let chain = FallbackChain::new(registry, order());

    let chunks: Vec<StreamChunk> = chain
        .stream_complete("hello", &LlmContext::empty())
        .await
        .collect()
        .await;

    assert_eq!(chunks[0], StreamChunk::Content("partial ".to_string()));
    assert!(matches!(chunks.last(), Some(StreamChunk::Error(_))));
    assert_eq!(gemini.stream_calls.load(Ordering::SeqCst), 0);
}

/// **Test:** when every streaming attempt produces no content, the consumer
/// sees exactly one terminal error chunk.
#[tokio::test]
async fn stream_total_failure_emits_single_error_chunk() {
    let openai = MockProvider::new(
        ProviderKind::OpenAi,
        MockBehavior::StreamThenError(vec![], "down"),
    );
    let gemini = MockProvider::new(
        ProviderKind::Gemini,
        MockBehavior::StreamThenError(vec![], "also down"),
    );
    let registry = registry_with(&[
        (ProviderKind::OpenAi, openai),
        (ProviderKind::Gemini, gemini),
    ]);
    let chain = FallbackChain::new(registry, order());

    let chunks: Vec<StreamChunk> = chain
        .stream_complete("hello", &LlmContext::empty())
        .await
        .collect()
        .await;

    assert_eq!(chunks.len(), 1);
    match &chunks[0] {
        StreamChunk::Error(message) => {
            assert!(message.contains("all providers failed"));
            assert!(message.contains("down"));
        }
        other => panic!("expected error chunk, got {other:?}"),
    }
}

/// **Test:** chain status short-circuits at the first available provider.
#[tokio::test]
async fn chain_status_short_circuits_on_first_available() {
    let openai = MockProvider::new(ProviderKind::OpenAi, MockBehavior::Unavailable);
    let gemini = MockProvider::new(ProviderKind::Gemini, MockBehavior::Succeed("ok"));
    let local = MockProvider::new(ProviderKind::Local, MockBehavior::Succeed("offline"));
    let registry = registry_with(&[
        (ProviderKind::OpenAi, openai),
        (ProviderKind::Gemini, gemini),
        (ProviderKind::Local, local.clone()),
    ]);
    let chain = FallbackChain::new(registry, order());

    let entries = chain.chain_status().await;
    assert_eq!(entries.len(), 2);
    assert!(!entries[0].report.available);
    assert!(entries[1].report.available);
    assert_eq!(entries[1].provider, ProviderKind::Gemini);
}
