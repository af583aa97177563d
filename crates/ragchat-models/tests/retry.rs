use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use ragchat_core::{AIMessageChunk, ChatModel, ChatRequest, ChatResponse, ChatStream, RagError};
use ragchat_models::{RetryChatModel, RetryPolicy, ScriptedChatModel};

fn fast_policy(max_attempts: usize) -> RetryPolicy {
    RetryPolicy::new(max_attempts).with_base_delay(Duration::from_millis(1))
}

#[test]
fn backoff_doubles_up_to_the_cap() {
    let policy = RetryPolicy::new(5)
        .with_base_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_millis(350));
    assert_eq!(policy.backoff(1), Duration::from_millis(100));
    assert_eq!(policy.backoff(2), Duration::from_millis(200));
    assert_eq!(policy.backoff(3), Duration::from_millis(350));
    assert_eq!(RetryPolicy::new(0).max_attempts, 1);
}

#[tokio::test]
async fn retries_rate_limit_then_succeeds() {
    let inner = Arc::new(ScriptedChatModel::with_results(vec![
        Err(RagError::RateLimit("slow down".into())),
        Ok(ChatResponse::text("done")),
    ]));
    let model = RetryChatModel::new(inner.clone(), fast_policy(3));

    let resp = model.chat(ChatRequest::from_prompt("q")).await.unwrap();
    assert_eq!(resp.message.content(), "done");
    assert_eq!(inner.call_count().await, 2);
}

#[tokio::test]
async fn does_not_retry_model_errors() {
    let inner = Arc::new(ScriptedChatModel::with_results(vec![
        Err(RagError::Model("bad request".into())),
        Ok(ChatResponse::text("unused")),
    ]));
    let model = RetryChatModel::new(inner.clone(), fast_policy(3));

    let err = model.chat(ChatRequest::from_prompt("q")).await.unwrap_err();
    assert!(matches!(err, RagError::Model(_)));
    assert_eq!(inner.call_count().await, 1);
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let inner = Arc::new(ScriptedChatModel::with_results(vec![
        Err(RagError::Timeout("1".into())),
        Err(RagError::Timeout("2".into())),
        Ok(ChatResponse::text("too late")),
    ]));
    let model = RetryChatModel::new(inner.clone(), fast_policy(2));

    let err = model.chat(ChatRequest::from_prompt("q")).await.unwrap_err();
    assert!(matches!(err, RagError::Timeout(_)));
    assert_eq!(inner.call_count().await, 2);
}

#[tokio::test]
async fn stream_retries_failure_before_first_delta() {
    let inner = Arc::new(ScriptedChatModel::with_results(vec![
        Err(RagError::RateLimit("slow down".into())),
        Ok(ChatResponse::text("Article 5.")),
    ]));
    let model = RetryChatModel::new(inner.clone(), fast_policy(3));

    let chunks: Vec<_> = model.stream_chat(ChatRequest::from_prompt("q")).collect().await;
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].as_ref().unwrap().content, "Article 5.");
    assert_eq!(inner.call_count().await, 2);
}

/// Yields one delta, then times out.
struct CutOffModel {
    streams: AtomicUsize,
}

#[async_trait]
impl ChatModel for CutOffModel {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, RagError> {
        Err(RagError::Model("stream only".into()))
    }

    fn stream_chat(&self, _request: ChatRequest) -> ChatStream<'_> {
        self.streams.fetch_add(1, Ordering::SeqCst);
        Box::pin(futures::stream::iter(vec![
            Ok(AIMessageChunk {
                content: "Under article".into(),
                ..Default::default()
            }),
            Err(RagError::Timeout("read timed out".into())),
        ]))
    }
}

#[tokio::test]
async fn stream_error_after_a_delta_is_final() {
    let inner = Arc::new(CutOffModel {
        streams: AtomicUsize::new(0),
    });
    let model = RetryChatModel::new(inner.clone(), fast_policy(3));

    let chunks: Vec<_> = model.stream_chat(ChatRequest::from_prompt("q")).collect().await;
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].as_ref().unwrap().content, "Under article");
    assert!(matches!(chunks[1], Err(RagError::Timeout(_))));
    assert_eq!(inner.streams.load(Ordering::SeqCst), 1);
}
