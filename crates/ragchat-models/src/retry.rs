use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use ragchat_core::{ChatModel, ChatRequest, ChatResponse, ChatStream, RagError};

/// Backoff for transient provider failures: rate limits and timeouts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total tries, the first included. `1` disables retrying.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Wait before retry number `retry` (1-based), doubling from
    /// `base_delay` up to `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// The wait before another try, or `None` when `error` is final after
    /// `attempts` tries.
    fn next_delay(&self, attempts: usize, error: &RagError) -> Option<Duration> {
        (error.is_retryable() && attempts < self.max_attempts)
            .then(|| self.backoff(attempts as u32))
    }
}

/// Wraps a completion model with [`RetryPolicy`].
///
/// A streamed answer is only retried while nothing has been yielded yet;
/// once a delta reached the caller, a later error ends the stream.
pub struct RetryChatModel {
    inner: Arc<dyn ChatModel>,
    policy: RetryPolicy,
}

impl RetryChatModel {
    pub fn new(inner: Arc<dyn ChatModel>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl ChatModel for RetryChatModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RagError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let error = match self.inner.chat(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };
            let Some(delay) = self.policy.next_delay(attempts, &error) else {
                return Err(error);
            };
            tracing::warn!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "model call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn stream_chat(&self, request: ChatRequest) -> ChatStream<'_> {
        Box::pin(async_stream::stream! {
            let mut attempts = 0;
            'attempts: loop {
                attempts += 1;
                let mut yielded = false;
                let mut inner = self.inner.stream_chat(request.clone());
                while let Some(item) = inner.next().await {
                    match item {
                        Ok(chunk) => {
                            yielded = true;
                            yield Ok(chunk);
                        }
                        Err(e) => {
                            if !yielded {
                                if let Some(delay) = self.policy.next_delay(attempts, &e) {
                                    tracing::warn!(
                                        attempt = attempts,
                                        delay_ms = delay.as_millis() as u64,
                                        error = %e,
                                        "stream failed before first delta, retrying"
                                    );
                                    tokio::time::sleep(delay).await;
                                    continue 'attempts;
                                }
                            }
                            yield Err(e);
                            break 'attempts;
                        }
                    }
                }
                break;
            }
        })
    }
}
