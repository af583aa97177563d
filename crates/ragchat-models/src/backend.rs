use std::{collections::VecDeque, pin::Pin, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::Stream;
use ragchat_core::RagError;
use serde_json::Value;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: Value,
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<bytes::Bytes, RagError>> + Send>>;

/// Transport seam between a provider adapter and the network.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, RagError>;
    async fn send_stream(&self, request: ProviderRequest) -> Result<ByteStream, RagError>;
}

/// Production backend using reqwest.
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Backend whose requests fail with `RagError::Timeout` after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn builder(&self, request: &ProviderRequest) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(&request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        builder.json(&request.body)
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn map_transport_error(context: &str, e: reqwest::Error) -> RagError {
    if e.is_timeout() {
        RagError::Timeout(format!("{context}: {e}"))
    } else {
        RagError::Model(format!("{context}: {e}"))
    }
}

#[async_trait]
impl ProviderBackend for HttpBackend {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, RagError> {
        let response = self
            .builder(&request)
            .send()
            .await
            .map_err(|e| map_transport_error("HTTP request failed", e))?;

        let status = response.status().as_u16();
        let body: Value = response
            .json()
            .await
            .map_err(|e| RagError::Parsing(format!("failed to parse response JSON: {e}")))?;

        Ok(ProviderResponse { status, body })
    }

    async fn send_stream(&self, request: ProviderRequest) -> Result<ByteStream, RagError> {
        use futures::StreamExt;

        let response = self
            .builder(&request)
            .send()
            .await
            .map_err(|e| map_transport_error("HTTP stream request failed", e))?;

        let stream = response
            .bytes_stream()
            .map(|result| result.map_err(|e| map_transport_error("stream error", e)));

        Ok(Box::pin(stream))
    }
}

/// Test backend with queued responses and stream chunks.
pub struct FakeBackend {
    responses: Arc<Mutex<VecDeque<Result<ProviderResponse, RagError>>>>,
    stream_chunks: Arc<Mutex<VecDeque<Vec<bytes::Bytes>>>>,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            stream_chunks: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push_response(&self, response: ProviderResponse) -> &Self {
        self.responses
            .try_lock()
            .expect("not concurrent during setup")
            .push_back(Ok(response));
        self
    }

    pub fn push_error(&self, error: RagError) -> &Self {
        self.responses
            .try_lock()
            .expect("not concurrent during setup")
            .push_back(Err(error));
        self
    }

    pub fn push_stream_chunks(&self, chunks: Vec<bytes::Bytes>) -> &Self {
        self.stream_chunks
            .try_lock()
            .expect("not concurrent during setup")
            .push_back(chunks);
        self
    }

    /// Requests seen so far, oldest first.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderBackend for FakeBackend {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, RagError> {
        self.requests.lock().await.push(request);
        let mut responses = self.responses.lock().await;
        responses
            .pop_front()
            .unwrap_or_else(|| Err(RagError::Model("FakeBackend exhausted".to_string())))
    }

    async fn send_stream(&self, request: ProviderRequest) -> Result<ByteStream, RagError> {
        self.requests.lock().await.push(request);
        let mut stream_chunks = self.stream_chunks.lock().await;
        let chunks = stream_chunks.pop_front().unwrap_or_default();

        let stream = futures::stream::iter(chunks.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }
}
