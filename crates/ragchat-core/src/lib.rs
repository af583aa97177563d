use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A chat message. Tagged enum with System, Human and AI variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "system")]
    System {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    #[serde(rename = "human")]
    Human {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    #[serde(rename = "assistant")]
    AI {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage_metadata: Option<TokenUsage>,
    },
}

impl Message {
    // -- Factory methods -----------------------------------------------------

    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
            id: None,
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Message::Human {
            content: content.into(),
            id: None,
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Message::AI {
            content: content.into(),
            id: None,
            usage_metadata: None,
        }
    }

    // -- Builder methods -----------------------------------------------------

    pub fn with_id(mut self, value: impl Into<String>) -> Self {
        match &mut self {
            Message::System { id, .. } | Message::Human { id, .. } | Message::AI { id, .. } => {
                *id = Some(value.into());
            }
        }
        self
    }

    pub fn with_usage_metadata(mut self, usage: TokenUsage) -> Self {
        if let Message::AI { usage_metadata, .. } = &mut self {
            *usage_metadata = Some(usage);
        }
        self
    }

    // -- Accessor methods ----------------------------------------------------

    pub fn content(&self) -> &str {
        match self {
            Message::System { content, .. }
            | Message::Human { content, .. }
            | Message::AI { content, .. } => content,
        }
    }

    pub fn role(&self) -> &str {
        match self {
            Message::System { .. } => "system",
            Message::Human { .. } => "human",
            Message::AI { .. } => "assistant",
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Message::System { id, .. } | Message::Human { id, .. } | Message::AI { id, .. } => {
                id.as_deref()
            }
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Message::System { .. })
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Message::Human { .. })
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, Message::AI { .. })
    }

    pub fn usage_metadata(&self) -> Option<&TokenUsage> {
        match self {
            Message::AI { usage_metadata, .. } => usage_metadata.as_ref(),
            _ => None,
        }
    }
}

/// Convert messages to a human-readable buffer string.
pub fn get_buffer_string(messages: &[Message], human_prefix: &str, ai_prefix: &str) -> String {
    messages
        .iter()
        .map(|msg| {
            let prefix = match msg {
                Message::System { .. } => "System",
                Message::Human { .. } => human_prefix,
                Message::AI { .. } => ai_prefix,
            };
            format!("{prefix}: {}", msg.content())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// AIMessageChunk
// ---------------------------------------------------------------------------

/// A streaming delta from a model response. Merge with `+`/`+=` and convert
/// with `into_message()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AIMessageChunk {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl AIMessageChunk {
    pub fn into_message(self) -> Message {
        let mut message = Message::ai(self.content);
        if let Some(id) = self.id {
            message = message.with_id(id);
        }
        if let Some(usage) = self.usage {
            message = message.with_usage_metadata(usage);
        }
        message
    }
}

impl std::ops::Add for AIMessageChunk {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl std::ops::AddAssign for AIMessageChunk {
    fn add_assign(&mut self, rhs: Self) {
        self.content.push_str(&rhs.content);
        if self.id.is_none() {
            self.id = rhs.id;
        }
        match (&mut self.usage, rhs.usage) {
            (Some(u), Some(rhs_u)) => {
                u.input_tokens += rhs_u.input_tokens;
                u.output_tokens += rhs_u.output_tokens;
                u.total_tokens += rhs_u.total_tokens;
            }
            (None, Some(rhs_u)) => {
                self.usage = Some(rhs_u);
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Chat request / response
// ---------------------------------------------------------------------------

/// A request to a chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Single-turn request carrying one human prompt.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self::new(vec![Message::human(prompt)])
    }
}

/// A response from a chat model containing the AI message and optional token usage statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: Message,
    pub usage: Option<TokenUsage>,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: Message::ai(content),
            usage: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for ragchat with variants covering all subsystems.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("prompt error: {0}")]
    Prompt(String),
    #[error("model error: {0}")]
    Model(String),
    #[error("rate limit: {0}")]
    RateLimit(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("parsing error: {0}")]
    Parsing(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("vector store error: {0}")]
    VectorStore(String),
    #[error("retriever error: {0}")]
    Retriever(String),
    /// Every retriever consulted for a query failed. Distinct from a model
    /// error so the chat layer can answer "no information available".
    #[error("retrieval failed: {0}")]
    RetrievalFailed(String),
    #[error("rerank error: {0}")]
    Rerank(String),
    #[error("config error: {0}")]
    Config(String),
}

impl RagError {
    pub fn is_retrieval_failure(&self) -> bool {
        matches!(self, RagError::RetrievalFailed(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::RateLimit(_) | RagError::Timeout(_))
    }
}

// ---------------------------------------------------------------------------
// ChatModel
// ---------------------------------------------------------------------------

/// Type alias for a pinned, boxed async stream of `AIMessageChunk` results.
pub type ChatStream<'a> = Pin<Box<dyn Stream<Item = Result<AIMessageChunk, RagError>> + Send + 'a>>;

/// The completion service. `chat()` returns a whole response; `stream_chat()`
/// yields deltas and defaults to a single chunk built from `chat()`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RagError>;

    fn stream_chat(&self, request: ChatRequest) -> ChatStream<'_> {
        Box::pin(async_stream::stream! {
            match self.chat(request).await {
                Ok(response) => {
                    yield Ok(AIMessageChunk {
                        content: response.message.content().to_string(),
                        usage: response.usage,
                        ..Default::default()
                    });
                }
                Err(e) => yield Err(e),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Embeddings trait (implemented in ragchat-embeddings)
// ---------------------------------------------------------------------------

/// Trait for embedding text into vectors.
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Embed multiple texts (for batch document embedding).
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// Metadata key holding the originating file name of a chunk.
pub const FILE_NAME_KEY: &str = "file_name";

/// The smallest retrievable unit of source text. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Chunk {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            source_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(
        id: impl Into<String>,
        content: impl Into<String>,
        metadata: HashMap<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            source_id: None,
            metadata,
        }
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.metadata
            .insert(FILE_NAME_KEY.to_string(), Value::String(file_name.into()));
        self
    }

    pub fn file_name(&self) -> Option<&str> {
        self.metadata.get(FILE_NAME_KEY).and_then(Value::as_str)
    }
}

/// A chunk paired with a relevance score and the tag of the retriever that
/// produced it. Scores are only comparable within one retriever until fused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub retriever: String,
}

impl ScoredChunk {
    pub fn new(chunk: Chunk, score: f32, retriever: impl Into<String>) -> Self {
        Self {
            chunk,
            score,
            retriever: retriever.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.chunk.id
    }

    pub fn content(&self) -> &str {
        &self.chunk.content
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }
}

// ---------------------------------------------------------------------------
// Retriever trait (implementations in ragchat-retrieval / ragchat-vectorstores)
// ---------------------------------------------------------------------------

/// Returns chunks relevant to a query, best first.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Tag attached to every `ScoredChunk` this retriever produces.
    fn name(&self) -> &str {
        "retriever"
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, RagError>;
}

// ---------------------------------------------------------------------------
// VectorStore trait (implementations in ragchat-vectorstores)
// ---------------------------------------------------------------------------

/// Trait for vector storage backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Add chunks to the store, computing their embeddings.
    async fn add_chunks(
        &self,
        chunks: Vec<Chunk>,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<String>, RagError>;

    /// Search with cosine similarity scores (higher = more similar).
    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<(Chunk, f32)>, RagError>;

    /// Search by pre-computed embedding vector instead of text query.
    async fn similarity_search_by_vector(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(Chunk, f32)>, RagError>;

    /// Every chunk currently stored, in insertion order.
    async fn chunks(&self) -> Result<Vec<Chunk>, RagError>;

    /// Number of stored chunks.
    async fn count(&self) -> Result<usize, RagError>;

    /// Delete chunks by ID.
    async fn delete(&self, ids: &[&str]) -> Result<(), RagError>;
}

// ---------------------------------------------------------------------------
// Reranker trait (implementations in ragchat-flashrank / ragchat-huggingface)
// ---------------------------------------------------------------------------

/// Cross-encoder style relevance scorer applied after fusion.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Re-score `candidates` against `query` and return at most `top_n`,
    /// best first. Scores in the output are the reranker's own.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
        top_n: usize,
    ) -> Result<Vec<ScoredChunk>, RagError>;
}
