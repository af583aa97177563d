use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ragchat_core::{ChatModel, Embeddings, RagError, Reranker};
use ragchat_embeddings::{
    OllamaEmbeddings, OllamaEmbeddingsConfig, OpenAiEmbeddings, OpenAiEmbeddingsConfig,
};
use ragchat_flashrank::FlashRankReranker;
use ragchat_huggingface::{BgeRerankerModel, HuggingFaceReranker};
use ragchat_models::{
    OllamaChatModel, OllamaConfig, OpenAiChatModel, OpenAiConfig, ProviderBackend,
    RetryChatModel, RetryPolicy,
};
use ragchat_retrieval::RetrieverSettings;
use serde::{Deserialize, Serialize};

use crate::ingestion::TokenSplitter;

/// Environment variable consulted for API keys the settings file omits.
pub const API_KEY_ENV: &str = "API_KEY";

/// Which service answers for a model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Ollama,
}

/// Completion model settings. OpenAI models (`gpt-*`) need an API key;
/// any other name is served by Ollama with the sampling options below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub host: String,
    pub port: u16,
    pub keep_alive: String,
    pub temperature: f64,
    pub tfs_z: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub repeat_last_n: i64,
    pub repeat_penalty: f64,
    pub context_window: u32,
    pub request_timeout_secs: u64,
    /// Tries per model call on rate limits and timeouts, the first included.
    pub max_retries: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            host: "localhost".to_string(),
            port: 11434,
            keep_alive: "1h".to_string(),
            temperature: 0.1,
            tfs_z: 1.0,
            top_k: 40,
            top_p: 0.9,
            repeat_last_n: 64,
            repeat_penalty: 1.1,
            context_window: 8000,
            request_timeout_secs: 300,
            max_retries: 3,
        }
    }
}

impl LlmSettings {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_context_window(mut self, context_window: u32) -> Self {
        self.context_window = context_window;
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
    }

    pub fn provider(&self) -> Provider {
        if self.model.starts_with("gpt-") {
            Provider::OpenAi
        } else {
            Provider::Ollama
        }
    }

    pub fn ollama_base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig::new(self.model.clone())
            .with_base_url(self.ollama_base_url())
            .with_keep_alive(self.keep_alive.clone())
            .with_temperature(self.temperature)
            .with_tfs_z(self.tfs_z)
            .with_top_k(self.top_k)
            .with_top_p(self.top_p)
            .with_repeat_last_n(self.repeat_last_n)
            .with_repeat_penalty(self.repeat_penalty)
            .with_context_window(self.context_window)
    }

    pub fn validate(&self) -> Result<(), RagError> {
        if self.model.trim().is_empty() {
            return Err(RagError::Config("llm.model must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::Config(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(RagError::Config("llm.request_timeout_secs must be at least 1".into()));
        }
        if self.context_window == 0 {
            return Err(RagError::Config("llm.context_window must be at least 1".into()));
        }
        if self.max_retries == 0 {
            return Err(RagError::Config("llm.max_retries must be at least 1".into()));
        }
        Ok(())
    }
}

/// Embedding and chunking settings. `text-embedding-*` models go to OpenAI
/// and need a key; others are served by the Ollama embed endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    pub embed_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_api_key: Option<String>,
    /// Texts per embedding request while indexing.
    pub embed_batch_size: usize,
    /// Chunk size in estimated tokens.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            embed_model: "text-embedding-3-small".to_string(),
            embed_api_key: None,
            embed_batch_size: 8,
            chunk_size: 256,
            chunk_overlap: 32,
        }
    }
}

impl IngestionSettings {
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    pub fn with_embed_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.embed_api_key = Some(api_key.into());
        self
    }

    pub fn with_embed_batch_size(mut self, batch_size: usize) -> Self {
        self.embed_batch_size = batch_size;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = overlap;
        self
    }

    pub fn provider(&self) -> Provider {
        if self.embed_model.starts_with("text-embedding-") {
            Provider::OpenAi
        } else {
            Provider::Ollama
        }
    }

    pub fn splitter(&self) -> TokenSplitter {
        TokenSplitter::new(self.chunk_size).with_chunk_overlap(self.chunk_overlap)
    }

    pub fn validate(&self) -> Result<(), RagError> {
        if self.embed_model.trim().is_empty() {
            return Err(RagError::Config("ingestion.embed_model must not be empty".into()));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::Config("ingestion.embed_batch_size must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(RagError::Config("ingestion.chunk_size must be at least 1".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "ingestion.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Estimated-token budget of the conversation memory.
    pub chat_token_limit: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            chat_token_limit: 10_000,
        }
    }
}

impl ChatSettings {
    pub fn with_chat_token_limit(mut self, limit: usize) -> Self {
        self.chat_token_limit = limit;
        self
    }
}

/// Where reranking runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RerankProvider {
    /// BGE cross-encoder named by `retriever.rerank_model`, over the
    /// HuggingFace inference API.
    #[default]
    #[serde(rename = "huggingface")]
    HuggingFace,
    /// Local lexical scorer, no network.
    #[serde(rename = "flashrank")]
    FlashRank,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    pub provider: RerankProvider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl RerankSettings {
    pub fn with_provider(mut self, provider: RerankProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Every knob of the chat pipeline. Sections missing from a settings file
/// take their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub llm: LlmSettings,
    pub retriever: RetrieverSettings,
    pub ingestion: IngestionSettings,
    pub chat: ChatSettings,
    pub rerank: RerankSettings,
}

impl RagSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse, fill missing keys from `API_KEY`, validate.
    pub fn from_json_str(json: &str) -> Result<Self, RagError> {
        let mut settings: RagSettings = serde_json::from_str(json)
            .map_err(|e| RagError::Config(format!("invalid settings: {e}")))?;
        settings.fill_missing_keys(std::env::var(API_KEY_ENV).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RagError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            RagError::Config(format!("cannot read settings {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn with_llm(mut self, llm: LlmSettings) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_retriever(mut self, retriever: RetrieverSettings) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_ingestion(mut self, ingestion: IngestionSettings) -> Self {
        self.ingestion = ingestion;
        self
    }

    pub fn with_chat(mut self, chat: ChatSettings) -> Self {
        self.chat = chat;
        self
    }

    pub fn with_rerank(mut self, rerank: RerankSettings) -> Self {
        self.rerank = rerank;
        self
    }

    /// Use `api_key` for the completion and embedding keys left unset.
    pub fn fill_missing_keys(&mut self, api_key: Option<String>) {
        let Some(key) = api_key.filter(|k| !k.trim().is_empty()) else {
            return;
        };
        if self.llm.api_key.is_none() {
            self.llm.api_key = Some(key.clone());
        }
        if self.ingestion.embed_api_key.is_none() {
            self.ingestion.embed_api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), RagError> {
        self.llm.validate()?;
        self.retriever.validate()?;
        self.ingestion.validate()?;
        if self.chat.chat_token_limit == 0 {
            return Err(RagError::Config("chat.chat_token_limit must be at least 1".into()));
        }
        Ok(())
    }

    /// The completion model, retried per `llm.max_retries`.
    pub fn build_chat_model(
        &self,
        backend: Arc<dyn ProviderBackend>,
    ) -> Result<Arc<dyn ChatModel>, RagError> {
        self.llm.validate()?;
        let model: Arc<dyn ChatModel> = match self.llm.provider() {
            Provider::OpenAi => {
                let api_key = self.llm.api_key.clone().ok_or_else(|| {
                    RagError::Config(format!("an API key is required for model '{}'", self.llm.model))
                })?;
                let config = OpenAiConfig::new(api_key, self.llm.model.clone())
                    .with_temperature(self.llm.temperature);
                Arc::new(OpenAiChatModel::new(config, backend)?)
            }
            Provider::Ollama => Arc::new(OllamaChatModel::new(self.llm.ollama_config(), backend)),
        };
        Ok(Arc::new(RetryChatModel::new(model, self.llm.retry_policy())))
    }

    pub fn build_embeddings(
        &self,
        backend: Arc<dyn ProviderBackend>,
    ) -> Result<Arc<dyn Embeddings>, RagError> {
        self.ingestion.validate()?;
        match self.ingestion.provider() {
            Provider::OpenAi => {
                let api_key = self.ingestion.embed_api_key.clone().ok_or_else(|| {
                    RagError::Config(format!(
                        "an API key is required for embedding model '{}'",
                        self.ingestion.embed_model
                    ))
                })?;
                let config = OpenAiEmbeddingsConfig::new(api_key)
                    .with_model(self.ingestion.embed_model.clone())
                    .with_batch_size(self.ingestion.embed_batch_size);
                Ok(Arc::new(OpenAiEmbeddings::new(config, backend)?))
            }
            Provider::Ollama => {
                let config = OllamaEmbeddingsConfig::new(self.ingestion.embed_model.clone())
                    .with_base_url(self.llm.ollama_base_url())
                    .with_batch_size(self.ingestion.embed_batch_size)
                    .with_keep_alive(self.llm.keep_alive.clone());
                Ok(Arc::new(OllamaEmbeddings::new(config, backend)))
            }
        }
    }

    pub fn build_reranker(&self, backend: Arc<dyn ProviderBackend>) -> Arc<dyn Reranker> {
        match self.rerank.provider {
            RerankProvider::HuggingFace => Arc::new(
                HuggingFaceReranker::new(self.rerank.api_key.clone().unwrap_or_default(), backend)
                    .with_model(BgeRerankerModel::from_id(&self.retriever.rerank_model)),
            ),
            RerankProvider::FlashRank => Arc::new(FlashRankReranker::default()),
        }
    }
}
