use std::sync::Arc;

use async_trait::async_trait;
use ragchat_core::{Embeddings, RagError};
use ragchat_models::{ProviderBackend, ProviderRequest};
use serde_json::{json, Value};

use crate::response::{check_status, expect_count, to_vector};

/// Local embedding model served by Ollama.
pub struct OllamaEmbeddingsConfig {
    pub model: String,
    pub base_url: String,
    /// Texts per `/api/embed` request when indexing documents.
    pub batch_size: usize,
    /// How long Ollama keeps the model loaded after a request.
    pub keep_alive: Option<String>,
}

impl OllamaEmbeddingsConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: "http://localhost:11434".to_string(),
            batch_size: 8,
            keep_alive: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }
}

/// Embeddings from Ollama's `/api/embed`, which takes a list of inputs and
/// answers with one vector per input in order.
pub struct OllamaEmbeddings {
    config: OllamaEmbeddingsConfig,
    backend: Arc<dyn ProviderBackend>,
}

impl OllamaEmbeddings {
    pub fn new(config: OllamaEmbeddingsConfig, backend: Arc<dyn ProviderBackend>) -> Self {
        Self { config, backend }
    }

    async fn embed_batch(&self, batch: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut body = json!({
            "model": self.config.model,
            "input": batch,
        });
        if let Some(keep_alive) = &self.config.keep_alive {
            body["keep_alive"] = Value::String(keep_alive.clone());
        }

        let response = self
            .backend
            .send(ProviderRequest {
                url: format!("{}/api/embed", self.config.base_url),
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body,
            })
            .await?;
        check_status("Ollama", &response)?;

        let vectors = response
            .body
            .get("embeddings")
            .and_then(Value::as_array)
            .ok_or_else(|| RagError::Embedding("missing 'embeddings' field".to_string()))?
            .iter()
            .map(to_vector)
            .collect::<Result<Vec<_>, _>>()?;
        expect_count(&vectors, batch.len())?;
        Ok(vectors)
    }
}

#[async_trait]
impl Embeddings for OllamaEmbeddings {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size.max(1)) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        tracing::debug!(
            model = %self.config.model,
            texts = texts.len(),
            batch_size = self.config.batch_size,
            "embedded documents"
        );
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| RagError::Embedding("empty response".to_string()))
    }
}
