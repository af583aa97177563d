use std::sync::Arc;

use async_trait::async_trait;
use ragchat_core::{Embeddings, RagError};
use ragchat_models::{ProviderBackend, ProviderRequest};
use serde_json::{json, Value};

use crate::response::{check_status, expect_count, to_vector};

pub struct OpenAiEmbeddingsConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Texts per request when indexing documents.
    pub batch_size: usize,
}

impl OpenAiEmbeddingsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            batch_size: 8,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// Hosted embeddings (`text-embedding-*`). The key is checked at
/// construction so a missing key fails when the pipeline is built, not on
/// the first upload.
pub struct OpenAiEmbeddings {
    config: OpenAiEmbeddingsConfig,
    backend: Arc<dyn ProviderBackend>,
}

impl OpenAiEmbeddings {
    /// Fails with `RagError::Config` when no API key is set.
    pub fn new(
        config: OpenAiEmbeddingsConfig,
        backend: Arc<dyn ProviderBackend>,
    ) -> Result<Self, RagError> {
        if config.api_key.trim().is_empty() {
            return Err(RagError::Config(format!(
                "an API key is required for embedding model '{}'",
                config.model
            )));
        }
        Ok(Self { config, backend })
    }

    async fn embed_batch(&self, batch: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        let response = self
            .backend
            .send(ProviderRequest {
                url: format!("{}/embeddings", self.config.base_url),
                headers: vec![
                    (
                        "Authorization".to_string(),
                        format!("Bearer {}", self.config.api_key),
                    ),
                    ("Content-Type".to_string(), "application/json".to_string()),
                ],
                body: json!({
                    "model": self.config.model,
                    "input": batch,
                }),
            })
            .await?;
        check_status("OpenAI", &response)?;

        let data = response
            .body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| RagError::Embedding("missing 'data' field in response".to_string()))?;

        // `index` gives the input position; fall back to arrival order
        let mut indexed = Vec::with_capacity(data.len());
        for (position, item) in data.iter().enumerate() {
            let index = item
                .get("index")
                .and_then(Value::as_u64)
                .map_or(position, |i| i as usize);
            let embedding = item
                .get("embedding")
                .ok_or_else(|| RagError::Embedding("missing 'embedding' field".to_string()))?;
            indexed.push((index, to_vector(embedding)?));
        }
        indexed.sort_by_key(|(index, _)| *index);

        let vectors: Vec<Vec<f32>> = indexed.into_iter().map(|(_, v)| v).collect();
        expect_count(&vectors, batch.len())?;
        Ok(vectors)
    }
}

#[async_trait]
impl Embeddings for OpenAiEmbeddings {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size.max(1)) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| RagError::Embedding("empty response".to_string()))
    }
}
