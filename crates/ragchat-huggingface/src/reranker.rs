use std::sync::Arc;

use async_trait::async_trait;
use ragchat_core::{RagError, Reranker, ScoredChunk};
use ragchat_models::{ProviderBackend, ProviderRequest};

/// Available BGE reranker models via HuggingFace Inference API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BgeRerankerModel {
    /// `BAAI/bge-reranker-large`, highest quality
    BgeRerankerLarge,
    /// `BAAI/bge-reranker-base`, faster
    BgeRerankerBase,
    /// `BAAI/bge-reranker-v2-m3`, multilingual
    BgeRerankerV2M3,
    /// Any HuggingFace model ID
    Custom(String),
}

impl BgeRerankerModel {
    pub fn as_str(&self) -> &str {
        match self {
            BgeRerankerModel::BgeRerankerLarge => "BAAI/bge-reranker-large",
            BgeRerankerModel::BgeRerankerBase => "BAAI/bge-reranker-base",
            BgeRerankerModel::BgeRerankerV2M3 => "BAAI/bge-reranker-v2-m3",
            BgeRerankerModel::Custom(s) => s.as_str(),
        }
    }

    /// Map a configured model ID onto a known variant where one exists.
    pub fn from_id(id: &str) -> Self {
        match id {
            "BAAI/bge-reranker-large" => BgeRerankerModel::BgeRerankerLarge,
            "BAAI/bge-reranker-base" => BgeRerankerModel::BgeRerankerBase,
            "BAAI/bge-reranker-v2-m3" => BgeRerankerModel::BgeRerankerV2M3,
            other => BgeRerankerModel::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for BgeRerankerModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cross-encoder reranker over the HuggingFace Inference API.
///
/// Calls the sentence-similarity endpoint with `source_sentence`/`sentences`
/// and orders candidates by the returned relevance scores.
pub struct HuggingFaceReranker {
    api_key: String,
    model: BgeRerankerModel,
    base_url: String,
    backend: Arc<dyn ProviderBackend>,
}

impl HuggingFaceReranker {
    pub fn new(api_key: impl Into<String>, backend: Arc<dyn ProviderBackend>) -> Self {
        Self {
            api_key: api_key.into(),
            model: BgeRerankerModel::BgeRerankerLarge,
            base_url: "https://api-inference.huggingface.co/models".to_string(),
            backend,
        }
    }

    pub fn with_model(mut self, model: BgeRerankerModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(&self) -> &BgeRerankerModel {
        &self.model
    }

    fn build_request(&self, query: &str, candidates: &[ScoredChunk]) -> ProviderRequest {
        let sentences: Vec<&str> = candidates.iter().map(|c| c.content()).collect();
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("x-wait-for-model".to_string(), "true".to_string()),
        ];
        if !self.api_key.is_empty() {
            headers.push((
                "Authorization".to_string(),
                format!("Bearer {}", self.api_key),
            ));
        }
        ProviderRequest {
            url: format!("{}/{}", self.base_url, self.model),
            headers,
            body: serde_json::json!({
                "inputs": {
                    "source_sentence": query,
                    "sentences": sentences,
                }
            }),
        }
    }
}

#[async_trait]
impl Reranker for HuggingFaceReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
        top_n: usize,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let request = self.build_request(query, &candidates);
        let response = self.backend.send(request).await?;
        if response.status != 200 {
            return Err(RagError::Rerank(format!(
                "HuggingFace API error ({}): {}",
                response.status, response.body
            )));
        }

        // one float per input sentence, in input order
        let scores = response
            .body
            .as_array()
            .ok_or_else(|| RagError::Rerank("expected array response".to_string()))?;
        if scores.len() != candidates.len() {
            return Err(RagError::Rerank(format!(
                "expected {} scores, got {}",
                candidates.len(),
                scores.len()
            )));
        }

        let mut scored = Vec::with_capacity(candidates.len());
        for (candidate, value) in candidates.into_iter().zip(scores) {
            let score = value
                .as_f64()
                .ok_or_else(|| RagError::Rerank(format!("non-numeric score: {value}")))?;
            scored.push(candidate.with_score(score as f32));
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_n);
        tracing::debug!(model = %self.model, kept = scored.len(), "reranked candidates");
        Ok(scored)
    }
}
