use std::sync::Arc;

use async_trait::async_trait;
use ragchat_core::{RagError, Reranker, ScoredChunk};

/// Keeps fusion order and truncates. Used when no cross-encoder is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReranker;

#[async_trait]
impl Reranker for NoopReranker {
    async fn rerank(
        &self,
        _query: &str,
        mut candidates: Vec<ScoredChunk>,
        top_n: usize,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        candidates.truncate(top_n);
        Ok(candidates)
    }
}

/// Final reordering of fused candidates against the original query.
///
/// A failing reranker does not fail the query: the fused order, truncated
/// to `top_n`, is returned instead.
#[derive(Clone)]
pub struct RerankStage {
    reranker: Arc<dyn Reranker>,
    top_n: usize,
}

impl RerankStage {
    pub fn new(reranker: Arc<dyn Reranker>, top_n: usize) -> Self {
        Self { reranker, top_n }
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub async fn apply(&self, query: &str, candidates: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
        if candidates.is_empty() {
            return candidates;
        }

        let fallback = candidates.iter().take(self.top_n).cloned().collect();
        match self.reranker.rerank(query, candidates, self.top_n).await {
            Ok(mut reranked) => {
                reranked.truncate(self.top_n);
                reranked
            }
            Err(e) => {
                tracing::warn!("rerank failed, keeping fusion order: {e}");
                fallback
            }
        }
    }
}
