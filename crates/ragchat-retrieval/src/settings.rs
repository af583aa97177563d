use std::str::FromStr;
use std::time::Duration;

use ragchat_core::RagError;
use serde::{Deserialize, Serialize};

use crate::fusion::validate_weights;

/// How ranked lists from several retrievers and query variants are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    /// Weighted sum of raw scores.
    Simple,
    /// Per-list normalisation against mean ± 3 standard deviations.
    #[default]
    DistBasedScore,
    /// Per-list min/max normalisation.
    RelativeScore,
    /// Weighted reciprocal rank, k = 60.
    ReciprocalRank,
}

impl FromStr for FusionMode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(FusionMode::Simple),
            "dist_based_score" => Ok(FusionMode::DistBasedScore),
            "relative_score" => Ok(FusionMode::RelativeScore),
            "reciprocal_rank" => Ok(FusionMode::ReciprocalRank),
            other => Err(RagError::Config(format!("unknown fusion mode '{other}'"))),
        }
    }
}

/// Retrieval configuration. Every field has a default, so a partial JSON
/// object deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverSettings {
    /// Candidates fetched per retriever and query variant.
    pub similarity_top_k: usize,
    /// Chunks kept after reranking.
    pub top_k_rerank: usize,
    /// Total queries per retrieval, the original included.
    pub num_queries: usize,
    /// One weight per retriever: lexical first, vector second.
    pub retriever_weights: Vec<f32>,
    pub fusion_mode: FusionMode,
    pub rerank_model: String,
    /// Corpus size at or below which fusion is skipped. Defaults to
    /// `top_k_rerank`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_threshold: Option<usize>,
    /// Bound on query generation and strategy selection calls.
    pub llm_timeout_secs: u64,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            similarity_top_k: 10,
            top_k_rerank: 10,
            num_queries: 5,
            retriever_weights: vec![0.4, 0.6],
            fusion_mode: FusionMode::DistBasedScore,
            rerank_model: "BAAI/bge-reranker-large".to_string(),
            rerank_threshold: None,
            llm_timeout_secs: 30,
        }
    }
}

impl RetrieverSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_similarity_top_k(mut self, k: usize) -> Self {
        self.similarity_top_k = k;
        self
    }

    pub fn with_top_k_rerank(mut self, k: usize) -> Self {
        self.top_k_rerank = k;
        self
    }

    pub fn with_num_queries(mut self, n: usize) -> Self {
        self.num_queries = n;
        self
    }

    pub fn with_retriever_weights(mut self, weights: Vec<f32>) -> Self {
        self.retriever_weights = weights;
        self
    }

    pub fn with_fusion_mode(mut self, mode: FusionMode) -> Self {
        self.fusion_mode = mode;
        self
    }

    pub fn with_rerank_model(mut self, model: impl Into<String>) -> Self {
        self.rerank_model = model.into();
        self
    }

    pub fn with_rerank_threshold(mut self, threshold: usize) -> Self {
        self.rerank_threshold = Some(threshold);
        self
    }

    pub fn with_llm_timeout_secs(mut self, secs: u64) -> Self {
        self.llm_timeout_secs = secs;
        self
    }

    pub fn rerank_threshold(&self) -> usize {
        self.rerank_threshold.unwrap_or(self.top_k_rerank)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// Reject settings the retrieval stack cannot run with. The weights
    /// must cover exactly the lexical and vector retrievers.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.similarity_top_k == 0 {
            return Err(RagError::Config("similarity_top_k must be at least 1".into()));
        }
        if self.top_k_rerank == 0 {
            return Err(RagError::Config("top_k_rerank must be at least 1".into()));
        }
        if self.num_queries == 0 {
            return Err(RagError::Config("num_queries must be at least 1".into()));
        }
        if self.llm_timeout_secs == 0 {
            return Err(RagError::Config("llm_timeout_secs must be at least 1".into()));
        }
        if self.rerank_model.trim().is_empty() {
            return Err(RagError::Config("rerank_model must not be empty".into()));
        }
        validate_weights(&self.retriever_weights, 2)
    }
}
