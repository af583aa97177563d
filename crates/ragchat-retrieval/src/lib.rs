//! Hybrid retrieval: lexical and dense retrievers fused per query, optional
//! LLM query expansion, cross-encoder reranking and a router that picks one
//! of three strategies per query.

mod bm25;
mod factory;
mod fusion;
mod fusion_retriever;
mod prompts;
mod query_gen;
mod rerank;
mod router;
mod settings;

pub use bm25::BM25Retriever;
pub use factory::RetrieverFactory;
pub use fusion::{FusedCandidate, FusionEngine, FusionResult, RankedList, SourceKey};
pub use fusion_retriever::{QueryBundle, QueryFusionRetriever};
pub use prompts::{Language, PromptTemplate};
pub use query_gen::{parse_generated_queries, QueryGenerator};
pub use rerank::{NoopReranker, RerankStage};
pub use router::{
    parse_choice, select_strategy, DirectRetriever, LlmSingleSelector, QueryClarity,
    RouterRetriever, Strategy, StrategySelector,
};
pub use settings::{FusionMode, RetrieverSettings};

pub use ragchat_core::{Chunk, Retriever, ScoredChunk};

/// Lowercased alphanumeric tokens of `text`, in order.
pub(crate) fn tokenize_to_vec(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(|term| term.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::tokenize_to_vec;

    #[test]
    fn tokenize_strips_punctuation_and_lowercases() {
        assert_eq!(
            tokenize_to_vec("Điều 5: Hợp đồng, LAO-động?"),
            vec!["điều", "5", "hợp", "đồng", "lao", "động"]
        );
    }

    #[test]
    fn tokenize_empty() {
        assert!(tokenize_to_vec("  ...  ").is_empty());
    }
}
