use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use ragchat_core::{RagError, Retriever, ScoredChunk};

use crate::fusion::{FusionEngine, FusionResult, RankedList, SourceKey};
use crate::prompts::Language;
use crate::query_gen::QueryGenerator;
use crate::rerank::RerankStage;

/// The original query followed by any generated variants. Index 0 is always
/// the user's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBundle {
    queries: Vec<String>,
}

impl QueryBundle {
    pub fn new(original: impl Into<String>) -> Self {
        Self {
            queries: vec![original.into()],
        }
    }

    pub fn with_variants(mut self, variants: Vec<String>) -> Self {
        self.queries.extend(variants);
        self
    }

    pub fn original(&self) -> &str {
        &self.queries[0]
    }

    pub fn variants(&self) -> &[String] {
        &self.queries[1..]
    }

    pub fn all(&self) -> &[String] {
        &self.queries
    }

    /// Number of queries, the original included. Never zero.
    pub fn count(&self) -> usize {
        self.queries.len()
    }
}

/// Runs every retriever against every query variant concurrently, fuses the
/// ranked lists and optionally reranks the fused candidates.
///
/// A retriever call that fails contributes an empty list. Only when every
/// call fails does the query fail, with [`RagError::RetrievalFailed`].
pub struct QueryFusionRetriever {
    retrievers: Vec<Arc<dyn Retriever>>,
    engine: FusionEngine,
    generator: Option<QueryGenerator>,
    num_queries: usize,
    similarity_top_k: usize,
    language: Language,
    rerank: Option<RerankStage>,
}

impl QueryFusionRetriever {
    /// `engine` must carry one weight per retriever, in the same order.
    pub fn new(retrievers: Vec<Arc<dyn Retriever>>, engine: FusionEngine) -> Result<Self, RagError> {
        if retrievers.is_empty() {
            return Err(RagError::Config("fusion needs at least one retriever".into()));
        }
        if engine.weights().len() != retrievers.len() {
            return Err(RagError::Config(format!(
                "{} retrievers but {} fusion weights",
                retrievers.len(),
                engine.weights().len()
            )));
        }
        Ok(Self {
            retrievers,
            engine,
            generator: None,
            num_queries: 1,
            similarity_top_k: 10,
            language: Language::default(),
            rerank: None,
        })
    }

    /// Expand each query into `num_queries` total queries, the original
    /// included.
    pub fn with_query_generation(mut self, generator: QueryGenerator, num_queries: usize) -> Self {
        self.generator = Some(generator);
        self.num_queries = num_queries.max(1);
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Candidates requested from each retriever per query, and kept after
    /// fusion.
    pub fn with_similarity_top_k(mut self, k: usize) -> Self {
        self.similarity_top_k = k;
        self
    }

    pub fn with_rerank(mut self, stage: RerankStage) -> Self {
        self.rerank = Some(stage);
        self
    }

    pub fn generates_queries(&self) -> bool {
        self.generator.is_some()
    }

    async fn query_bundle(&self, query: &str) -> QueryBundle {
        let bundle = QueryBundle::new(query);
        match &self.generator {
            Some(generator) if self.num_queries > 1 => {
                let variants = generator
                    .generate(query, self.num_queries - 1, self.language)
                    .await;
                bundle.with_variants(variants)
            }
            _ => bundle,
        }
    }

    /// Retrieve for every query in `bundle` and fuse, without reranking.
    pub async fn fuse_bundle(&self, bundle: &QueryBundle) -> Result<FusionResult, RagError> {
        let calls = self.retrievers.iter().enumerate().flat_map(|(ri, retriever)| {
            bundle.all().iter().enumerate().map(move |(qi, q)| {
                let retriever = Arc::clone(retriever);
                let top_k = self.similarity_top_k;
                async move {
                    let result = retriever.retrieve(q, top_k).await;
                    (SourceKey::new(ri, qi), retriever.name().to_string(), result)
                }
            })
        });

        let outcomes = join_all(calls).await;
        let total = outcomes.len();

        let mut lists = Vec::with_capacity(total);
        let mut errors = Vec::new();
        for (source, name, result) in outcomes {
            match result {
                Ok(results) => {
                    tracing::debug!(
                        retriever = %name,
                        query_index = source.query_index,
                        hits = results.len(),
                        "retrieval finished"
                    );
                    lists.push(RankedList::new(source, results));
                }
                Err(e) => {
                    tracing::warn!(
                        retriever = %name,
                        query_index = source.query_index,
                        "retriever failed, treating as empty: {e}"
                    );
                    errors.push(format!("{name}: {e}"));
                    lists.push(RankedList::new(source, Vec::new()));
                }
            }
        }

        if errors.len() == total {
            return Err(RagError::RetrievalFailed(errors.join("; ")));
        }

        Ok(self
            .engine
            .fuse(lists, bundle.count(), self.similarity_top_k))
    }
}

#[async_trait]
impl Retriever for QueryFusionRetriever {
    fn name(&self) -> &str {
        "fusion"
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, RagError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let bundle = self.query_bundle(query).await;
        let fused = self.fuse_bundle(&bundle).await?.into_scored_chunks();

        let mut results = match &self.rerank {
            Some(stage) => stage.apply(bundle.original(), fused).await,
            None => fused,
        };
        results.truncate(top_k);
        Ok(results)
    }
}
