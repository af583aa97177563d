use std::sync::Arc;

use ragchat_core::{Chunk, ChatModel, Embeddings, RagError, Reranker, Retriever, VectorStore};
use ragchat_vectorstores::{InMemoryVectorStore, VectorStoreRetriever};

use crate::bm25::BM25Retriever;
use crate::fusion::FusionEngine;
use crate::fusion_retriever::QueryFusionRetriever;
use crate::prompts::Language;
use crate::query_gen::QueryGenerator;
use crate::rerank::RerankStage;
use crate::router::{DirectRetriever, LlmSingleSelector, RouterRetriever};
use crate::settings::RetrieverSettings;

/// Builds the retriever the chat engine queries: a plain vector retriever for
/// small corpora, otherwise a router over the two hybrid fusion strategies.
pub struct RetrieverFactory {
    settings: RetrieverSettings,
    embeddings: Arc<dyn Embeddings>,
    reranker: Arc<dyn Reranker>,
    llm: Arc<dyn ChatModel>,
}

impl RetrieverFactory {
    pub fn new(
        settings: RetrieverSettings,
        embeddings: Arc<dyn Embeddings>,
        reranker: Arc<dyn Reranker>,
        llm: Arc<dyn ChatModel>,
    ) -> Result<Self, RagError> {
        settings.validate()?;
        Ok(Self {
            settings,
            embeddings,
            reranker,
            llm,
        })
    }

    pub fn settings(&self) -> &RetrieverSettings {
        &self.settings
    }

    /// Index `corpus` into a fresh in-memory store and build a retriever
    /// over it.
    pub async fn get_retriever(
        &self,
        corpus: &[Chunk],
        language: Language,
    ) -> Result<Arc<dyn Retriever>, RagError> {
        let store = InMemoryVectorStore::new();
        store
            .add_chunks(corpus.to_vec(), self.embeddings.as_ref())
            .await?;
        self.get_retriever_with_store(Arc::new(store), language)
            .await
    }

    /// Build a retriever over an already populated store. The lexical index
    /// is rebuilt from the store's chunks.
    pub async fn get_retriever_with_store(
        &self,
        store: Arc<dyn VectorStore>,
        language: Language,
    ) -> Result<Arc<dyn Retriever>, RagError> {
        let chunks = store.chunks().await?;
        let corpus_size = chunks.len();
        let threshold = self.settings.rerank_threshold();

        let vector: Arc<dyn Retriever> =
            Arc::new(VectorStoreRetriever::new(store, Arc::clone(&self.embeddings)));

        if corpus_size <= threshold {
            tracing::info!(corpus_size, threshold, "small corpus, using vector retrieval only");
            return Ok(Arc::new(DirectRetriever::new(vector)));
        }

        let lexical: Arc<dyn Retriever> = Arc::new(BM25Retriever::new(chunks));
        let with_generation = self.fusion_retriever(
            vec![Arc::clone(&lexical), Arc::clone(&vector)],
            language,
            true,
        )?;
        let two_stage =
            self.fusion_retriever(vec![lexical, Arc::clone(&vector)], language, false)?;
        let selector = Arc::new(LlmSingleSelector::new(Arc::clone(&self.llm), language));

        tracing::info!(corpus_size, threshold, %language, "using routed hybrid retrieval");
        Ok(Arc::new(
            RouterRetriever::new(
                corpus_size,
                threshold,
                selector,
                vector,
                Arc::new(with_generation),
                Arc::new(two_stage),
            )
            .with_timeout(self.settings.llm_timeout()),
        ))
    }

    fn fusion_retriever(
        &self,
        retrievers: Vec<Arc<dyn Retriever>>,
        language: Language,
        generate_queries: bool,
    ) -> Result<QueryFusionRetriever, RagError> {
        let engine = FusionEngine::new(
            self.settings.fusion_mode,
            self.settings.retriever_weights.clone(),
        )?;
        let mut retriever = QueryFusionRetriever::new(retrievers, engine)?
            .with_language(language)
            .with_similarity_top_k(self.settings.similarity_top_k)
            .with_rerank(RerankStage::new(
                Arc::clone(&self.reranker),
                self.settings.top_k_rerank,
            ));
        if generate_queries {
            let generator = QueryGenerator::new(Arc::clone(&self.llm))
                .with_timeout(self.settings.llm_timeout());
            retriever = retriever.with_query_generation(generator, self.settings.num_queries);
        }
        Ok(retriever)
    }
}
