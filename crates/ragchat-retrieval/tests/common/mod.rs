#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ragchat_core::{
    ChatModel, ChatRequest, ChatResponse, Chunk, Embeddings, RagError, Reranker, Retriever,
    ScoredChunk,
};
use ragchat_embeddings::FakeEmbeddings;
use ragchat_retrieval::{QueryClarity, StrategySelector};

pub fn scored(id: &str, score: f32, retriever: &str) -> ScoredChunk {
    ScoredChunk::new(Chunk::new(id, format!("content of {id}")), score, retriever)
}

/// Returns the same ranked list for every query, optionally after a delay,
/// and records the queries it was asked.
pub struct StaticRetriever {
    name: String,
    results: Vec<(String, f32)>,
    delay: Duration,
    pub queries: Mutex<Vec<String>>,
    pub completed: AtomicBool,
}

impl StaticRetriever {
    pub fn new(name: &str, results: &[(&str, f32)]) -> Self {
        Self {
            name: name.to_string(),
            results: results.iter().map(|(id, s)| (id.to_string(), *s)).collect(),
            delay: Duration::ZERO,
            queries: Mutex::new(Vec::new()),
            completed: AtomicBool::new(false),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn has_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn seen_queries(&self) -> Vec<String> {
        let mut queries = self.queries.lock().unwrap().clone();
        queries.sort();
        queries
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, RagError> {
        self.queries.lock().unwrap().push(query.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.store(true, Ordering::SeqCst);
        Ok(self
            .results
            .iter()
            .take(top_k)
            .map(|(id, s)| scored(id, *s, &self.name))
            .collect())
    }
}

pub struct FailingRetriever {
    pub name: String,
}

impl FailingRetriever {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Retriever for FailingRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    async fn retrieve(&self, _query: &str, _top_k: usize) -> Result<Vec<ScoredChunk>, RagError> {
        Err(RagError::Retriever(format!("{} index unavailable", self.name)))
    }
}

/// Fake embeddings whose query side can be switched off after indexing.
pub struct OutageEmbeddings {
    inner: FakeEmbeddings,
    pub down: AtomicBool,
}

impl OutageEmbeddings {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: FakeEmbeddings::new(dimensions),
            down: AtomicBool::new(false),
        }
    }

    pub fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Embeddings for OutageEmbeddings {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        self.inner.embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RagError::Embedding("embed service down".into()));
        }
        self.inner.embed_query(text).await
    }
}

/// Never answers within any reasonable timeout.
pub struct SlowChatModel;

#[async_trait]
impl ChatModel for SlowChatModel {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, RagError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ChatResponse::text("1. too late"))
    }
}

pub struct CountingSelector {
    pub calls: AtomicUsize,
    pub answer: Result<QueryClarity, String>,
    pub delay: Duration,
}

impl CountingSelector {
    pub fn answering(clarity: QueryClarity) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            answer: Ok(clarity),
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            answer: Err("selector model offline".to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StrategySelector for CountingSelector {
    async fn judge(&self, _query: &str) -> Result<QueryClarity, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer.clone().map_err(RagError::Model)
    }
}

/// Reverses candidate order and scores by new position.
pub struct ReversingReranker;

#[async_trait]
impl Reranker for ReversingReranker {
    async fn rerank(
        &self,
        _query: &str,
        candidates: Vec<ScoredChunk>,
        top_n: usize,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        let n = candidates.len();
        Ok(candidates
            .into_iter()
            .rev()
            .enumerate()
            .map(|(i, c)| c.with_score((n - i) as f32))
            .take(top_n)
            .collect())
    }
}

pub struct FailingReranker;

#[async_trait]
impl Reranker for FailingReranker {
    async fn rerank(
        &self,
        _query: &str,
        _candidates: Vec<ScoredChunk>,
        _top_n: usize,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        Err(RagError::Rerank("cross-encoder crashed".into()))
    }
}

pub fn ids(results: &[ScoredChunk]) -> Vec<&str> {
    results.iter().map(|r| r.id()).collect()
}

pub fn arc<R: Retriever + 'static>(r: R) -> Arc<dyn Retriever> {
    Arc::new(r)
}
