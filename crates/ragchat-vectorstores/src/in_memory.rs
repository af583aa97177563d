use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use ragchat_core::{Chunk, Embeddings, RagError, Retriever, ScoredChunk, VectorStore};
use tokio::sync::RwLock;

/// Stored chunk with its embedding vector.
struct StoredEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// In-memory vector store using cosine similarity.
///
/// Entries keep insertion order; re-adding an existing ID replaces the entry
/// in place. Equal scores therefore always resolve the same way.
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<StoredEntry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Create a new store pre-populated with chunks.
    pub async fn from_chunks(
        chunks: Vec<Chunk>,
        embeddings: &dyn Embeddings,
    ) -> Result<Self, RagError> {
        let store = Self::new();
        store.add_chunks(chunks, embeddings).await?;
        Ok(store)
    }

    /// Drop every stored chunk.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn rank(entries: &[StoredEntry], query_vec: &[f32], k: usize) -> Vec<(Chunk, f32)> {
    let mut scored: Vec<(Chunk, f32)> = entries
        .iter()
        .map(|entry| {
            let score = cosine_similarity(query_vec, &entry.embedding);
            (entry.chunk.clone(), score)
        })
        .collect();

    // stable: ties keep insertion order
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add_chunks(
        &self,
        chunks: Vec<Chunk>,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<String>, RagError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = embeddings.embed_documents(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::VectorStore(format!(
                "embedded {} of {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let mut entries = self.entries.write().await;
        let mut ids = Vec::with_capacity(chunks.len());

        for (chunk, embedding) in chunks.into_iter().zip(vectors) {
            ids.push(chunk.id.clone());
            let entry = StoredEntry { chunk, embedding };
            match entries.iter_mut().find(|e| e.chunk.id == entry.chunk.id) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }

        Ok(ids)
    }

    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<(Chunk, f32)>, RagError> {
        let query_vec = embeddings.embed_query(query).await?;
        let entries = self.entries.read().await;
        Ok(rank(&entries, &query_vec, k))
    }

    async fn similarity_search_by_vector(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(Chunk, f32)>, RagError> {
        let entries = self.entries.read().await;
        Ok(rank(&entries, embedding, k))
    }

    async fn chunks(&self) -> Result<Vec<Chunk>, RagError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().map(|e| e.chunk.clone()).collect())
    }

    async fn count(&self) -> Result<usize, RagError> {
        Ok(self.entries.read().await.len())
    }

    async fn delete(&self, ids: &[&str]) -> Result<(), RagError> {
        let mut entries = self.entries.write().await;
        entries.retain(|e| !ids.contains(&e.chunk.id.as_str()));
        Ok(())
    }
}

/// Dense retriever over a [`VectorStore`]. Scores are cosine similarities.
pub struct VectorStoreRetriever {
    store: Arc<dyn VectorStore>,
    embeddings: Arc<dyn Embeddings>,
    score_threshold: Option<f32>,
}

impl VectorStoreRetriever {
    pub fn new(store: Arc<dyn VectorStore>, embeddings: Arc<dyn Embeddings>) -> Self {
        Self {
            store,
            embeddings,
            score_threshold: None,
        }
    }

    /// Set a minimum similarity score threshold. Only chunks with a score
    /// greater than or equal to the threshold will be returned.
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }
}

#[async_trait]
impl Retriever for VectorStoreRetriever {
    fn name(&self) -> &str {
        "vector"
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, RagError> {
        let scored = self
            .store
            .similarity_search_with_score(query, top_k, self.embeddings.as_ref())
            .await
            .map_err(|e| RagError::Retriever(format!("vector search failed: {e}")))?;

        Ok(scored
            .into_iter()
            .filter(|(_, score)| self.score_threshold.is_none_or(|t| *score >= t))
            .map(|(chunk, score)| ScoredChunk::new(chunk, score, self.name()))
            .collect())
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
