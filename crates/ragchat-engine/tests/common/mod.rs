#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use ragchat_core::{Chunk, RagError, Retriever, ScoredChunk};

pub fn source(id: &str, file_name: &str, content: &str) -> ScoredChunk {
    ScoredChunk::new(Chunk::new(id, content).with_file_name(file_name), 0.9, "fake")
}

pub enum Outcome {
    Chunks(Vec<ScoredChunk>),
    AllFailed,
    Broken,
}

/// Answers every query with a fixed outcome and records the queries.
pub struct RecordingRetriever {
    outcome: Outcome,
    queries: Mutex<Vec<String>>,
}

impl RecordingRetriever {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for RecordingRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, RagError> {
        self.queries.lock().unwrap().push(query.to_string());
        match &self.outcome {
            Outcome::Chunks(chunks) => Ok(chunks.iter().take(top_k).cloned().collect()),
            Outcome::AllFailed => Err(RagError::RetrievalFailed("bm25: down; vector: down".into())),
            Outcome::Broken => Err(RagError::Retriever("index corrupted".into())),
        }
    }
}
