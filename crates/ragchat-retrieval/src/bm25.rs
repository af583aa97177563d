use std::collections::HashMap;

use async_trait::async_trait;
use ragchat_core::{Chunk, RagError, Retriever, ScoredChunk};

use crate::tokenize_to_vec;

/// BM25 (Best Matching 25) retriever using Okapi BM25 scoring.
///
/// Pre-computes term frequencies, chunk lengths, and inverse document
/// frequencies at construction time. Chunks scoring zero are never returned
/// and equal scores keep corpus order.
#[derive(Debug, Clone)]
pub struct BM25Retriever {
    chunks: Vec<Chunk>,
    /// Term frequency per chunk: term_freqs[chunk_index][term] = count
    term_freqs: Vec<HashMap<String, usize>>,
    lengths: Vec<usize>,
    avg_length: f64,
    /// Number of chunks containing each term
    doc_freq: HashMap<String, usize>,
    k1: f64,
    b: f64,
}

impl BM25Retriever {
    /// Create a new BM25Retriever with default parameters (k1=1.5, b=0.75).
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self::with_params(chunks, 1.5, 0.75)
    }

    /// Create a new BM25Retriever with custom k1 and b parameters.
    pub fn with_params(chunks: Vec<Chunk>, k1: f64, b: f64) -> Self {
        let mut term_freqs = Vec::with_capacity(chunks.len());
        let mut lengths = Vec::with_capacity(chunks.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for chunk in &chunks {
            let tokens = tokenize_to_vec(&chunk.content);
            let mut term_freq: HashMap<String, usize> = HashMap::new();

            for token in &tokens {
                *term_freq.entry(token.clone()).or_insert(0) += 1;
            }

            for term in term_freq.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }

            term_freqs.push(term_freq);
            lengths.push(tokens.len());
        }

        let avg_length = if chunks.is_empty() {
            0.0
        } else {
            lengths.iter().sum::<usize>() as f64 / chunks.len() as f64
        };

        Self {
            chunks,
            term_freqs,
            lengths,
            avg_length,
            doc_freq,
            k1,
            b,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn score(&self, idx: usize, query_terms: &[String]) -> f64 {
        let n = self.chunks.len() as f64;
        let len = self.lengths[idx] as f64;
        let term_freqs = &self.term_freqs[idx];

        let mut score = 0.0;

        for term in query_terms {
            let tf = *term_freqs.get(term).unwrap_or(&0) as f64;
            let df = *self.doc_freq.get(term).unwrap_or(&0) as f64;

            if df == 0.0 || tf == 0.0 {
                continue;
            }

            // IDF: ln((N - df + 0.5) / (df + 0.5) + 1)
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            let numerator = tf * (self.k1 + 1.0);
            let denominator = tf + self.k1 * (1.0 - self.b + self.b * len / self.avg_length);

            score += idf * numerator / denominator;
        }

        score
    }
}

#[async_trait]
impl Retriever for BM25Retriever {
    fn name(&self) -> &str {
        "bm25"
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, RagError> {
        let query_terms = tokenize_to_vec(query);

        if query_terms.is_empty() {
            return Ok(vec![]);
        }

        let mut scored: Vec<(f64, usize)> = (0..self.chunks.len())
            .map(|idx| (self.score(idx, &query_terms), idx))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        // stable sort, ties stay in corpus order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, idx)| ScoredChunk::new(self.chunks[idx].clone(), score as f32, self.name()))
            .collect())
    }
}
