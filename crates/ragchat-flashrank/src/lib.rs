//! Fast local reranker for ragchat.
//!
//! Scores each candidate against the query with BM25 statistics computed over
//! the candidate set itself. No network, no model download; the default
//! reranker when no cross-encoder service is configured.

use async_trait::async_trait;
use ragchat_core::{RagError, Reranker, ScoredChunk};

/// Configuration for the FlashRank BM25 reranker.
#[derive(Debug, Clone)]
pub struct FlashRankConfig {
    /// BM25 k1 parameter, term frequency saturation (default: 1.5).
    pub k1: f32,
    /// BM25 b parameter, length normalization (default: 0.75).
    pub b: f32,
}

impl Default for FlashRankConfig {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl FlashRankConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_k1(mut self, k1: f32) -> Self {
        self.k1 = k1;
        self
    }

    pub fn with_b(mut self, b: f32) -> Self {
        self.b = b;
        self
    }
}

pub struct FlashRankReranker {
    config: FlashRankConfig,
}

impl FlashRankReranker {
    pub fn new(config: FlashRankConfig) -> Self {
        Self { config }
    }
}

impl Default for FlashRankReranker {
    fn default() -> Self {
        Self::new(FlashRankConfig::default())
    }
}

#[async_trait]
impl Reranker for FlashRankReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
        top_n: usize,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            // nothing to score against: keep incoming order
            return Ok(candidates
                .into_iter()
                .take(top_n)
                .map(|c| c.with_score(0.0))
                .collect());
        }

        let tokens: Vec<Vec<String>> = candidates.iter().map(|c| tokenize(c.content())).collect();
        let avg_dl = tokens.iter().map(|t| t.len()).sum::<usize>() as f32 / tokens.len() as f32;
        let n = candidates.len() as f32;

        let mut scored: Vec<ScoredChunk> = candidates
            .into_iter()
            .zip(&tokens)
            .map(|(candidate, doc_terms)| {
                let score = bm25_score(
                    &query_terms,
                    doc_terms,
                    &tokens,
                    n,
                    avg_dl,
                    self.config.k1,
                    self.config.b,
                );
                candidate.with_score(score)
            })
            .collect();

        // stable: equal scores keep fusion order
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_n);
        Ok(scored)
    }
}

/// Lowercase alphanumeric tokens of at least two bytes.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() >= 2)
        .map(|s| s.to_lowercase())
        .collect()
}

fn bm25_score(
    query_terms: &[String],
    doc_terms: &[String],
    all_docs: &[Vec<String>],
    n: f32,
    avg_dl: f32,
    k1: f32,
    b: f32,
) -> f32 {
    let dl = doc_terms.len() as f32;
    let mut score = 0.0f32;

    for term in query_terms {
        let tf = doc_terms.iter().filter(|t| *t == term).count() as f32;
        if tf == 0.0 {
            continue;
        }
        let df = all_docs.iter().filter(|d| d.contains(term)).count() as f32;
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
        let tf_norm = (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / avg_dl));
        score += idf * tf_norm;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_drops_single_characters() {
        assert_eq!(tokenize("A b-cd, EF"), vec!["cd", "ef"]);
    }

    #[test]
    fn rarer_terms_score_higher() {
        let docs = vec![
            vec!["law".to_string(), "tax".to_string()],
            vec!["law".to_string()],
        ];
        let common = bm25_score(&["law".to_string()], &docs[1], &docs, 2.0, 1.5, 1.5, 0.75);
        let rare = bm25_score(&["tax".to_string()], &docs[0], &docs, 2.0, 1.5, 1.5, 0.75);
        assert!(rare > common);
    }
}
