use std::cmp::Ordering;
use std::collections::HashMap;

use ragchat_core::{RagError, ScoredChunk};

use crate::settings::FusionMode;

/// Standard RRF constant (k parameter in the RRF formula).
const RRF_K: f32 = 60.0;

const WEIGHT_SUM_TOLERANCE: f32 = 1e-6;

/// Identifies which retrieval produced a ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceKey {
    pub retriever_index: usize,
    pub query_index: usize,
}

impl SourceKey {
    pub fn new(retriever_index: usize, query_index: usize) -> Self {
        Self {
            retriever_index,
            query_index,
        }
    }
}

/// One retriever's output for one query variant, best first.
#[derive(Debug, Clone)]
pub struct RankedList {
    pub source: SourceKey,
    pub results: Vec<ScoredChunk>,
}

impl RankedList {
    pub fn new(source: SourceKey, results: Vec<ScoredChunk>) -> Self {
        Self { source, results }
    }
}

/// A deduplicated candidate after fusion.
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    /// The first-seen copy of the chunk, its score replaced by `fused_score`.
    pub chunk: ScoredChunk,
    pub fused_score: f32,
    /// Highest raw score any retriever gave this chunk.
    pub best_score: f32,
    /// Source and 0-based rank of the first occurrence.
    pub first_seen: (SourceKey, usize),
}

/// Fused candidates, best first, unique by chunk ID.
#[derive(Debug, Clone, Default)]
pub struct FusionResult {
    candidates: Vec<FusedCandidate>,
}

impl FusionResult {
    pub fn candidates(&self) -> &[FusedCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.chunk.id()).collect()
    }

    pub fn into_scored_chunks(self) -> Vec<ScoredChunk> {
        self.candidates.into_iter().map(|c| c.chunk).collect()
    }
}

pub(crate) fn validate_weights(weights: &[f32], retriever_count: usize) -> Result<(), RagError> {
    if weights.len() != retriever_count {
        return Err(RagError::Config(format!(
            "expected {retriever_count} retriever weights, got {}",
            weights.len()
        )));
    }
    if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(RagError::Config(format!(
            "retriever weights must be finite and non-negative, got {bad}"
        )));
    }
    let sum: f32 = weights.iter().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(RagError::Config(format!(
            "retriever weights must sum to 1.0, got {sum}"
        )));
    }
    Ok(())
}

/// Merges ranked lists into one ranking. Pure and deterministic: the result
/// depends only on the lists' contents and source keys, never on the order
/// they arrive in.
#[derive(Debug, Clone)]
pub struct FusionEngine {
    mode: FusionMode,
    weights: Vec<f32>,
}

impl FusionEngine {
    /// `weights[i]` applies to lists whose `retriever_index` is `i`.
    pub fn new(mode: FusionMode, weights: Vec<f32>) -> Result<Self, RagError> {
        if weights.is_empty() {
            return Err(RagError::Config("at least one retriever weight is required".into()));
        }
        validate_weights(&weights, weights.len())?;
        Ok(Self { mode, weights })
    }

    /// Equal weights for `retriever_count` retrievers.
    pub fn uniform(mode: FusionMode, retriever_count: usize) -> Result<Self, RagError> {
        if retriever_count == 0 {
            return Err(RagError::Config("at least one retriever is required".into()));
        }
        let w = 1.0 / retriever_count as f32;
        let mut weights = vec![w; retriever_count];
        // absorb rounding so the sum stays within tolerance
        let rest: f32 = weights[1..].iter().sum();
        weights[0] = 1.0 - rest;
        Self::new(mode, weights)
    }

    pub fn mode(&self) -> FusionMode {
        self.mode
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Fuse `lists` produced for `num_queries` query variants and keep the
    /// best `top_k`.
    pub fn fuse(&self, mut lists: Vec<RankedList>, num_queries: usize, top_k: usize) -> FusionResult {
        lists.sort_by_key(|l| l.source);
        let num_queries = num_queries.max(1) as f32;

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut candidates: Vec<FusedCandidate> = Vec::new();

        for list in lists {
            let weight = self
                .weights
                .get(list.source.retriever_index)
                .copied()
                .unwrap_or(0.0);
            let raw: Vec<f32> = list.results.iter().map(|r| sanitize(r.score)).collect();
            let contributions = self.contributions(&raw, weight, num_queries);

            for (rank, (result, contribution)) in list.results.into_iter().zip(contributions).enumerate() {
                let raw_score = raw[rank];
                match index.get(result.id()) {
                    Some(&pos) => {
                        let existing = &mut candidates[pos];
                        existing.fused_score += contribution;
                        existing.best_score = existing.best_score.max(raw_score);
                    }
                    None => {
                        index.insert(result.id().to_string(), candidates.len());
                        candidates.push(FusedCandidate {
                            chunk: result,
                            fused_score: contribution,
                            best_score: raw_score,
                            first_seen: (list.source, rank),
                        });
                    }
                }
            }
        }

        candidates.sort_by(compare_candidates);
        candidates.truncate(top_k);
        for candidate in &mut candidates {
            candidate.chunk.score = candidate.fused_score;
        }

        FusionResult { candidates }
    }

    fn contributions(&self, raw: &[f32], weight: f32, num_queries: f32) -> Vec<f32> {
        match self.mode {
            FusionMode::Simple => raw.iter().map(|s| s * weight).collect(),
            FusionMode::ReciprocalRank => (0..raw.len())
                .map(|rank| weight / (RRF_K + (rank + 1) as f32))
                .collect(),
            FusionMode::DistBasedScore => {
                let (lo, hi) = dist_bounds(raw);
                normalize(raw, lo, hi)
                    .into_iter()
                    .map(|s| s * weight / num_queries)
                    .collect()
            }
            FusionMode::RelativeScore => {
                let lo = raw.iter().copied().fold(f32::INFINITY, f32::min);
                let hi = raw.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                normalize(raw, lo, hi)
                    .into_iter()
                    .map(|s| s * weight / num_queries)
                    .collect()
            }
        }
    }
}

fn sanitize(score: f32) -> f32 {
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

/// mean ± 3 population standard deviations.
fn dist_bounds(raw: &[f32]) -> (f32, f32) {
    if raw.is_empty() {
        return (0.0, 0.0);
    }
    let n = raw.len() as f32;
    let mean = raw.iter().sum::<f32>() / n;
    let variance = raw.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n;
    let std_dev = variance.sqrt();
    (mean - 3.0 * std_dev, mean + 3.0 * std_dev)
}

fn normalize(raw: &[f32], lo: f32, hi: f32) -> Vec<f32> {
    let range = hi - lo;
    raw.iter()
        .map(|s| {
            if range > 0.0 {
                (s - lo) / range
            } else if *s > 0.0 {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

fn compare_candidates(a: &FusedCandidate, b: &FusedCandidate) -> Ordering {
    b.fused_score
        .partial_cmp(&a.fused_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.best_score
                .partial_cmp(&a.best_score)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.first_seen.cmp(&b.first_seen))
}
