use std::sync::Arc;

use ragchat_core::{Chunk, RagError, Reranker, ScoredChunk};
use ragchat_huggingface::{BgeRerankerModel, HuggingFaceReranker};
use ragchat_models::{FakeBackend, ProviderResponse};
use serde_json::json;

fn candidates() -> Vec<ScoredChunk> {
    vec![
        ScoredChunk::new(Chunk::new("a", "Annual leave is twelve days."), 0.9, "bm25"),
        ScoredChunk::new(Chunk::new("b", "Notice period is thirty days."), 0.8, "vector"),
        ScoredChunk::new(Chunk::new("c", "Vehicles need registration."), 0.7, "vector"),
    ]
}

#[test]
fn model_ids() {
    assert_eq!(
        BgeRerankerModel::BgeRerankerLarge.as_str(),
        "BAAI/bge-reranker-large"
    );
    assert_eq!(
        BgeRerankerModel::from_id("BAAI/bge-reranker-v2-m3"),
        BgeRerankerModel::BgeRerankerV2M3
    );
    assert_eq!(
        BgeRerankerModel::from_id("my/model").to_string(),
        "my/model"
    );
}

#[tokio::test]
async fn orders_by_returned_scores() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_response(ProviderResponse {
        status: 200,
        body: json!([0.1, 0.95, 0.4]),
    });
    let reranker = HuggingFaceReranker::new("hf_test", backend.clone());

    let results = reranker
        .rerank("how long is the notice period?", candidates(), 2)
        .await
        .unwrap();

    let ids: Vec<&str> = results.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec!["b", "c"]);
    assert!((results[0].score - 0.95).abs() < 1e-6);

    let request = &backend.requests().await[0];
    assert_eq!(
        request.url,
        "https://api-inference.huggingface.co/models/BAAI/bge-reranker-large"
    );
    assert_eq!(
        request.body["inputs"]["source_sentence"],
        "how long is the notice period?"
    );
    assert_eq!(request.body["inputs"]["sentences"][2], "Vehicles need registration.");
    assert!(request
        .headers
        .iter()
        .any(|(k, v)| k == "Authorization" && v == "Bearer hf_test"));
}

#[tokio::test]
async fn api_error_is_rerank_error() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_response(ProviderResponse {
        status: 503,
        body: json!({"error": "model loading"}),
    });
    let reranker = HuggingFaceReranker::new("", backend.clone())
        .with_model(BgeRerankerModel::BgeRerankerBase)
        .with_base_url("http://localhost:8080/models");

    let err = reranker.rerank("q", candidates(), 3).await.unwrap_err();
    assert!(matches!(err, RagError::Rerank(_)));

    let request = &backend.requests().await[0];
    assert_eq!(request.url, "http://localhost:8080/models/BAAI/bge-reranker-base");
    assert!(!request.headers.iter().any(|(k, _)| k == "Authorization"));
}

#[tokio::test]
async fn score_count_mismatch_is_rejected() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_response(ProviderResponse {
        status: 200,
        body: json!([0.5]),
    });
    let reranker = HuggingFaceReranker::new("hf_test", backend);
    assert!(reranker.rerank("q", candidates(), 3).await.is_err());
}

#[tokio::test]
async fn empty_candidates_skip_the_call() {
    let backend = Arc::new(FakeBackend::new());
    let reranker = HuggingFaceReranker::new("hf_test", backend.clone());
    assert!(reranker.rerank("q", vec![], 3).await.unwrap().is_empty());
    assert!(backend.requests().await.is_empty());
}
