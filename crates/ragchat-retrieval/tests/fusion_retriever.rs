mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    arc, ids, FailingReranker, FailingRetriever, ReversingReranker, SlowChatModel,
    StaticRetriever,
};
use ragchat_core::{ChatResponse, RagError, Retriever};
use ragchat_models::ScriptedChatModel;
use ragchat_retrieval::{
    FusionEngine, FusionMode, Language, NoopReranker, QueryBundle, QueryFusionRetriever,
    QueryGenerator, RerankStage,
};

fn engine() -> FusionEngine {
    FusionEngine::new(FusionMode::DistBasedScore, vec![0.4, 0.6]).unwrap()
}

const VECTOR_HITS: &[(&str, f32)] = &[
    ("v1", 0.91),
    ("v2", 0.85),
    ("v3", 0.77),
    ("v4", 0.60),
    ("v5", 0.42),
];

#[tokio::test]
async fn failed_lexical_retriever_degrades_to_vector_results() {
    let retriever = QueryFusionRetriever::new(
        vec![
            arc(FailingRetriever::new("bm25")),
            arc(StaticRetriever::new("vector", VECTOR_HITS)),
        ],
        engine(),
    )
    .unwrap();

    let results = retriever.retrieve("notice period", 10).await.unwrap();
    assert_eq!(ids(&results), vec!["v1", "v2", "v3", "v4", "v5"]);
    assert!(results.iter().all(|r| r.retriever == "vector"));
}

#[tokio::test]
async fn all_retrievers_failing_is_retrieval_failure() {
    let retriever = QueryFusionRetriever::new(
        vec![
            arc(FailingRetriever::new("bm25")),
            arc(FailingRetriever::new("vector")),
        ],
        engine(),
    )
    .unwrap();

    let err = retriever.retrieve("anything", 5).await.unwrap_err();
    assert!(err.is_retrieval_failure());
    assert!(err.to_string().contains("bm25"));
    assert!(err.to_string().contains("vector"));
}

#[tokio::test]
async fn empty_results_are_not_failures() {
    let retriever = QueryFusionRetriever::new(
        vec![
            arc(StaticRetriever::new("bm25", &[])),
            arc(StaticRetriever::new("vector", &[])),
        ],
        engine(),
    )
    .unwrap();

    assert!(retriever.retrieve("anything", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn waits_for_slow_retrievers_before_fusing() {
    let slow_lexical = QueryFusionRetriever::new(
        vec![
            arc(StaticRetriever::new("bm25", &[("lex", 5.0), ("both", 4.0)])
                .with_delay(Duration::from_millis(80))),
            arc(StaticRetriever::new("vector", &[("both", 0.9), ("vec", 0.8)])),
        ],
        engine(),
    )
    .unwrap();
    let slow_vector = QueryFusionRetriever::new(
        vec![
            arc(StaticRetriever::new("bm25", &[("lex", 5.0), ("both", 4.0)])),
            arc(StaticRetriever::new("vector", &[("both", 0.9), ("vec", 0.8)])
                .with_delay(Duration::from_millis(80))),
        ],
        engine(),
    )
    .unwrap();

    let a = slow_lexical.retrieve("q", 10).await.unwrap();
    let b = slow_vector.retrieve("q", 10).await.unwrap();

    assert_eq!(a.len(), 3);
    assert_eq!(ids(&a), ids(&b));
    assert_eq!(a[0].id(), "both");
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.score, y.score);
    }
}

#[tokio::test]
async fn dropping_the_call_drops_in_flight_retrievals() {
    let lexical = Arc::new(StaticRetriever::new("bm25", &[("lex", 5.0)]));
    let vector = Arc::new(
        StaticRetriever::new("vector", VECTOR_HITS).with_delay(Duration::from_millis(200)),
    );
    let retriever = QueryFusionRetriever::new(
        vec![
            lexical.clone() as Arc<dyn Retriever>,
            vector.clone() as Arc<dyn Retriever>,
        ],
        engine(),
    )
    .unwrap();

    let outcome =
        tokio::time::timeout(Duration::from_millis(20), retriever.retrieve("q", 10)).await;
    assert!(outcome.is_err());
    assert!(lexical.has_completed());
    assert_eq!(vector.seen_queries(), vec!["q"]);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!vector.has_completed());
}

#[tokio::test]
async fn generated_variants_fan_out_to_every_retriever() {
    let lexical = Arc::new(StaticRetriever::new("bm25", &[("a", 1.0)]));
    let vector = Arc::new(StaticRetriever::new("vector", &[("b", 0.5)]));
    let model = Arc::new(ScriptedChatModel::from_texts([
        "1. notice period for dismissal\n2) severance pay rules\n3. notice period",
    ]));

    let retriever = QueryFusionRetriever::new(
        vec![
            lexical.clone() as Arc<dyn Retriever>,
            vector.clone() as Arc<dyn Retriever>,
        ],
        engine(),
    )
    .unwrap()
    .with_query_generation(QueryGenerator::new(model.clone()), 4);

    retriever.retrieve("notice period", 10).await.unwrap();

    let expected = vec![
        "notice period".to_string(),
        "notice period for dismissal".to_string(),
        "severance pay rules".to_string(),
    ];
    let mut sorted = expected.clone();
    sorted.sort();
    assert_eq!(lexical.seen_queries(), sorted);
    assert_eq!(vector.seen_queries(), sorted);

    // asked for num_queries - 1 variants
    let prompt = model.requests().await[0].messages[0].content().to_string();
    assert!(prompt.contains("Generate 3 unique"));
    assert!(prompt.contains("### Original Query: notice period"));
}

#[tokio::test]
async fn generation_failure_falls_back_to_original_query() {
    let lexical = Arc::new(StaticRetriever::new("bm25", &[("a", 1.0)]));
    let model = Arc::new(ScriptedChatModel::with_results(vec![Err(RagError::Model(
        "offline".into(),
    ))]));

    let retriever = QueryFusionRetriever::new(
        vec![lexical.clone() as Arc<dyn Retriever>],
        FusionEngine::uniform(FusionMode::DistBasedScore, 1).unwrap(),
    )
    .unwrap()
    .with_query_generation(QueryGenerator::new(model), 5);

    let results = retriever.retrieve("q", 5).await.unwrap();
    assert_eq!(ids(&results), vec!["a"]);
    assert_eq!(lexical.seen_queries(), vec!["q".to_string()]);
}

#[tokio::test]
async fn generation_timeout_falls_back_to_original_query() {
    let lexical = Arc::new(StaticRetriever::new("bm25", &[("a", 1.0)]));
    let generator =
        QueryGenerator::new(Arc::new(SlowChatModel)).with_timeout(Duration::from_millis(50));

    let retriever = QueryFusionRetriever::new(
        vec![lexical.clone() as Arc<dyn Retriever>],
        FusionEngine::uniform(FusionMode::Simple, 1).unwrap(),
    )
    .unwrap()
    .with_query_generation(generator, 3);

    let results = tokio::time::timeout(Duration::from_secs(5), retriever.retrieve("q", 5))
        .await
        .expect("generation timeout should bound the call")
        .unwrap();
    assert_eq!(ids(&results), vec!["a"]);
    assert_eq!(lexical.seen_queries(), vec!["q".to_string()]);
}

#[tokio::test]
async fn generator_is_not_called_for_a_single_query() {
    let model = Arc::new(ScriptedChatModel::new(vec![ChatResponse::text("1. unused")]));
    let retriever = QueryFusionRetriever::new(
        vec![arc(StaticRetriever::new("bm25", &[("a", 1.0)]))],
        FusionEngine::uniform(FusionMode::Simple, 1).unwrap(),
    )
    .unwrap()
    .with_query_generation(QueryGenerator::new(model.clone()), 1);

    retriever.retrieve("q", 5).await.unwrap();
    assert_eq!(model.call_count().await, 0);
}

#[tokio::test]
async fn rerank_reorders_fused_candidates() {
    let retriever = QueryFusionRetriever::new(
        vec![
            arc(StaticRetriever::new("bm25", &[])),
            arc(StaticRetriever::new("vector", VECTOR_HITS)),
        ],
        engine(),
    )
    .unwrap()
    .with_rerank(RerankStage::new(Arc::new(ReversingReranker), 3));

    let results = retriever.retrieve("q", 10).await.unwrap();
    assert_eq!(ids(&results), vec!["v5", "v4", "v3"]);
}

#[tokio::test]
async fn failing_reranker_keeps_fusion_order_truncated() {
    let retriever = QueryFusionRetriever::new(
        vec![
            arc(StaticRetriever::new("bm25", &[])),
            arc(StaticRetriever::new("vector", VECTOR_HITS)),
        ],
        engine(),
    )
    .unwrap()
    .with_rerank(RerankStage::new(Arc::new(FailingReranker), 2));

    let results = retriever.retrieve("q", 10).await.unwrap();
    assert_eq!(ids(&results), vec!["v1", "v2"]);
}

#[tokio::test]
async fn noop_reranker_truncates_only() {
    let stage = RerankStage::new(Arc::new(NoopReranker), 2);
    let candidates = vec![
        common::scored("x", 0.1, "vector"),
        common::scored("y", 0.9, "vector"),
        common::scored("z", 0.5, "vector"),
    ];
    let results = stage.apply("q", candidates).await;
    assert_eq!(ids(&results), vec!["x", "y"]);
}

#[tokio::test]
async fn similarity_top_k_bounds_each_retriever_call() {
    let retriever = QueryFusionRetriever::new(
        vec![arc(StaticRetriever::new("vector", VECTOR_HITS))],
        FusionEngine::uniform(FusionMode::DistBasedScore, 1).unwrap(),
    )
    .unwrap()
    .with_similarity_top_k(2);

    let results = retriever.retrieve("q", 10).await.unwrap();
    assert_eq!(ids(&results), vec!["v1", "v2"]);
}

#[tokio::test]
async fn fuse_bundle_exposes_fusion_details() {
    let retriever = QueryFusionRetriever::new(
        vec![
            arc(StaticRetriever::new("bm25", &[("a", 2.0)])),
            arc(StaticRetriever::new("vector", &[("a", 0.9)])),
        ],
        engine(),
    )
    .unwrap()
    .with_language(Language::Czech);

    let bundle = QueryBundle::new("q").with_variants(vec!["q2".into()]);
    assert_eq!(bundle.count(), 2);
    assert_eq!(bundle.variants(), ["q2".to_string()]);

    let fused = retriever.fuse_bundle(&bundle).await.unwrap();
    assert_eq!(fused.len(), 1);
    let candidate = &fused.candidates()[0];
    assert_eq!(candidate.best_score, 2.0);
    // four one-element lists, each normalised to 1.0 and divided by two queries
    assert!((candidate.fused_score - 1.0).abs() < 1e-6);
}

#[test]
fn construction_checks_weight_count() {
    let err = QueryFusionRetriever::new(
        vec![arc(StaticRetriever::new("bm25", &[]))],
        engine(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, RagError::Config(_)));

    let err = QueryFusionRetriever::new(vec![], engine()).err().unwrap();
    assert!(matches!(err, RagError::Config(_)));
}
