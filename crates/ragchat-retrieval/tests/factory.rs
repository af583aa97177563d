mod common;

use std::sync::Arc;

use ragchat_core::{Chunk, RagError, Retriever, VectorStore};
use ragchat_embeddings::FakeEmbeddings;
use ragchat_models::ScriptedChatModel;
use ragchat_retrieval::{Language, NoopReranker, RetrieverFactory, RetrieverSettings};
use ragchat_vectorstores::InMemoryVectorStore;

use common::OutageEmbeddings;

fn corpus(n: usize) -> Vec<Chunk> {
    (0..n)
        .map(|i| {
            Chunk::new(format!("c{i}"), format!("article {i} covers topic{i} obligations"))
                .with_file_name("code.txt")
        })
        .collect()
}

fn factory(settings: RetrieverSettings, model: Arc<ScriptedChatModel>) -> RetrieverFactory {
    RetrieverFactory::new(
        settings,
        Arc::new(FakeEmbeddings::new(64)),
        Arc::new(NoopReranker),
        model,
    )
    .unwrap()
}

#[tokio::test]
async fn small_corpus_gets_vector_retriever() {
    let model = Arc::new(ScriptedChatModel::new(vec![]));
    let factory = factory(RetrieverSettings::default(), model.clone());

    let retriever = factory.get_retriever(&corpus(4), Language::English).await.unwrap();
    assert_eq!(retriever.name(), "vector");

    let results = retriever.retrieve("topic2 obligations", 3).await.unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(model.call_count().await, 0);
}

#[tokio::test]
async fn small_corpus_embedding_outage_is_retrieval_failure() {
    let embeddings = Arc::new(OutageEmbeddings::new(64));
    let factory = RetrieverFactory::new(
        RetrieverSettings::default(),
        embeddings.clone(),
        Arc::new(NoopReranker),
        Arc::new(ScriptedChatModel::new(vec![])),
    )
    .unwrap();

    let retriever = factory.get_retriever(&corpus(3), Language::English).await.unwrap();
    assert_eq!(retriever.name(), "vector");
    embeddings.go_down();

    let err = retriever.retrieve("q", 3).await.unwrap_err();
    assert!(err.is_retrieval_failure());
    assert!(err.to_string().contains("embed service down"));
}

#[tokio::test]
async fn clear_query_on_large_corpus_skips_generation() {
    let model = Arc::new(ScriptedChatModel::from_texts([r#"{"choice": 2}"#]));
    let factory = factory(RetrieverSettings::default(), model.clone());

    let retriever = factory.get_retriever(&corpus(12), Language::English).await.unwrap();
    assert_eq!(retriever.name(), "router");

    let results = retriever.retrieve("topic7", 10).await.unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].id(), "c7");
    assert_eq!(model.call_count().await, 1);
}

#[tokio::test]
async fn ambiguous_query_on_large_corpus_generates_variants() {
    let model = Arc::new(ScriptedChatModel::from_texts([
        "1",
        "1. topic3 duties\n2. topic3 liabilities",
    ]));
    let factory = factory(
        RetrieverSettings::default().with_num_queries(3),
        model.clone(),
    );

    let retriever = factory.get_retriever(&corpus(12), Language::Czech).await.unwrap();
    let results = retriever.retrieve("topic3", 10).await.unwrap();

    assert_eq!(results[0].id(), "c3");
    assert_eq!(model.call_count().await, 2);
    let generation_prompt = model.requests().await[1].messages[0].content().to_string();
    assert!(generation_prompt.contains("Vygenerujte 2"));
}

#[tokio::test]
async fn explicit_threshold_overrides_top_k_rerank() {
    let model = Arc::new(ScriptedChatModel::new(vec![]));
    let settings = RetrieverSettings::default().with_rerank_threshold(20);
    let factory = factory(settings, model);

    let retriever = factory.get_retriever(&corpus(12), Language::English).await.unwrap();
    assert_eq!(retriever.name(), "vector");
}

#[tokio::test]
async fn builds_over_existing_store() {
    let embeddings = FakeEmbeddings::new(64);
    let store = Arc::new(InMemoryVectorStore::new());
    store.add_chunks(corpus(2), &embeddings).await.unwrap();

    let factory = factory(RetrieverSettings::default(), Arc::new(ScriptedChatModel::new(vec![])));
    let retriever = factory
        .get_retriever_with_store(store, Language::English)
        .await
        .unwrap();
    assert_eq!(retriever.retrieve("topic1", 1).await.unwrap()[0].id(), "c1");
}

#[test]
fn invalid_settings_fail_at_construction() {
    let settings = RetrieverSettings::default().with_retriever_weights(vec![1.0]);
    let result = RetrieverFactory::new(
        settings,
        Arc::new(FakeEmbeddings::new(4)),
        Arc::new(NoopReranker),
        Arc::new(ScriptedChatModel::new(vec![])),
    );
    assert!(matches!(result, Err(RagError::Config(_))));
}
