use std::sync::Arc;

use ragchat_embeddings::FakeEmbeddings;
use ragchat_vectorstores::{
    cosine_similarity, Chunk, InMemoryVectorStore, Retriever, VectorStore, VectorStoreRetriever,
};

fn legal_chunks() -> Vec<Chunk> {
    vec![
        Chunk::new("1", "termination notice period").with_file_name("labour.txt"),
        Chunk::new("2", "annual leave entitlement").with_file_name("labour.txt"),
        Chunk::new("3", "vehicle registration fee").with_file_name("traffic.txt"),
    ]
}

#[tokio::test]
async fn exact_match_ranks_first() {
    let embeddings = FakeEmbeddings::new(64);
    let store = InMemoryVectorStore::from_chunks(legal_chunks(), &embeddings)
        .await
        .unwrap();

    let results = store
        .similarity_search_with_score("annual leave entitlement", 3, &embeddings)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0.id, "2");
    assert!(results[0].1 > 0.99, "exact match score: {}", results[0].1);
    assert!(results[0].1 >= results[1].1);
    assert!(results[1].1 >= results[2].1);
}

#[tokio::test]
async fn chunks_keep_insertion_order_and_replace_in_place() {
    let embeddings = FakeEmbeddings::new(16);
    let store = InMemoryVectorStore::from_chunks(legal_chunks(), &embeddings)
        .await
        .unwrap();

    store
        .add_chunks(vec![Chunk::new("2", "sick leave")], &embeddings)
        .await
        .unwrap();

    let chunks = store.chunks().await.unwrap();
    let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(chunks[1].content, "sick leave");
    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn ties_resolve_by_insertion_order() {
    let embeddings = FakeEmbeddings::new(8);
    let store = InMemoryVectorStore::from_chunks(
        vec![
            Chunk::new("b", "same text"),
            Chunk::new("a", "same text"),
        ],
        &embeddings,
    )
    .await
    .unwrap();

    let results = store
        .similarity_search_with_score("same text", 2, &embeddings)
        .await
        .unwrap();
    assert_eq!(results[0].0.id, "b");
    assert_eq!(results[1].0.id, "a");
}

#[tokio::test]
async fn delete_and_clear() {
    let embeddings = FakeEmbeddings::new(16);
    let store = InMemoryVectorStore::from_chunks(legal_chunks(), &embeddings)
        .await
        .unwrap();

    store.delete(&["1", "3"]).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);

    store.clear().await;
    assert_eq!(store.count().await.unwrap(), 0);
    let results = store
        .similarity_search_with_score("anything", 5, &embeddings)
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn search_by_vector() {
    let store = InMemoryVectorStore::new();
    let embeddings = FakeEmbeddings::new(64);
    store.add_chunks(legal_chunks(), &embeddings).await.unwrap();

    let query = embeddings_query(&embeddings, "vehicle registration fee").await;
    let results = store.similarity_search_by_vector(&query, 1).await.unwrap();
    assert_eq!(results[0].0.id, "3");
}

async fn embeddings_query(embeddings: &FakeEmbeddings, text: &str) -> Vec<f32> {
    use ragchat_vectorstores::Embeddings;
    embeddings.embed_query(text).await.unwrap()
}

#[tokio::test]
async fn retriever_tags_scores_and_respects_top_k() {
    let embeddings = Arc::new(FakeEmbeddings::new(64));
    let store = Arc::new(
        InMemoryVectorStore::from_chunks(legal_chunks(), embeddings.as_ref())
            .await
            .unwrap(),
    );
    let retriever = VectorStoreRetriever::new(store, embeddings);

    let results = retriever.retrieve("termination notice period", 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id(), "1");
    assert!(results.iter().all(|r| r.retriever == "vector"));
    assert_eq!(retriever.name(), "vector");
}

#[tokio::test]
async fn retriever_score_threshold_filters() {
    let embeddings = Arc::new(FakeEmbeddings::new(64));
    let store = Arc::new(
        InMemoryVectorStore::from_chunks(legal_chunks(), embeddings.as_ref())
            .await
            .unwrap(),
    );
    let retriever = VectorStoreRetriever::new(store, embeddings).with_score_threshold(0.99);

    let results = retriever.retrieve("annual leave entitlement", 3).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id(), "2");
}

#[test]
fn cosine_of_mismatched_or_zero_vectors_is_zero() {
    assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
}
