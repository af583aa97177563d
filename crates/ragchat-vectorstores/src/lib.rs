mod in_memory;

pub use in_memory::{cosine_similarity, InMemoryVectorStore, VectorStoreRetriever};

pub use ragchat_core::{Chunk, Embeddings, Retriever, ScoredChunk, VectorStore};
