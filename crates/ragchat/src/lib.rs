//! ragchat: retrieval-augmented chat over ingested documents.
//!
//! This crate re-exports the ragchat sub-crates for single-import usage.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `default` | `engine` |
//! | `models` | `ProviderBackend`, Ollama and OpenAI chat models, `ScriptedChatModel`, `RetryChatModel` |
//! | `embeddings` | Fake, Ollama and OpenAI embeddings |
//! | `vectorstores` | `InMemoryVectorStore`, `VectorStoreRetriever` |
//! | `retrieval` | BM25, query generation, score fusion, rerank stage, strategy router, `RetrieverFactory` |
//! | `flashrank` | Local lexical reranker |
//! | `huggingface` | BGE cross-encoder reranker over the HuggingFace inference API |
//! | `engine` | Chat engines, memory, settings and `RagPipeline`; enables everything above |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ragchat::engine::{ChatMode, RagPipeline, RagSettings};
//! use ragchat::models::HttpBackend;
//! ```

/// Core types and traits: `Chunk`, `ScoredChunk`, `Message`, `ChatModel`,
/// `Retriever`, `Reranker`, `RagError`. Always available.
pub use ragchat_core as core;

#[cfg(feature = "models")]
pub use ragchat_models as models;

#[cfg(feature = "embeddings")]
pub use ragchat_embeddings as embeddings;

#[cfg(feature = "vectorstores")]
pub use ragchat_vectorstores as vectorstores;

/// Hybrid fusion retrieval and strategy routing.
#[cfg(feature = "retrieval")]
pub use ragchat_retrieval as retrieval;

#[cfg(feature = "flashrank")]
pub use ragchat_flashrank as flashrank;

#[cfg(feature = "huggingface")]
pub use ragchat_huggingface as huggingface;

/// Conversation layer: chat engines, memory, settings, pipeline.
#[cfg(feature = "engine")]
pub use ragchat_engine as engine;
