pub mod reranker;
pub use reranker::{BgeRerankerModel, HuggingFaceReranker};
