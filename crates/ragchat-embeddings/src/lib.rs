mod fake;
mod ollama;
mod openai;
mod response;

pub use fake::FakeEmbeddings;
pub use ollama::{OllamaEmbeddings, OllamaEmbeddingsConfig};
pub use openai::{OpenAiEmbeddings, OpenAiEmbeddingsConfig};

pub use ragchat_core::Embeddings;
