//! Conversation layer for ragchat: token-bounded memory, simple and
//! retrieval-augmented chat engines, settings, and the pipeline that turns
//! ingested documents into an engine.

mod engine;
mod ingestion;
mod memory;
mod pipeline;
pub mod prompts;
mod settings;

pub use engine::{
    ChatAnswer, ChatEngine, ChatTurn, CondensePlusContextChatEngine, SimpleChatEngine,
};
pub use ingestion::{ChunkStore, Document, TokenSplitter};
pub use memory::ChatMemoryBuffer;
pub use pipeline::{ChatMode, RagPipeline};
pub use settings::{
    ChatSettings, IngestionSettings, LlmSettings, Provider, RagSettings, RerankProvider,
    RerankSettings, API_KEY_ENV,
};

pub use ragchat_retrieval::{Language, RetrieverSettings};
