//! Completion service adapters for ragchat.
//!
//! Every adapter talks to the network through a [`ProviderBackend`], so tests
//! swap in [`FakeBackend`] and never open a socket. [`ScriptedChatModel`]
//! replays canned answers for retrieval and engine tests.

mod scripted;
pub use scripted::ScriptedChatModel;

pub mod backend;
pub use backend::{
    ByteStream, FakeBackend, HttpBackend, ProviderBackend, ProviderRequest, ProviderResponse,
};

mod ollama;
pub use ollama::{OllamaChatModel, OllamaConfig};

mod openai;
pub use openai::{OpenAiChatModel, OpenAiConfig};

mod retry;
pub use retry::{RetryChatModel, RetryPolicy};
