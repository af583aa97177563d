use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use ragchat_core::{
    get_buffer_string, AIMessageChunk, ChatModel, ChatRequest, ChatStream, Message, RagError,
    Retriever, ScoredChunk,
};
use ragchat_retrieval::{Language, PromptTemplate};
use tokio::sync::Mutex;

use crate::memory::ChatMemoryBuffer;
use crate::prompts::{condense_prompt, context_prompt, system_prompt};

/// One answer in progress: the token stream plus the chunks it cites.
pub struct ChatTurn<'a> {
    pub stream: ChatStream<'a>,
    pub sources: Vec<ScoredChunk>,
}

/// A finished answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatAnswer {
    pub text: String,
    pub sources: Vec<ScoredChunk>,
}

impl<'a> ChatTurn<'a> {
    /// Drain the stream into the full answer text.
    pub async fn collect(mut self) -> Result<ChatAnswer, RagError> {
        let mut merged = AIMessageChunk::default();
        while let Some(chunk) = self.stream.next().await {
            merged += chunk?;
        }
        Ok(ChatAnswer {
            text: merged.content,
            sources: self.sources,
        })
    }
}

/// A conversational front end over a completion model.
///
/// `history`, when given, replaces the engine's memory before answering.
/// The user message is recorded at once, the answer when its stream ends.
#[async_trait]
pub trait ChatEngine: Send + Sync {
    async fn stream_chat(
        &self,
        message: &str,
        history: Option<Vec<Message>>,
    ) -> Result<ChatTurn<'_>, RagError>;

    async fn chat(
        &self,
        message: &str,
        history: Option<Vec<Message>>,
    ) -> Result<ChatAnswer, RagError> {
        self.stream_chat(message, history).await?.collect().await
    }

    /// Forget the conversation.
    async fn reset(&self);

    async fn chat_history(&self) -> Vec<Message>;
}

/// Streams the model's deltas and stores the joined answer in `memory`
/// once the model stream ends without error.
fn recording_stream<'a>(
    llm: &'a dyn ChatModel,
    memory: &'a Mutex<ChatMemoryBuffer>,
    request: ChatRequest,
) -> ChatStream<'a> {
    Box::pin(async_stream::stream! {
        let mut answer = String::new();
        let mut failed = false;
        let mut inner = llm.stream_chat(request);
        while let Some(item) = inner.next().await {
            match item {
                Ok(chunk) => {
                    answer.push_str(&chunk.content);
                    yield Ok(chunk);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "answer stream failed");
                    failed = true;
                    yield Err(e);
                    break;
                }
            }
        }
        if !failed {
            memory.lock().await.put(Message::ai(answer));
        }
    })
}

/// Plain conversation with the model, used when no documents are loaded.
pub struct SimpleChatEngine {
    llm: Arc<dyn ChatModel>,
    memory: Mutex<ChatMemoryBuffer>,
    system_prompt: Option<String>,
}

impl SimpleChatEngine {
    pub fn new(llm: Arc<dyn ChatModel>, memory: ChatMemoryBuffer) -> Self {
        Self {
            llm,
            memory: Mutex::new(memory),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

#[async_trait]
impl ChatEngine for SimpleChatEngine {
    async fn stream_chat(
        &self,
        message: &str,
        history: Option<Vec<Message>>,
    ) -> Result<ChatTurn<'_>, RagError> {
        let mut messages = Vec::new();
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        {
            let mut memory = self.memory.lock().await;
            if let Some(history) = history {
                memory.set(history);
            }
            memory.put(Message::human(message));
            messages.extend(memory.get());
        }

        tracing::debug!(messages = messages.len(), "simple chat");
        Ok(ChatTurn {
            stream: recording_stream(self.llm.as_ref(), &self.memory, ChatRequest::new(messages)),
            sources: Vec::new(),
        })
    }

    async fn reset(&self) {
        self.memory.lock().await.reset();
    }

    async fn chat_history(&self) -> Vec<Message> {
        self.memory.lock().await.get_all().to_vec()
    }
}

/// Retrieval-augmented conversation.
///
/// A follow-up question is first condensed with the history into a
/// standalone question, which drives retrieval. The retrieved chunks are
/// rendered into the context prompt, appended to the system prompt, and the
/// model answers the original message over the history.
pub struct CondensePlusContextChatEngine {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn ChatModel>,
    memory: Mutex<ChatMemoryBuffer>,
    system_prompt: String,
    context_prompt: PromptTemplate,
    condense_prompt: PromptTemplate,
    top_k: usize,
}

impl CondensePlusContextChatEngine {
    /// Engine with the prompt set of `language`, retrieving ten chunks.
    pub fn new(
        retriever: Arc<dyn Retriever>,
        llm: Arc<dyn ChatModel>,
        memory: ChatMemoryBuffer,
        language: Language,
    ) -> Self {
        Self {
            retriever,
            llm,
            memory: Mutex::new(memory),
            system_prompt: system_prompt(language).to_string(),
            context_prompt: context_prompt(language),
            condense_prompt: condense_prompt(language),
            top_k: 10,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_context_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.context_prompt = prompt;
        self
    }

    pub fn with_condense_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.condense_prompt = prompt;
        self
    }

    /// Standalone form of `message`. Empty history skips the model call;
    /// a failed or empty rewrite falls back to `message`.
    async fn condense_question(&self, history: &[Message], message: &str) -> String {
        if history.is_empty() {
            return message.to_string();
        }

        let values = HashMap::from([
            ("chat_history", get_buffer_string(history, "user", "assistant")),
            ("question", message.to_string()),
        ]);
        let prompt = match self.condense_prompt.render(&values) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(error = %e, "condense prompt failed to render");
                return message.to_string();
            }
        };

        match self.llm.chat(ChatRequest::from_prompt(prompt)).await {
            Ok(response) => {
                let condensed = response.message.content().trim();
                if condensed.is_empty() {
                    message.to_string()
                } else {
                    tracing::debug!(condensed, "condensed follow-up question");
                    condensed.to_string()
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "question condensation failed, using raw question");
                message.to_string()
            }
        }
    }

    fn format_context(sources: &[ScoredChunk]) -> String {
        sources
            .iter()
            .map(|source| match source.chunk.file_name() {
                Some(file_name) => format!("file_name: {file_name}\n\n{}", source.content()),
                None => source.content().to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl ChatEngine for CondensePlusContextChatEngine {
    async fn stream_chat(
        &self,
        message: &str,
        history: Option<Vec<Message>>,
    ) -> Result<ChatTurn<'_>, RagError> {
        let chat_history = {
            let mut memory = self.memory.lock().await;
            if let Some(history) = history {
                memory.set(history);
            }
            memory.get()
        };

        let question = self.condense_question(&chat_history, message).await;

        let sources = match self.retriever.retrieve(&question, self.top_k).await {
            Ok(sources) => sources,
            Err(e) if e.is_retrieval_failure() => {
                tracing::warn!(error = %e, "retrieval failed, answering without context");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let system = if sources.is_empty() {
            self.system_prompt.clone()
        } else {
            let values = HashMap::from([("context_str", Self::format_context(&sources))]);
            format!("{}\n{}", self.system_prompt, self.context_prompt.render(&values)?)
        };

        let mut messages = vec![Message::system(system)];
        messages.extend(chat_history);
        messages.push(Message::human(message));
        self.memory.lock().await.put(Message::human(message));

        tracing::debug!(
            retriever = self.retriever.name(),
            sources = sources.len(),
            "context chat"
        );
        Ok(ChatTurn {
            stream: recording_stream(self.llm.as_ref(), &self.memory, ChatRequest::new(messages)),
            sources,
        })
    }

    async fn reset(&self) {
        self.memory.lock().await.reset();
    }

    async fn chat_history(&self) -> Vec<Message> {
        self.memory.lock().await.get_all().to_vec()
    }
}
