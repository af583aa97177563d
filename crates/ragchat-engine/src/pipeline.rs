use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use ragchat_core::{ChatModel, Chunk, Embeddings, Message, RagError, Reranker};
use ragchat_models::ProviderBackend;
use ragchat_retrieval::{Language, RetrieverFactory};

use crate::engine::{ChatEngine, ChatTurn, CondensePlusContextChatEngine, SimpleChatEngine};
use crate::ingestion::{ChunkStore, Document};
use crate::memory::ChatMemoryBuffer;
use crate::prompts::system_prompt;
use crate::settings::RagSettings;

/// How `RagPipeline::query` treats the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    /// Keep the history passed by the caller.
    #[default]
    Chat,
    /// Answer each question on its own.
    Qa,
}

impl FromStr for ChatMode {
    type Err = RagError;

    /// `"chat"` selects [`ChatMode::Chat`]; any other mode name is QA.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.trim().eq_ignore_ascii_case("chat") {
            ChatMode::Chat
        } else {
            ChatMode::Qa
        })
    }
}

/// Ties ingestion, retrieval and the chat engine together for one user.
pub struct RagPipeline {
    settings: RagSettings,
    language: Language,
    llm: Arc<dyn ChatModel>,
    factory: RetrieverFactory,
    documents: ChunkStore,
    engine: Option<Box<dyn ChatEngine>>,
}

impl RagPipeline {
    pub fn new(
        settings: RagSettings,
        llm: Arc<dyn ChatModel>,
        embeddings: Arc<dyn Embeddings>,
        reranker: Arc<dyn Reranker>,
    ) -> Result<Self, RagError> {
        settings.validate()?;
        let factory = RetrieverFactory::new(
            settings.retriever.clone(),
            embeddings,
            reranker,
            Arc::clone(&llm),
        )?;
        let documents = ChunkStore::new(settings.ingestion.splitter());
        Ok(Self {
            settings,
            language: Language::default(),
            llm,
            factory,
            documents,
            engine: None,
        })
    }

    /// Build every model from `settings`, all sharing `backend`.
    pub fn from_settings(
        settings: RagSettings,
        backend: Arc<dyn ProviderBackend>,
    ) -> Result<Self, RagError> {
        let llm = settings.build_chat_model(Arc::clone(&backend))?;
        let embeddings = settings.build_embeddings(Arc::clone(&backend))?;
        let reranker = settings.build_reranker(backend);
        Self::new(settings, llm, embeddings, reranker)
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Takes effect at the next `set_engine`.
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn documents(&self) -> &ChunkStore {
        &self.documents
    }

    /// Split `documents` and select them for the next engine. Returns the
    /// number of selected chunks.
    pub fn store_documents(&mut self, documents: Vec<Document>) -> usize {
        self.documents.store_documents(documents)
    }

    /// Read text files and select them for the next engine.
    pub async fn store_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<usize, RagError> {
        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            documents.push(Document::from_path(path).await?);
        }
        Ok(self.store_documents(documents))
    }

    /// Add pre-split chunks under `file_name`.
    pub fn store_chunks(&mut self, file_name: impl Into<String>, chunks: Vec<Chunk>) {
        self.documents.store_chunks(file_name, chunks);
    }

    pub fn reset_documents(&mut self) {
        self.documents.reset();
    }

    fn memory(&self) -> ChatMemoryBuffer {
        ChatMemoryBuffer::new(self.settings.chat.chat_token_limit)
    }

    fn simple_engine(&self) -> SimpleChatEngine {
        SimpleChatEngine::new(Arc::clone(&self.llm), self.memory())
            .with_system_prompt(system_prompt(self.language))
    }

    /// Build the engine for the selected documents: plain chat when there
    /// are none, retrieval-augmented chat otherwise.
    pub async fn set_engine(&mut self) -> Result<(), RagError> {
        let chunks = self.documents.ingested_chunks();
        let engine: Box<dyn ChatEngine> = if chunks.is_empty() {
            tracing::info!(language = %self.language, "no documents, using simple chat engine");
            Box::new(self.simple_engine())
        } else {
            let retriever = self.factory.get_retriever(&chunks, self.language).await?;
            tracing::info!(
                language = %self.language,
                chunks = chunks.len(),
                retriever = retriever.name(),
                "using context chat engine"
            );
            Box::new(
                CondensePlusContextChatEngine::new(
                    retriever,
                    Arc::clone(&self.llm),
                    self.memory(),
                    self.language,
                )
                .with_top_k(self.settings.retriever.similarity_top_k),
            )
        };
        self.engine = Some(engine);
        Ok(())
    }

    /// Drop the documents from the conversation and start over with plain
    /// chat.
    pub fn reset_engine(&mut self) {
        self.engine = Some(Box::new(self.simple_engine()));
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Answer `message`. In chat mode `history` replaces the engine memory;
    /// in QA mode the memory is cleared and `history` ignored.
    pub async fn query(
        &self,
        mode: ChatMode,
        message: &str,
        history: Vec<Message>,
    ) -> Result<ChatTurn<'_>, RagError> {
        let engine = self.engine.as_ref().ok_or_else(|| {
            RagError::Validation("no chat engine, call set_engine first".to_string())
        })?;
        match mode {
            ChatMode::Chat => engine.stream_chat(message, Some(history)).await,
            ChatMode::Qa => {
                engine.reset().await;
                engine.stream_chat(message, None).await
            }
        }
    }

    pub async fn clear_conversation(&self) {
        if let Some(engine) = &self.engine {
            engine.reset().await;
        }
    }

    pub async fn chat_history(&self) -> Vec<Message> {
        match &self.engine {
            Some(engine) => engine.chat_history().await,
            None => Vec::new(),
        }
    }
}
