use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use ragchat_core::{ChatModel, ChatRequest, ChatResponse, RagError};
use tokio::sync::Mutex;

/// Replays queued responses in order and records every request it sees.
#[derive(Clone)]
pub struct ScriptedChatModel {
    responses: Arc<Mutex<VecDeque<Result<ChatResponse, RagError>>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedChatModel {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Script that may also fail on given turns.
    pub fn with_results(results: Vec<Result<ChatResponse, RagError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(results))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience for scripts of plain-text answers.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(ChatResponse::text).collect())
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RagError> {
        self.requests.lock().await.push(request);
        let mut responses = self.responses.lock().await;
        responses
            .pop_front()
            .unwrap_or_else(|| Err(RagError::Model("scripted model exhausted responses".to_string())))
    }
}
