use std::sync::Arc;

use async_trait::async_trait;
use ragchat_core::{
    AIMessageChunk, ChatModel, ChatRequest, ChatResponse, ChatStream, Message, RagError,
    TokenUsage,
};
use serde_json::{json, Map, Value};

use crate::backend::{ProviderBackend, ProviderRequest, ProviderResponse};

/// Sampling and runtime options forwarded to Ollama's `/api/chat`.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub model: String,
    pub base_url: String,
    pub keep_alive: Option<String>,
    pub temperature: Option<f64>,
    pub top_k: Option<u32>,
    pub top_p: Option<f64>,
    pub tfs_z: Option<f64>,
    pub repeat_last_n: Option<i64>,
    pub repeat_penalty: Option<f64>,
    pub num_ctx: Option<u32>,
    pub seed: Option<u64>,
}

impl OllamaConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: "http://localhost:11434".to_string(),
            keep_alive: None,
            temperature: None,
            top_k: None,
            top_p: None,
            tfs_z: None,
            repeat_last_n: None,
            repeat_penalty: None,
            num_ctx: None,
            seed: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_tfs_z(mut self, tfs_z: f64) -> Self {
        self.tfs_z = Some(tfs_z);
        self
    }

    pub fn with_repeat_last_n(mut self, repeat_last_n: i64) -> Self {
        self.repeat_last_n = Some(repeat_last_n);
        self
    }

    pub fn with_repeat_penalty(mut self, repeat_penalty: f64) -> Self {
        self.repeat_penalty = Some(repeat_penalty);
        self
    }

    pub fn with_context_window(mut self, num_ctx: u32) -> Self {
        self.num_ctx = Some(num_ctx);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn options(&self) -> Option<Value> {
        let mut options = Map::new();
        if let Some(v) = self.temperature {
            options.insert("temperature".into(), json!(v));
        }
        if let Some(v) = self.top_k {
            options.insert("top_k".into(), json!(v));
        }
        if let Some(v) = self.top_p {
            options.insert("top_p".into(), json!(v));
        }
        if let Some(v) = self.tfs_z {
            options.insert("tfs_z".into(), json!(v));
        }
        if let Some(v) = self.repeat_last_n {
            options.insert("repeat_last_n".into(), json!(v));
        }
        if let Some(v) = self.repeat_penalty {
            options.insert("repeat_penalty".into(), json!(v));
        }
        if let Some(v) = self.num_ctx {
            options.insert("num_ctx".into(), json!(v));
        }
        if let Some(v) = self.seed {
            options.insert("seed".into(), json!(v));
        }
        (!options.is_empty()).then_some(Value::Object(options))
    }
}

pub struct OllamaChatModel {
    config: OllamaConfig,
    backend: Arc<dyn ProviderBackend>,
}

impl OllamaChatModel {
    pub fn new(config: OllamaConfig, backend: Arc<dyn ProviderBackend>) -> Self {
        Self { config, backend }
    }

    fn build_request(&self, request: &ChatRequest, stream: bool) -> ProviderRequest {
        let messages: Vec<Value> = request.messages.iter().map(message_to_ollama).collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": stream,
        });
        if let Some(ref keep_alive) = self.config.keep_alive {
            body["keep_alive"] = json!(keep_alive);
        }
        if let Some(options) = self.config.options() {
            body["options"] = options;
        }

        ProviderRequest {
            url: format!("{}/api/chat", self.config.base_url),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
        }
    }
}

fn message_to_ollama(msg: &Message) -> Value {
    let role = match msg {
        Message::System { .. } => "system",
        Message::Human { .. } => "user",
        Message::AI { .. } => "assistant",
    };
    json!({
        "role": role,
        "content": msg.content(),
    })
}

fn parse_response(resp: &ProviderResponse) -> Result<ChatResponse, RagError> {
    check_error_status(resp)?;

    let content = resp.body["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string();
    let usage = parse_usage(&resp.body);

    Ok(ChatResponse {
        message: Message::ai(content),
        usage,
    })
}

fn check_error_status(resp: &ProviderResponse) -> Result<(), RagError> {
    if resp.status >= 400 {
        let msg = resp.body["error"]
            .as_str()
            .unwrap_or("unknown Ollama error")
            .to_string();
        return Err(RagError::Model(format!(
            "Ollama API error ({}): {}",
            resp.status, msg
        )));
    }
    Ok(())
}

fn parse_usage(body: &Value) -> Option<TokenUsage> {
    let prompt = body["prompt_eval_count"].as_u64();
    let completion = body["eval_count"].as_u64();
    match (prompt, completion) {
        (Some(p), Some(c)) => Some(TokenUsage {
            input_tokens: p as u32,
            output_tokens: c as u32,
            total_tokens: (p + c) as u32,
        }),
        _ => None,
    }
}

fn parse_ndjson_chunk(line: &str) -> Option<AIMessageChunk> {
    let v: Value = serde_json::from_str(line).ok()?;

    // {"message":{"role":"assistant","content":"..."}, "done":false}
    let content = v["message"]["content"].as_str().unwrap_or("").to_string();
    let done = v["done"].as_bool().unwrap_or(false);
    let usage = if done { parse_usage(&v) } else { None };

    Some(AIMessageChunk {
        content,
        usage,
        ..Default::default()
    })
}

#[async_trait]
impl ChatModel for OllamaChatModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RagError> {
        let provider_req = self.build_request(&request, false);
        let resp = self.backend.send(provider_req).await?;
        parse_response(&resp)
    }

    fn stream_chat(&self, request: ChatRequest) -> ChatStream<'_> {
        Box::pin(async_stream::stream! {
            let provider_req = self.build_request(&request, true);
            let byte_stream = match self.backend.send_stream(provider_req).await {
                Ok(s) => s,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            use futures::StreamExt;

            // NDJSON: accumulate bytes and split on newlines
            let mut buffer = String::new();
            let mut byte_stream = std::pin::pin!(byte_stream);

            while let Some(result) = byte_stream.next().await {
                match result {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        while let Some(pos) = buffer.find('\n') {
                            let line = buffer[..pos].trim().to_string();
                            buffer = buffer[pos + 1..].to_string();
                            if line.is_empty() {
                                continue;
                            }
                            if let Some(chunk) = parse_ndjson_chunk(&line) {
                                yield Ok(chunk);
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }

            let remaining = buffer.trim().to_string();
            if !remaining.is_empty() {
                if let Some(chunk) = parse_ndjson_chunk(&remaining) {
                    yield Ok(chunk);
                }
            }
        })
    }
}
