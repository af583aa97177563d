use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use ragchat_core::{ChatModel, ChatRequest};
use regex::Regex;

use crate::prompts::{query_gen_prompt, Language};

/// Leading list markers: `1.`, `2)`, `-`, `*`, `•`.
fn enumeration_regex() -> &'static Regex {
    static ENUMERATION: OnceLock<Regex> = OnceLock::new();
    ENUMERATION.get_or_init(|| Regex::new(r"^(?:\d+[.)]\s*|[-*•]\s+)").expect("valid enumeration pattern"))
}

/// Asks a chat model for paraphrases of a query. Never fails: any model
/// error, timeout or unusable output yields an empty list.
#[derive(Clone)]
pub struct QueryGenerator {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl QueryGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Up to `count` variants of `query`, none equal to it.
    pub async fn generate(&self, query: &str, count: usize, language: Language) -> Vec<String> {
        if count == 0 {
            return Vec::new();
        }

        let values = HashMap::from([
            ("num_queries", count.to_string()),
            ("query", query.to_string()),
        ]);
        let prompt = match query_gen_prompt(language).render(&values) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!("query generation prompt failed: {e}");
                return Vec::new();
            }
        };

        let response =
            tokio::time::timeout(self.timeout, self.model.chat(ChatRequest::from_prompt(prompt)))
                .await;
        let text = match response {
            Ok(Ok(response)) => response.message.content().to_string(),
            Ok(Err(e)) => {
                tracing::warn!("query generation failed, using original query only: {e}");
                return Vec::new();
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "query generation timed out, using original query only"
                );
                return Vec::new();
            }
        };

        let variants = parse_generated_queries(&text, query, count);
        tracing::debug!(requested = count, generated = variants.len(), "generated query variants");
        variants
    }
}

/// Extract at most `max` queries from model output, one per line, with
/// enumeration markers stripped. Blank lines, duplicates and copies of
/// `original` are dropped.
pub fn parse_generated_queries(text: &str, original: &str, max: usize) -> Vec<String> {
    let original = original.trim();
    let mut queries: Vec<String> = Vec::new();

    for line in text.lines() {
        let line = enumeration_regex().replace(line.trim(), "");
        let line = line.trim();
        if line.is_empty() || line == original || queries.iter().any(|q| q == line) {
            continue;
        }
        queries.push(line.to_string());
        if queries.len() == max {
            break;
        }
    }

    queries
}
