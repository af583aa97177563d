use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use ragchat_core::{ChatModel, ChatRequest, RagError, Retriever, ScoredChunk};
use regex::Regex;
use serde_json::Value;

use crate::prompts::{single_select_prompt, Language};

/// The retrieval path taken for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Top-k vector matches only.
    Direct,
    /// Query expansion, hybrid fusion, rerank.
    FusionWithGeneration,
    /// Hybrid fusion over the original query alone, rerank.
    FusionTwoStage,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Direct => "direct",
            Strategy::FusionWithGeneration => "fusion_with_generation",
            Strategy::FusionTwoStage => "fusion_two_stage",
        })
    }
}

/// The selector's reading of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryClarity {
    Ambiguous,
    Clear,
}

/// Pure routing decision. `judgment` is `None` when the selector failed or
/// was never asked.
pub fn select_strategy(
    corpus_size: usize,
    threshold: usize,
    judgment: Option<QueryClarity>,
) -> Strategy {
    if corpus_size <= threshold {
        return Strategy::Direct;
    }
    match judgment {
        Some(QueryClarity::Clear) => Strategy::FusionTwoStage,
        Some(QueryClarity::Ambiguous) | None => Strategy::FusionWithGeneration,
    }
}

/// Judges whether a query is clear enough to skip query expansion.
#[async_trait]
pub trait StrategySelector: Send + Sync {
    async fn judge(&self, query: &str) -> Result<QueryClarity, RagError>;
}

const AMBIGUOUS_CHOICE: &str = "Use this tool when the user's query is ambiguous or unclear.";
const CLEAR_CHOICE: &str = "Use this tool when the user's query is clear and unambiguous.";

/// Single-choice selection by a chat model over two described options:
/// choice 1 is the ambiguous path, choice 2 the clear one.
pub struct LlmSingleSelector {
    model: Arc<dyn ChatModel>,
    language: Language,
}

impl LlmSingleSelector {
    pub fn new(model: Arc<dyn ChatModel>, language: Language) -> Self {
        Self { model, language }
    }

    fn prompt(&self, query: &str) -> Result<String, RagError> {
        let choices = [AMBIGUOUS_CHOICE, CLEAR_CHOICE];
        let context_list = choices
            .iter()
            .enumerate()
            .map(|(i, c)| format!("({}) {c}", i + 1))
            .collect::<Vec<_>>()
            .join("\n\n");
        let values = HashMap::from([
            ("num_choices", choices.len().to_string()),
            ("context_list", context_list),
            ("query_str", query.to_string()),
        ]);
        single_select_prompt(self.language).render(&values)
    }
}

#[async_trait]
impl StrategySelector for LlmSingleSelector {
    async fn judge(&self, query: &str) -> Result<QueryClarity, RagError> {
        let prompt = self.prompt(query)?;
        let response = self.model.chat(ChatRequest::from_prompt(prompt)).await?;
        match parse_choice(response.message.content(), 2)? {
            1 => Ok(QueryClarity::Ambiguous),
            _ => Ok(QueryClarity::Clear),
        }
    }
}

fn first_integer() -> &'static Regex {
    static FIRST_INTEGER: OnceLock<Regex> = OnceLock::new();
    FIRST_INTEGER.get_or_init(|| Regex::new(r"\d+").expect("valid integer pattern"))
}

/// Read a 1-based choice from selector output. Accepts `{"choice": n}`,
/// `[{"choice": n, ...}]`, or text whose first integer is the choice.
pub fn parse_choice(text: &str, num_choices: usize) -> Result<usize, RagError> {
    let trimmed = text.trim();

    let from_json = serde_json::from_str::<Value>(trimmed).ok().and_then(|v| {
        let choice = match &v {
            Value::Array(items) => items.first()?.get("choice")?.clone(),
            Value::Object(_) => v.get("choice")?.clone(),
            _ => return None,
        };
        choice.as_u64()
    });

    let choice = match from_json {
        Some(n) => n as usize,
        None => first_integer()
            .find(trimmed)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .ok_or_else(|| RagError::Parsing(format!("no choice found in selector output: {trimmed}")))?,
    };

    if choice == 0 || choice > num_choices {
        return Err(RagError::Parsing(format!(
            "choice {choice} out of range 1..={num_choices}"
        )));
    }
    Ok(choice)
}

/// The direct strategy: one retriever, no fusion. With nothing to fall back
/// on, its failure is a failure of every retriever for the query and comes
/// out as [`RagError::RetrievalFailed`].
pub struct DirectRetriever {
    inner: Arc<dyn Retriever>,
}

impl DirectRetriever {
    pub fn new(inner: Arc<dyn Retriever>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Retriever for DirectRetriever {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, RagError> {
        match self.inner.retrieve(query, top_k).await {
            Ok(results) => Ok(results),
            Err(e) if e.is_retrieval_failure() => Err(e),
            Err(e) => {
                tracing::warn!(retriever = self.inner.name(), error = %e, "direct retrieval failed");
                Err(RagError::RetrievalFailed(format!("{}: {e}", self.inner.name())))
            }
        }
    }
}

/// Picks a strategy once per query and delegates to the matching retriever.
/// A failure inside the chosen strategy is returned as is; there is no
/// fallback to another strategy. The direct arm is wrapped in a
/// [`DirectRetriever`].
pub struct RouterRetriever {
    corpus_size: usize,
    threshold: usize,
    selector: Arc<dyn StrategySelector>,
    timeout: Duration,
    direct: Arc<dyn Retriever>,
    with_generation: Arc<dyn Retriever>,
    two_stage: Arc<dyn Retriever>,
}

impl RouterRetriever {
    pub fn new(
        corpus_size: usize,
        threshold: usize,
        selector: Arc<dyn StrategySelector>,
        direct: Arc<dyn Retriever>,
        with_generation: Arc<dyn Retriever>,
        two_stage: Arc<dyn Retriever>,
    ) -> Self {
        Self {
            corpus_size,
            threshold,
            selector,
            timeout: Duration::from_secs(30),
            direct: Arc::new(DirectRetriever::new(direct)),
            with_generation,
            two_stage,
        }
    }

    /// Bound on the selector call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Decide the strategy for `query` without retrieving.
    pub async fn route(&self, query: &str) -> Strategy {
        if self.corpus_size <= self.threshold {
            return select_strategy(self.corpus_size, self.threshold, None);
        }

        let judgment = match tokio::time::timeout(self.timeout, self.selector.judge(query)).await {
            Ok(Ok(clarity)) => Some(clarity),
            Ok(Err(e)) => {
                tracing::warn!("strategy selection failed, defaulting to query generation: {e}");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "strategy selection timed out, defaulting to query generation"
                );
                None
            }
        };

        select_strategy(self.corpus_size, self.threshold, judgment)
    }

    fn retriever_for(&self, strategy: Strategy) -> &Arc<dyn Retriever> {
        match strategy {
            Strategy::Direct => &self.direct,
            Strategy::FusionWithGeneration => &self.with_generation,
            Strategy::FusionTwoStage => &self.two_stage,
        }
    }
}

#[async_trait]
impl Retriever for RouterRetriever {
    fn name(&self) -> &str {
        "router"
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, RagError> {
        let strategy = self.route(query).await;
        tracing::debug!(
            %strategy,
            corpus_size = self.corpus_size,
            threshold = self.threshold,
            "routing query"
        );
        self.retriever_for(strategy).retrieve(query, top_k).await
    }
}
