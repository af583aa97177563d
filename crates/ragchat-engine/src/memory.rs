use ragchat_core::Message;

/// Conversation history bounded by an estimated token budget.
///
/// Token counts use the ~4 chars per token heuristic. When the history is
/// read back, the oldest messages are dropped until the rest fits, and a
/// leading assistant message left without its question is dropped too.
#[derive(Debug, Clone)]
pub struct ChatMemoryBuffer {
    messages: Vec<Message>,
    token_limit: usize,
}

impl ChatMemoryBuffer {
    pub fn new(token_limit: usize) -> Self {
        Self {
            messages: Vec::new(),
            token_limit,
        }
    }

    pub fn estimate_tokens(text: &str) -> usize {
        text.len() / 4 + 1
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    pub fn put(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replace the stored history.
    pub fn set(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Everything stored, ignoring the budget.
    pub fn get_all(&self) -> &[Message] {
        &self.messages
    }

    /// The newest messages that fit in the budget, oldest first.
    pub fn get(&self) -> Vec<Message> {
        let mut total: usize = self
            .messages
            .iter()
            .map(|m| Self::estimate_tokens(m.content()))
            .sum();

        let mut start = 0;
        while total > self.token_limit && start < self.messages.len() {
            total -= Self::estimate_tokens(self.messages[start].content());
            start += 1;
        }
        while start < self.messages.len() && self.messages[start].is_ai() {
            start += 1;
        }

        self.messages[start..].to_vec()
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for ChatMemoryBuffer {
    fn default() -> Self {
        Self::new(10_000)
    }
}
