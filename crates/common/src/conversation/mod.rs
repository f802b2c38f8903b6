//! Conversation Window - Bounded per-conversation question/answer logs
//!
//! Provides:
//! - A store trait so persistence can be swapped later
//! - An in-memory store keeping the most recent entries per id
//! - History rendering for prompt injection

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Default number of entries retained per conversation
pub const DEFAULT_MAX_ENTRIES: usize = 20;

/// Default number of turns rendered into a prompt
pub const DEFAULT_HISTORY_TURNS: usize = 3;

/// Conversation id used when the caller supplies none
pub const DEFAULT_CONVERSATION_ID: &str = "default";

/// Header preceding rendered history
pub const HISTORY_HEADER: &str = "Previous conversation:";

/// One answered question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationEntry {
    /// Entry stamped with the current time
    pub fn now(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Render the last `max_turns` entries as a history block, or `""`
pub fn render_entries<'a, I>(entries: I, max_turns: usize) -> String
where
    I: ExactSizeIterator<Item = &'a ConversationEntry>,
{
    let skip = entries.len().saturating_sub(max_turns);
    let turns: Vec<String> = entries
        .skip(skip)
        .map(|entry| format!("User: {}\nAssistant: {}", entry.question, entry.answer))
        .collect();

    if turns.is_empty() {
        return String::new();
    }

    format!("{}\n\n{}", HISTORY_HEADER, turns.join("\n\n"))
}

/// Storage for conversation logs
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append an entry, evicting the oldest beyond capacity
    async fn append(&self, conversation_id: &str, entry: ConversationEntry);

    /// Render the last `max_turns` entries; empty when absent
    async fn render(&self, conversation_id: &str, max_turns: usize) -> String;

    /// Drop the log for `conversation_id`
    async fn clear(&self, conversation_id: &str);

    /// Entries oldest first; empty when absent
    async fn get(&self, conversation_id: &str) -> Vec<ConversationEntry>;

    /// Number of conversations currently held
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// In-memory conversation logs, lost on restart
pub struct InMemoryConversationStore {
    logs: RwLock<HashMap<String, VecDeque<ConversationEntry>>>,
    max_entries: usize,
}

impl InMemoryConversationStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append(&self, conversation_id: &str, entry: ConversationEntry) {
        let mut logs = self.logs.write().await;
        let log = logs.entry(conversation_id.to_string()).or_default();
        log.push_back(entry);
        while log.len() > self.max_entries {
            log.pop_front();
        }
    }

    async fn render(&self, conversation_id: &str, max_turns: usize) -> String {
        let logs = self.logs.read().await;
        match logs.get(conversation_id) {
            Some(log) => render_entries(log.iter(), max_turns),
            None => String::new(),
        }
    }

    async fn clear(&self, conversation_id: &str) {
        if self.logs.write().await.remove(conversation_id).is_some() {
            tracing::info!(conversation_id = %conversation_id, "Conversation cleared");
        }
    }

    async fn get(&self, conversation_id: &str) -> Vec<ConversationEntry> {
        self.logs
            .read()
            .await
            .get(conversation_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn len(&self) -> usize {
        self.logs.read().await.len()
    }
}
