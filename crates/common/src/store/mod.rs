//! Process-lifetime stores
//!
//! Provides:
//! - Session document storage (extracted text keyed by session id)
//! - The predefined knowledge context, loaded once at startup
//! - `AppStores`, the bundle injected into the HTTP layer

use crate::conversation::{ConversationStore, InMemoryConversationStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Storage for extracted document text
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store `text` under `session_id`, replacing any previous document
    async fn put(&self, session_id: &str, text: String);

    async fn get(&self, session_id: &str) -> Option<String>;

    async fn contains(&self, session_id: &str) -> bool;

    /// Number of stored documents
    async fn len(&self) -> usize;
}

/// In-memory document store; entries live until the process exits
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, String>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put(&self, session_id: &str, text: String) {
        let replaced = self
            .documents
            .write()
            .await
            .insert(session_id.to_string(), text)
            .is_some();

        tracing::debug!(session_id = %session_id, replaced, "Document stored");
    }

    async fn get(&self, session_id: &str) -> Option<String> {
        self.documents.read().await.get(session_id).cloned()
    }

    async fn contains(&self, session_id: &str) -> bool {
        self.documents.read().await.contains_key(session_id)
    }

    async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}

/// Predefined knowledge text read from disk at startup
#[derive(Debug, Clone)]
pub struct PredefinedContext {
    path: PathBuf,
    text: Option<String>,
}

impl PredefinedContext {
    /// Read the context file at `path`
    ///
    /// A missing or unreadable file is not fatal; the context is simply
    /// reported as not loaded.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                tracing::info!(
                    path = %path.display(),
                    characters = text.chars().count(),
                    "Context file loaded"
                );
                Some(text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Context file not found");
                None
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read context file");
                None
            }
        };

        Self { path, text }
    }

    /// Context with the given text, as if loaded from `path`
    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: Some(text.into()),
        }
    }

    /// Context that was never loaded
    pub fn missing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            text: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.text.is_some()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Character count of the loaded text, if any
    pub fn char_count(&self) -> Option<usize> {
        self.text.as_ref().map(|text| text.chars().count())
    }
}

/// Stores shared by all request handlers
#[derive(Clone)]
pub struct AppStores {
    pub documents: Arc<dyn DocumentStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub context: Arc<PredefinedContext>,
}

impl AppStores {
    /// In-memory stores around an already loaded context
    pub fn in_memory(context: PredefinedContext, max_conversation_entries: usize) -> Self {
        Self {
            documents: Arc::new(InMemoryDocumentStore::new()),
            conversations: Arc::new(InMemoryConversationStore::new(max_conversation_entries)),
            context: Arc::new(context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_document_put_overwrites() {
        let store = InMemoryDocumentStore::new();
        store.put("manual", "first".to_string()).await;
        store.put("manual", "second".to_string()).await;

        assert_eq!(store.get("manual").await.as_deref(), Some("second"));
        assert_eq!(store.len().await, 1);
        assert!(store.contains("manual").await);
        assert!(store.get("other").await.is_none());
    }

    #[tokio::test]
    async fn test_context_load_missing_file() {
        let path = std::env::temp_dir().join(format!("docchat-missing-{}.txt", uuid::Uuid::new_v4()));
        let context = PredefinedContext::load(&path).await;

        assert!(!context.is_loaded());
        assert_eq!(context.char_count(), None);
        assert_eq!(context.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_context_load_existing_file() {
        let path = std::env::temp_dir().join(format!("docchat-context-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "Plant hours: 24/7.\n\nShift change at 06:00.").await.unwrap();

        let context = PredefinedContext::load(&path).await;
        tokio::fs::remove_file(&path).await.unwrap();

        assert!(context.is_loaded());
        assert_eq!(context.char_count(), Some(42));
        assert!(context.text().unwrap().starts_with("Plant hours"));
    }

    #[tokio::test]
    async fn test_app_stores_in_memory() {
        let stores = AppStores::in_memory(PredefinedContext::missing("context.txt"), 20);
        assert_eq!(stores.documents.len().await, 0);
        assert_eq!(stores.conversations.len().await, 0);
        assert!(!stores.context.is_loaded());
    }
}
