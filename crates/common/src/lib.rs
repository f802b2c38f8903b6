//! DocChat Common Library
//!
//! Shared code for the DocChat gateway including:
//! - Context selection (keywords, relevance, prompt composition)
//! - Conversation window
//! - Document and context stores
//! - Upload handling and text extraction
//! - Inference client abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod context;
pub mod conversation;
pub mod documents;
pub mod errors;
pub mod inference;
pub mod metrics;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use conversation::{ConversationEntry, ConversationStore, InMemoryConversationStore};
pub use errors::{AppError, Result};
pub use inference::{InferenceClient, OllamaClient};
pub use store::{AppStores, DocumentStore, InMemoryDocumentStore, PredefinedContext};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
