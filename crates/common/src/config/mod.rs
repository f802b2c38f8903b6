//! Configuration management for DocChat services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values

use crate::context::ExcerptOptions;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Model-serving endpoint configuration
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Upload handling configuration
    #[serde(default)]
    pub uploads: UploadConfig,

    /// Predefined context and excerpt selection
    #[serde(default)]
    pub context: ContextConfig,

    /// Conversation window configuration
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum request body size (uploads included)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InferenceConfig {
    /// Base URL of the model server (e.g. a local Ollama instance)
    #[serde(default = "default_inference_url")]
    pub base_url: String,

    /// Model used for text prompts
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Vision-capable model used for image prompts
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// Request timeout in seconds
    #[serde(default = "default_inference_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Directory for temporary upload artifacts
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Accepted document extensions (lower-case, no dot)
    #[serde(default = "default_document_extensions")]
    pub document_extensions: Vec<String>,

    /// Accepted image extensions (lower-case, no dot)
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    /// Predefined knowledge file, read once at startup
    #[serde(default = "default_context_file")]
    pub file_path: PathBuf,

    /// Character budget for a selected excerpt
    #[serde(default = "default_max_excerpt_chars")]
    pub max_excerpt_chars: usize,

    /// Maximum number of ranked paragraphs considered
    #[serde(default = "default_max_paragraphs")]
    pub max_paragraphs: usize,

    /// Paragraphs shorter than this (trimmed) are ignored
    #[serde(default = "default_min_paragraph_chars")]
    pub min_paragraph_chars: usize,

    /// Minimum keyword length
    #[serde(default = "default_min_keyword_chars")]
    pub min_keyword_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversationConfig {
    /// Entries retained per conversation
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Turns rendered into the prompt history block
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Identifier used when the caller supplies none
    #[serde(default = "default_conversation_id")]
    pub default_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Expose Prometheus metrics at /metrics
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default)]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }
fn default_max_upload_bytes() -> usize { 25 * 1024 * 1024 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_inference_url() -> String { "http://localhost:11434".to_string() }
fn default_text_model() -> String { "mistral".to_string() }
fn default_vision_model() -> String { "llava".to_string() }
fn default_inference_timeout() -> u64 { 120 }
fn default_upload_dir() -> PathBuf { PathBuf::from("uploads") }
fn default_document_extensions() -> Vec<String> { vec!["pdf".into(), "txt".into()] }
fn default_image_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif", "webp"].iter().map(|s| s.to_string()).collect()
}
fn default_context_file() -> PathBuf { PathBuf::from("context.txt") }
fn default_max_excerpt_chars() -> usize { 3000 }
fn default_max_paragraphs() -> usize { 10 }
fn default_min_paragraph_chars() -> usize { 20 }
fn default_min_keyword_chars() -> usize { 4 }
fn default_max_entries() -> usize { 20 }
fn default_history_turns() -> usize { 3 }
fn default_conversation_id() -> String { "default".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "docchat".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_metrics_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__INFERENCE__TEXT_MODEL=llama3
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get inference timeout as Duration
    pub fn inference_timeout(&self) -> Duration {
        self.inference.timeout()
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl InferenceConfig {
    /// Request timeout for the model server
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ContextConfig {
    /// Excerpt selection options for these settings
    pub fn excerpt_options(&self) -> ExcerptOptions {
        ExcerptOptions {
            max_length: self.max_excerpt_chars,
            max_paragraphs: self.max_paragraphs,
            min_paragraph_chars: self.min_paragraph_chars,
            min_keyword_chars: self.min_keyword_chars,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_inference_url(),
            text_model: default_text_model(),
            vision_model: default_vision_model(),
            timeout_secs: default_inference_timeout(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            document_extensions: default_document_extensions(),
            image_extensions: default_image_extensions(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            file_path: default_context_file(),
            max_excerpt_chars: default_max_excerpt_chars(),
            max_paragraphs: default_max_paragraphs(),
            min_paragraph_chars: default_min_paragraph_chars(),
            min_keyword_chars: default_min_keyword_chars(),
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            history_turns: default_history_turns(),
            default_id: default_conversation_id(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.inference.text_model, "mistral");
        assert_eq!(config.inference.vision_model, "llava");
        assert_eq!(config.inference_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_default_extensions() {
        let uploads = UploadConfig::default();
        assert_eq!(uploads.document_extensions, vec!["pdf", "txt"]);
        assert!(uploads.image_extensions.iter().any(|e| e == "webp"));
        assert_eq!(uploads.image_extensions.len(), 5);
    }

    #[test]
    fn test_partial_source_fills_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("inference.text_model", "llama3")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.inference.text_model, "llama3");
        assert_eq!(config.inference.base_url, "http://localhost:11434");
        assert_eq!(config.conversation.max_entries, 20);
        assert_eq!(config.context.max_excerpt_chars, 3000);
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("docchat-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[inference]\ntimeout_secs = 15\n\n[observability]\nservice_name = \"docchat-staging\"\n",
        )
        .unwrap();

        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.inference_timeout(), Duration::from_secs(15));
        assert_eq!(config.observability.service_name, "docchat-staging");
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_excerpt_options_from_context_config() {
        let options = ContextConfig::default().excerpt_options();
        assert_eq!(options, ExcerptOptions::default());
    }
}
