//! Inference client for a local model-serving endpoint
//!
//! Provides:
//! - An `InferenceClient` trait for text and image prompts
//! - An Ollama-compatible HTTP implementation
//!
//! Generation never fails from the caller's point of view: upstream errors
//! are folded into the returned answer string.

use crate::config::InferenceConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Answer used when the model server omits the `response` field
pub const NO_RESPONSE: &str = "No response from model";

/// Trait for model-serving backends
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Generate a completion for `prompt` with `model`
    async fn generate_text(&self, prompt: &str, model: &str) -> String;

    /// Describe an image (base64, standard alphabet) with the vision model
    async fn generate_from_image(&self, image_base64: &str, prompt: &str) -> String;

    /// Model used for text prompts
    fn text_model(&self) -> &str;

    /// Check that the model server is reachable
    async fn ping(&self) -> Result<()>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<&'a str>>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Ollama-compatible client posting to `{base_url}/api/generate`
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    text_model: String,
    vision_model: String,
}

impl OllamaClient {
    /// Create a new client from configuration
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            vision_model: config.vision_model.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn vision_model(&self) -> &str {
        &self.vision_model
    }

    /// POST a generate request and fold every failure into a string
    async fn generate(&self, request: GenerateRequest<'_>) -> String {
        let start = Instant::now();
        let model = request.model;

        let (answer, success) = match self.call(&request).await {
            Ok(answer) => (answer, true),
            Err(message) => (message, false),
        };

        let elapsed = start.elapsed();
        metrics::record_inference(elapsed.as_secs_f64(), model, success);

        if success {
            info!(
                model = %model,
                latency_ms = elapsed.as_millis() as u64,
                answer_chars = answer.chars().count(),
                "Inference completed"
            );
        } else {
            warn!(
                model = %model,
                latency_ms = elapsed.as_millis() as u64,
                error = %answer,
                "Inference failed"
            );
        }

        answer
    }

    async fn call(&self, request: &GenerateRequest<'_>) -> std::result::Result<String, String> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| format!("Error: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!(
                "Error: model server returned status code {}",
                status.as_u16()
            ));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| format!("Error: {}", e))?;

        Ok(body.response.unwrap_or_else(|| NO_RESPONSE.to_string()))
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn generate_text(&self, prompt: &str, model: &str) -> String {
        self.generate(GenerateRequest {
            model,
            prompt,
            stream: false,
            images: None,
        })
        .await
    }

    async fn generate_from_image(&self, image_base64: &str, prompt: &str) -> String {
        self.generate(GenerateRequest {
            model: &self.vision_model,
            prompt,
            stream: false,
            images: Some(vec![image_base64]),
        })
        .await
    }

    fn text_model(&self) -> &str {
        &self.text_model
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::Upstream {
                message: format!("model server returned status code {}", response.status().as_u16()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tokio_test::{assert_err, assert_ok};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String) -> OllamaClient {
        OllamaClient::new(&InferenceConfig {
            base_url,
            timeout_secs: 5,
            ..InferenceConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_text_success() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let captured = seen.clone();
        let router = Router::new().route(
            "/api/generate",
            post(move |Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(body);
                    Json(json!({ "response": "Paris" }))
                }
            }),
        );
        let client = client(serve(router).await);

        let answer = client.generate_text("Capital of France?", "mistral").await;

        assert_eq!(answer, "Paris");
        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "mistral");
        assert_eq!(body["prompt"], "Capital of France?");
        assert_eq!(body["stream"], false);
        assert!(body.get("images").is_none());
    }

    #[tokio::test]
    async fn test_image_request_uses_vision_model() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let captured = seen.clone();
        let router = Router::new().route(
            "/api/generate",
            post(move |Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(body);
                    Json(json!({ "response": "A cat" }))
                }
            }),
        );
        let client = client(serve(router).await);

        let answer = client.generate_from_image("aGVsbG8=", "What is in this image?").await;

        assert_eq!(answer, "A cat");
        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "llava");
        assert_eq!(body["images"], json!(["aGVsbG8="]));
    }

    #[tokio::test]
    async fn test_upstream_status_becomes_answer() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let client = client(serve(router).await);

        let answer = client.generate_text("hello", "mistral").await;

        assert!(answer.contains("Error"));
        assert!(answer.contains("503"));
    }

    #[tokio::test]
    async fn test_missing_response_field() {
        let router = Router::new().route("/api/generate", post(|| async { Json(json!({})) }));
        let client = client(serve(router).await);

        assert_eq!(client.generate_text("hello", "mistral").await, NO_RESPONSE);
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client(format!("http://{}", addr));
        let answer = client.generate_text("hello", "mistral").await;

        assert!(answer.starts_with("Error: "));
        assert_err!(client.ping().await);
    }

    #[tokio::test]
    async fn test_ping() {
        let router = Router::new().route("/api/tags", get(|| async { Json(json!({ "models": [] })) }));
        let client = client(serve(router).await);

        assert_ok!(client.ping().await);
        assert_eq!(client.text_model(), "mistral");
    }
}
