//! DocChat API Gateway
//!
//! The HTTP front for document-aware chat.
//! Handles:
//! - Text, document and image chat
//! - Conversation history
//! - Predefined context status and questions
//! - Rate limiting
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware::Next,
    routing::{get, post},
    Router,
};
use docchat_common::{
    config::{AppConfig, ObservabilityConfig},
    inference::{InferenceClient, OllamaClient},
    metrics,
    store::{AppStores, PredefinedContext},
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Notify;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub stores: AppStores,
    pub inference: Arc<dyn InferenceClient>,
}

impl AppState {
    /// The requested conversation id, or the configured default
    pub fn conversation_id(&self, requested: Option<&str>) -> String {
        requested
            .filter(|id| !id.is_empty())
            .unwrap_or(self.config.conversation.default_id.as_str())
            .to_string()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration, from a single file when APP_CONFIG_FILE is set
    let config = match std::env::var("APP_CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        Err(_) => AppConfig::load().context("Failed to load configuration")?,
    };

    // Initialize tracing
    init_tracing(&config.observability);

    info!("Starting DocChat API Gateway v{}", docchat_common::VERSION);
    info!(
        service = %config.observability.service_name,
        text_model = %config.inference.text_model,
        vision_model = %config.inference.vision_model,
        inference_url = %config.inference.base_url,
        context_file = %config.context.file_path.display(),
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics_handle = if config.observability.metrics_enabled {
        Some(install_metrics_recorder(&config.observability.service_name)?)
    } else {
        None
    };

    tokio::fs::create_dir_all(&config.uploads.upload_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create upload directory {}",
                config.uploads.upload_dir.display()
            )
        })?;

    // Load predefined context once
    let context = PredefinedContext::load(&config.context.file_path).await;
    let stores = AppStores::in_memory(context, config.conversation.max_entries);

    let inference: Arc<dyn InferenceClient> = Arc::new(OllamaClient::new(&config.inference)?);

    let config = Arc::new(config);

    // Create app state
    let state = AppState {
        config: config.clone(),
        stores,
        inference,
    };

    // Build the router
    let mut app = create_router(state);
    if let Some(handle) = metrics_handle {
        app = app.merge(metrics_router(handle));
    }

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown = Arc::new(Notify::new());
    let trigger = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        trigger.notify_one();
    });

    let drain_timeout = config.shutdown_timeout();
    tokio::select! {
        result = server.into_future() => result?,
        _ = async {
            shutdown.notified().await;
            tokio::time::sleep(drain_timeout).await;
        } => warn!(timeout_secs = drain_timeout.as_secs(), "Graceful shutdown timed out"),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber; `RUST_LOG` overrides the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Install the Prometheus recorder and describe all metrics
///
/// Every series carries a `service` label.
fn install_metrics_recorder(service_name: &str) -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .add_global_label("service", service_name)
        .set_buckets_for_metric(
            Matcher::Full(metrics::metric_name("inference_duration_seconds")),
            metrics::INFERENCE_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(metrics::metric_name("excerpt_chars")),
            metrics::EXCERPT_BUCKETS,
        )?
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    metrics::register_metrics();
    Ok(handle)
}

/// Router serving the Prometheus scrape endpoint
fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(move || async move { handle.render() }))
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let mut api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Chat endpoints
        .route("/chat", post(handlers::chat::chat))
        .route("/context-qa", post(handlers::context::context_qa))

        // Conversation endpoints
        .route("/clear-conversation", post(handlers::conversations::clear_conversation))
        .route("/conversation-history", get(handlers::conversations::conversation_history))

        // Context endpoints
        .route("/context-status", get(handlers::context::context_status));

    let rate_limit = &state.config.rate_limit;
    if rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            rate_limit.requests_per_second,
            rate_limit.burst,
        );
        let limit = rate_limit.requests_per_second;
        api_routes = api_routes.layer(axum::middleware::from_fn(
            move |request: Request, next: Next| {
                middleware::rate_limit::rate_limit_middleware(request, next, limiter.clone(), limit)
            },
        ));
    }

    let body_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes);

    // Compose the app
    Router::new()
        .nest("/api", api_routes)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
