//! Waiter server library logic.
//!
//! Hosts the voice platform's LLM websocket, the signed webhook receiver and
//! a health probe on one axum router.

pub mod api_webhook;
pub mod api_ws;
pub mod config;

use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use waiter_agent::{AgentContext, HttpOrderSink, MemoryOrderSink, OrderSink, SinkError};
use waiter_llm::{PromptBuilder, Provider};
use waiter_types::CallConfig;

use crate::api_webhook::WebhookVerifier;
use crate::config::{Config, ConfigError, PersistenceConfig};

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Collaborators handed to every call's agent.
    pub agent: Arc<AgentContext>,
    /// Options announced to the voice platform on connect.
    pub call_config: CallConfig,
    /// Webhook signature verification.
    pub webhook: WebhookVerifier,
}

impl AppState {
    /// Assembles the state from loaded configuration and already-built
    /// collaborators.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Menu` if the configured menu cannot be loaded.
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn Provider>,
        sink: Arc<dyn OrderSink>,
    ) -> Result<Self, ConfigError> {
        let menu = Arc::new(config.agent.load_menu()?);
        let prompts = PromptBuilder::new(Arc::new(config.agent.profile()), Arc::clone(&menu));

        let webhook = WebhookVerifier::new(
            config.webhook.secret.clone(),
            Duration::from_secs(config.webhook.tolerance_secs),
        );
        if !webhook.is_configured() {
            tracing::warn!("no webhook secret configured, webhook deliveries will be rejected");
        }

        Ok(Self {
            agent: Arc::new(AgentContext {
                provider,
                prompts,
                menu,
                sink,
                settings: config.agent.settings(),
            }),
            call_config: CallConfig::default(),
            webhook,
        })
    }
}

/// Builds the order sink for the `[persistence]` section.
///
/// # Errors
///
/// Returns `SinkError` if the HTTP client cannot be constructed.
pub fn build_sink(config: &PersistenceConfig) -> Result<Arc<dyn OrderSink>, SinkError> {
    match &config.backend_api_url {
        Some(url) => {
            tracing::info!(%url, "forwarding orders to backend");
            Ok(Arc::new(HttpOrderSink::new(url.as_str())?))
        }
        None => {
            tracing::info!("no order backend configured, orders are kept in memory only");
            Ok(Arc::new(MemoryOrderSink::new()))
        }
    }
}

/// Health check handler.
///
/// Returns `200 OK` with server status and version.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(api_webhook::webhook_handler))
        .route("/llm-websocket/{call_id}", get(api_ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use waiter_llm::provider::mock::MockProvider;

    fn state() -> AppState {
        AppState::from_config(
            &Config::default(),
            Arc::new(MockProvider::default()),
            Arc::new(MemoryOrderSink::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let response = app(state())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = app(state())
            .oneshot(
                Request::builder()
                    .uri("/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn state_uses_configured_agent_settings() {
        let mut config = Config::default();
        config.agent.ending_sentence = "Bye now.".to_string();
        config.agent.max_tool_chain = 3;
        let state = AppState::from_config(
            &config,
            Arc::new(MockProvider::default()),
            Arc::new(MemoryOrderSink::new()),
        )
        .unwrap();

        assert_eq!(state.agent.settings.ending_sentence, "Bye now.");
        assert_eq!(state.agent.settings.max_tool_chain, 3);
        assert!(state.agent.menu.find("pad_thai").is_some());
        assert!(!state.webhook.is_configured());
    }

    #[test]
    fn sink_follows_persistence_config() {
        let memory = build_sink(&PersistenceConfig::default()).unwrap();
        assert!(format!("{memory:?}").starts_with("MemoryOrderSink"));

        let http = build_sink(&PersistenceConfig {
            backend_api_url: Some("http://localhost:8000".to_string()),
        })
        .unwrap();
        assert!(format!("{http:?}").starts_with("HttpOrderSink"));
    }
}
