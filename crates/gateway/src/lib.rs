//! HTTP gateway for Stepwise.
//!
//! Serves one shared [`ReactAgent`] over three transports:
//!
//! - `POST /v1/chat`: run to completion and return the answer as JSON
//! - `POST /v1/chat/stream`: every run event as a server-sent event
//! - `GET /ws/{client_id}`: websocket chat with per-connection memory
//!
//! plus `GET /health`, `GET /v1/tools`, and a small chat page at `/`.

pub mod api_v1;
pub mod frontend;
pub mod ws;

use axum::extract::DefaultBodyLimit;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use stepwise_agent::ReactAgent;
use stepwise_config::{AppConfig, ToolsConfig};
use stepwise_core::{Provider, ToolRegistry};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Maximum accepted request body.
const BODY_LIMIT: usize = 1024 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: Arc<ReactAgent>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(agent: ReactAgent) -> SharedState {
        Arc::new(Self {
            agent: Arc::new(agent),
        })
    }
}

/// Build a [`ReactAgent`] with the budgets and prompt settings from `config`.
pub fn agent_from_config(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
) -> ReactAgent {
    let settings = &config.agent;
    let mut agent = ReactAgent::new(provider, &config.default_model, tools)
        .with_temperature(config.default_temperature)
        .with_max_iterations(settings.max_iterations)
        .with_timeout(Duration::from_secs(settings.timeout_secs))
        .with_stream_capacity(settings.stream_capacity);

    if let Some(max) = config.default_max_tokens {
        agent = agent.with_max_tokens(max);
    }
    if let Some(limit) = settings.memory_token_limit {
        agent = agent.with_memory_token_limit(limit);
    }
    if let Some(secs) = settings.tool_timeout_secs {
        agent = agent.with_tool_timeout(Duration::from_secs(secs));
    }
    if let Some(context) = &settings.extra_context {
        agent = agent.with_extra_context(context.clone());
    }
    agent
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws/{client_id}", get(ws::ws_handler))
        .nest("/v1", api_v1::v1_router())
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Built-in tools for remote clients.
///
/// Nobody sits at the server's terminal, so no confirmation hook is
/// installed; with `script_confirm` set the `script` tool is not offered.
pub fn gateway_tools(config: &ToolsConfig) -> ToolRegistry {
    stepwise_tools::default_registry(config, None)
}

/// Start the gateway server and serve until the process exits.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let router = stepwise_providers::build_from_config(&config);
    let provider = router
        .default()
        .ok_or_else(|| format!("provider '{}' is not configured", config.default_provider))?;
    let tools = Arc::new(gateway_tools(&config.tools));
    let agent = agent_from_config(&config, provider, tools);

    info!(
        model = %config.default_model,
        provider = %config.default_provider,
        tools = agent.tools().len(),
        "Gateway agent ready"
    );

    let app = build_router(GatewayState::new(agent));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use stepwise_providers::ScriptedProvider;
    use stepwise_tools::EchoTool;

    pub const ECHO_HI: &str =
        "Thought: I should repeat the greeting.\nAction: echo\nAction Input: {\"text\": \"hi\"}";
    pub const ANSWER_DONE: &str = "Thought: The tool replied, I can answer.\nAnswer: done";

    pub fn state_with(provider: ScriptedProvider) -> SharedState {
        let tools = Arc::new(ToolRegistry::new().with(EchoTool));
        GatewayState::new(ReactAgent::new(Arc::new(provider), "test-model", tools))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use stepwise_providers::ScriptedProvider;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_check() {
        let app = build_router(state_with(ScriptedProvider::new(Vec::<String>::new())));
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn websocket_route_requires_upgrade() {
        let app = build_router(state_with(ScriptedProvider::new(Vec::<String>::new())));
        let req = Request::builder().uri("/ws/alice").body(Body::empty()).unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_ne!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = build_router(state_with(ScriptedProvider::new(Vec::<String>::new())));
        let req = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn agent_settings_come_from_config() {
        let mut config = AppConfig::default();
        config.default_model = "gpt-test".into();
        let provider = Arc::new(ScriptedProvider::new(Vec::<String>::new()));
        let tools = Arc::new(ToolRegistry::new());
        let agent = agent_from_config(&config, provider, tools);
        assert_eq!(agent.model(), "gpt-test");
        assert!(agent.tools().is_empty());
    }

    #[test]
    fn scripts_needing_confirmation_are_not_served() {
        let confirmed = ToolsConfig {
            script_confirm: true,
            ..ToolsConfig::default()
        };
        let tools = gateway_tools(&confirmed);
        assert!(tools.get("script").is_none());
        assert!(tools.get("echo").is_some());

        assert!(gateway_tools(&ToolsConfig::default()).get("script").is_some());
    }

    #[tokio::test]
    async fn served_scripts_never_prompt() {
        let tools = gateway_tools(&ToolsConfig::default());
        let args = serde_json::json!({"type": "bash", "code": "echo served"})
            .as_object()
            .cloned()
            .unwrap();
        let result = tools.get("script").unwrap().execute(args).await.unwrap();
        assert_eq!(result.content, "served");
    }
}
