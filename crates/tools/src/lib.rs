//! Built-in tool implementations for Stepwise.
//!
//! Tools give the agent the ability to interact with the world:
//! call an HTTP API, run a short script, and read the clock.
//! Results from `api_call` and `datetime` are wrapped in a
//! [`ToolEnvelope`] so the model sees what ran and whether it worked.

pub mod api_call;
pub mod datetime;
pub mod echo;
pub mod envelope;
pub mod script;

pub use api_call::ApiCallTool;
pub use datetime::DateTimeTool;
pub use echo::EchoTool;
pub use envelope::{ResponseFormat, ToolEnvelope};
pub use script::{Confirm, ScriptTool, TerminalConfirm};

use std::sync::Arc;
use std::time::Duration;
use stepwise_config::ToolsConfig;
use stepwise_core::tool::ToolRegistry;
use tracing::warn;

/// Create a tool registry with the built-in tools enabled by `config`.
///
/// `api_call` is only registered when a base URL is configured. When
/// `script_confirm` is set, scripts go through `confirm`; without a hook the
/// `script` tool is left out entirely.
pub fn default_registry(config: &ToolsConfig, confirm: Option<Arc<dyn Confirm>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(EchoTool));
    registry.register(Box::new(DateTimeTool::new(config.utc_offset_hours)));

    let script = ScriptTool::new().with_timeout(Duration::from_secs(config.script_timeout_secs));
    match (config.script_confirm, confirm) {
        (false, _) => registry.register(Box::new(script)),
        (true, Some(confirm)) => registry.register(Box::new(script.with_shared_confirm(confirm))),
        (true, None) => warn!("script_confirm is set but nothing can confirm; script tool disabled"),
    }

    if let Some(base_url) = &config.api_base_url {
        registry.register(Box::new(ApiCallTool::new(base_url.clone())));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_call_needs_a_base_url() {
        let registry = default_registry(&ToolsConfig::default(), None);
        assert_eq!(registry.names(), ["datetime", "echo", "script"]);

        let config = ToolsConfig {
            api_base_url: Some("http://127.0.0.1:8000".into()),
            ..ToolsConfig::default()
        };
        let registry = default_registry(&config, None);
        assert!(registry.get("api_call").is_some());
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn confirmed_scripts_need_a_hook() {
        let config = ToolsConfig {
            script_confirm: true,
            ..ToolsConfig::default()
        };
        let registry = default_registry(&config, None);
        assert!(registry.get("script").is_none());
        assert_eq!(registry.names(), ["datetime", "echo"]);
    }

    #[tokio::test]
    async fn confirm_hook_guards_the_script_tool() {
        let config = ToolsConfig {
            script_confirm: true,
            ..ToolsConfig::default()
        };
        let deny: Arc<dyn Confirm> = Arc::new(|_: &str, _: &str| false);
        let registry = default_registry(&config, Some(deny));

        let args = serde_json::json!({"type": "bash", "code": "echo never"})
            .as_object()
            .cloned()
            .unwrap();
        let err = registry.get("script").unwrap().execute(args).await.unwrap_err();
        assert!(err.to_string().contains("declined"));
    }
}
