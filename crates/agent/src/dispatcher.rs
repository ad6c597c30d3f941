//! Tool Dispatcher: resolve a tool by name, invoke it, and capture the outcome.
//!
//! Nothing a tool does escapes as an error: a missing tool, a returned
//! [`ToolError`], a timeout, or a panic all become an error [`ToolResult`]
//! whose text the model reads as an observation.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stepwise_core::{ToolCall, ToolError, ToolRegistry, ToolResult};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ToolDispatcher {
    tools: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl ToolDispatcher {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            timeout: None,
        }
    }

    /// Give up on any single tool call after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Run one tool call to completion.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let name = call.tool_name.as_str();
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, "Model requested an unknown tool");
            return ToolResult::error(name, format!("Tool {name} does not exist"))
                .with_raw_input(call.arguments.clone());
        };

        let started = Instant::now();
        let work = AssertUnwindSafe(tool.execute(call.arguments.clone())).catch_unwind();
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(outcome) => outcome,
                Err(_) => Ok(Err(ToolError::Timeout {
                    tool_name: name.to_string(),
                    timeout_secs: limit.as_secs(),
                })),
            },
            None => work.await,
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, "Tool call failed");
                ToolResult::error(name, format!("Error calling tool {name}: {e}"))
            }
            Err(panic) => {
                warn!(tool = %name, "Tool panicked");
                ToolResult::error(
                    name,
                    format!("Error calling tool {name}: panicked: {}", panic_message(panic.as_ref())),
                )
            }
        };

        debug!(tool = %name, duration_ms, is_error = result.is_error, "Tool call finished");
        result.with_raw_input(call.arguments.clone())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use stepwise_core::{Tool, ToolArguments};

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }
        fn description(&self) -> &str {
            "Uppercases text"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        async fn execute(&self, arguments: ToolArguments) -> Result<ToolResult, ToolError> {
            let text = arguments
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidArguments("missing 'text'".into()))?;
            Ok(ToolResult::ok("upper", text.to_uppercase()))
        }
    }

    struct Crash;

    #[async_trait]
    impl Tool for Crash {
        fn name(&self) -> &str {
            "crash"
        }
        fn description(&self) -> &str {
            ""
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _arguments: ToolArguments) -> Result<ToolResult, ToolError> {
            panic!("index out of bounds");
        }
    }

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }
        fn description(&self) -> &str {
            ""
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _arguments: ToolArguments) -> Result<ToolResult, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ToolResult::ok("sleepy", "awake"))
        }
    }

    fn dispatcher() -> ToolDispatcher {
        let tools = ToolRegistry::new().with(Upper).with(Crash).with(Sleepy);
        ToolDispatcher::new(Arc::new(tools))
    }

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall::new(name, args.as_object().cloned().unwrap_or_default())
    }

    #[tokio::test]
    async fn successful_call_records_raw_input() {
        let result = dispatcher().dispatch(&call("upper", json!({"text": "hi"}))).await;
        assert!(!result.is_error);
        assert_eq!(result.content, "HI");
        assert_eq!(result.raw_input.get("text"), Some(&json!("hi")));
    }

    #[tokio::test]
    async fn unknown_tool_names_the_tool() {
        let result = dispatcher().dispatch(&call("does_not_exist", json!({}))).await;
        assert!(result.is_error);
        assert_eq!(result.content, "Tool does_not_exist does not exist");
    }

    #[tokio::test]
    async fn lookup_is_case_sensitive() {
        let result = dispatcher().dispatch(&call("Upper", json!({"text": "x"}))).await;
        assert!(result.is_error);
        assert!(result.content.contains("Upper"));
    }

    #[tokio::test]
    async fn tool_error_becomes_observation_text() {
        let result = dispatcher().dispatch(&call("upper", json!({}))).await;
        assert!(result.is_error);
        assert_eq!(
            result.content,
            "Error calling tool upper: invalid arguments: missing 'text'"
        );
    }

    #[tokio::test]
    async fn panic_is_captured() {
        let result = dispatcher().dispatch(&call("crash", json!({}))).await;
        assert!(result.is_error);
        assert!(result.content.starts_with("Error calling tool crash: panicked"));
        assert!(result.content.contains("index out of bounds"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported() {
        let result = dispatcher()
            .with_timeout(Duration::from_secs(5))
            .dispatch(&call("sleepy", json!({})))
            .await;
        assert!(result.is_error);
        assert_eq!(result.content, "Error calling tool sleepy: timed out after 5s");
    }
}
