//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! call HTTP APIs, run scripts, read the clock, etc. Every tool is invoked
//! with named arguments and answers with text.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Named arguments passed to a tool.
pub type ToolArguments = Map<String, Value>;

/// A request to execute a tool, produced from a parsed `Action` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID
    pub tool_id: String,

    /// Name of the tool to execute
    pub tool_name: String,

    /// Keyword arguments
    #[serde(default)]
    pub arguments: ToolArguments,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            tool_id: uuid::Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// The result of a tool execution.
///
/// Failures are results too: `is_error` is set and `content` carries the
/// message the model will read as an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Which tool produced this
    pub tool_name: String,

    /// The output text
    pub content: String,

    /// The arguments the tool was called with
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub raw_input: ToolArguments,

    /// Whether the call failed
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            content: content.into(),
            raw_input: Map::new(),
            is_error: false,
        }
    }

    pub fn error(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::ok(tool_name, content)
        }
    }

    pub fn with_raw_input(mut self, raw_input: ToolArguments) -> Self {
        self.raw_input = raw_input;
        self
    }
}

/// The core Tool trait.
///
/// Each tool (api_call, script, datetime, …) implements this trait. Tools are
/// registered in the [`ToolRegistry`] and described to the model in the
/// system prompt.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "api_call").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: ToolArguments) -> Result<ToolResult, ToolError>;
}

/// A registry of available tools, ordered by name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replacing previously registered tool");
        }
    }

    /// Builder-style [`ToolRegistry::register`].
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Box::new(tool));
        self
    }

    /// Get a tool by exact name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Iterate over registered tools in name order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.values().map(|t| t.as_ref())
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: ToolArguments) -> Result<ToolResult, ToolError> {
            let text = arguments.get("text").and_then(Value::as_str).unwrap_or("");
            Ok(ToolResult::ok("echo", text))
        }
    }

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            ""
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: ToolArguments) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(self.0, ""))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = ToolRegistry::new().with(EchoTool);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("Echo").is_none());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn names_are_sorted() {
        let registry = ToolRegistry::new()
            .with(NamedTool("zeta"))
            .with(NamedTool("alpha"))
            .with(NamedTool("mid"));
        assert_eq!(registry.names(), vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn execute_through_registry() {
        let registry = ToolRegistry::new().with(EchoTool);
        let call = ToolCall::new("echo", serde_json::json!({"text": "hi"}).as_object().cloned().unwrap());
        let tool = registry.get(&call.tool_name).unwrap();
        let result = tool.execute(call.arguments.clone()).await.unwrap();
        assert_eq!(result, ToolResult::ok("echo", "hi"));
    }

    #[test]
    fn error_result_sets_flag() {
        let r = ToolResult::error("x", "boom");
        assert!(r.is_error);
        assert_eq!(r.content, "boom");
    }
}
