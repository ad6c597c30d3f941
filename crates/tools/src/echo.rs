//! Echo tool: returns its input unchanged. Handy for demos and smoke tests.

use async_trait::async_trait;
use serde_json::Value;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolArguments, ToolResult};

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Repeat the given text back verbatim."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The text to repeat"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<ToolResult, ToolError> {
        let text = match arguments.get("text") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => return Err(ToolError::InvalidArguments("missing 'text'".into())),
        };
        Ok(ToolResult::ok("echo", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn echoes_text() {
        let args = json!({"text": "hi"}).as_object().cloned().unwrap();
        let result = EchoTool.execute(args).await.unwrap();
        assert_eq!(result.content, "hi");
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn non_string_values_are_rendered() {
        let args = json!({"text": 42}).as_object().cloned().unwrap();
        assert_eq!(EchoTool.execute(args).await.unwrap().content, "42");
    }

    #[tokio::test]
    async fn missing_text_is_invalid() {
        let err = EchoTool.execute(ToolArguments::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
