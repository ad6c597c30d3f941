//! The JSON envelope built-in tools wrap their results in.
//!
//! ```json
//! {"success": true, "data": "...", "message": "", "format": "text", "call": "datetime()"}
//! ```
//!
//! `call` echoes the invocation so the model can see exactly what ran.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stepwise_core::{ToolArguments, ToolResult};

/// How the model should read `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Json,
    Text,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: String,
    pub format: ResponseFormat,
    pub call: String,
}

impl ToolEnvelope {
    pub fn ok(call: impl Into<String>, format: ResponseFormat, data: impl Into<Value>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            message: String::new(),
            format,
            call: call.into(),
        }
    }

    pub fn failed(call: impl Into<String>, format: ResponseFormat, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
            format,
            call: call.into(),
        }
    }

    /// Serialize into a [`ToolResult`]; failures are flagged as errors.
    pub fn into_result(self, tool_name: &str) -> ToolResult {
        let content = serde_json::to_string(&self)
            .unwrap_or_else(|e| format!(r#"{{"success":false,"message":"{e}"}}"#));
        if self.success {
            ToolResult::ok(tool_name, content)
        } else {
            ToolResult::error(tool_name, content)
        }
    }
}

/// Render a call as `name(key=value, ...)` with JSON-encoded values.
pub fn call_signature(tool_name: &str, arguments: &ToolArguments) -> String {
    let args: Vec<String> = arguments.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{tool_name}({})", args.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn signature_lists_arguments() {
        let args = json!({"type": "bash", "code": "ls"});
        let signature = call_signature("script", args.as_object().unwrap());
        assert_eq!(signature, r#"script(code="ls", type="bash")"#);
        assert_eq!(call_signature("datetime", &ToolArguments::new()), "datetime()");
    }

    #[test]
    fn failed_envelope_is_an_error_result() {
        let result = ToolEnvelope::failed("api_call()", ResponseFormat::Json, "boom").into_result("api_call");
        assert!(result.is_error);
        let parsed: ToolEnvelope = serde_json::from_str(&result.content).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.message, "boom");
        assert_eq!(parsed.data, None);
    }

    #[test]
    fn format_serializes_lowercase() {
        let envelope = ToolEnvelope::ok("datetime()", ResponseFormat::Markdown, "# hi");
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["format"], "markdown");
        assert_eq!(value["data"], "# hi");
        assert_eq!(value["success"], true);
    }
}
