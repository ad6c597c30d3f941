//! Script tool: run a short Python or Bash program and return its output.
//!
//! The code is written to a temporary file and executed with a timeout. The
//! result is stdout, followed by `err: <stderr>` when anything was written
//! to stderr. An optional [`Confirm`] hook can veto each run.

use async_trait::async_trait;
use serde_json::Value;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolArguments, ToolResult};
use tokio::process::Command;
use tracing::{debug, warn};

pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Decides whether a script may run. Called on a blocking thread.
pub trait Confirm: Send + Sync {
    fn confirm(&self, language: &str, code: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn confirm(&self, language: &str, code: &str) -> bool {
        self(language, code)
    }
}

/// Prompts on the terminal and reads a `y`/`n` answer from stdin.
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, language: &str, code: &str) -> bool {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, ">> Run this {language} script?\n{code}\n(y/n): ");
        let _ = stderr.flush();

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Language {
    Python,
    Bash,
}

impl Language {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => Some(Self::Python),
            "bash" | "sh" | "shell" => Some(Self::Bash),
            _ => None,
        }
    }

    fn interpreter(self) -> &'static str {
        match self {
            Self::Python => "python3",
            Self::Bash => "bash",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Python => ".py",
            Self::Bash => ".sh",
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Bash => "bash",
        }
    }
}

pub struct ScriptTool {
    timeout: Duration,
    confirm: Option<Arc<dyn Confirm>>,
}

impl ScriptTool {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_SCRIPT_TIMEOUT,
            confirm: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask `confirm` before every run.
    pub fn with_confirm(self, confirm: impl Confirm + 'static) -> Self {
        self.with_shared_confirm(Arc::new(confirm))
    }

    pub fn with_shared_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = Some(confirm);
        self
    }

    async fn approved(&self, language: Language, code: &str) -> bool {
        let Some(confirm) = self.confirm.clone() else {
            return true;
        };
        let code = code.to_string();
        tokio::task::spawn_blocking(move || confirm.confirm(language.as_str(), &code))
            .await
            .unwrap_or(false)
    }

    async fn run(&self, language: Language, code: &str) -> Result<String, ToolError> {
        let failed = |e: std::io::Error| ToolError::failed("script", e.to_string());

        let mut file = tempfile::Builder::new()
            .prefix("stepwise-")
            .suffix(language.suffix())
            .tempfile()
            .map_err(failed)?;
        file.write_all(code.as_bytes()).map_err(failed)?;
        file.flush().map_err(failed)?;

        let child = Command::new(language.interpreter())
            .arg(file.path())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ToolError::Timeout {
                tool_name: "script".into(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(failed)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut text = stdout.trim().to_string();
        if !stderr.trim().is_empty() {
            text.push_str("\nerr: ");
            text.push_str(stderr.trim());
        }
        if !output.status.success() {
            warn!(language = language.as_str(), code = ?output.status.code(), "Script exited with failure");
        }
        Ok(text)
    }
}

impl Default for ScriptTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ScriptTool {
    fn name(&self) -> &str {
        "script"
    }

    fn description(&self) -> &str {
        "Run a short python or bash script and return what it prints. \
         Print results to stdout; do not start background processes."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["python", "bash"],
                    "description": "Script language"
                },
                "code": {
                    "type": "string",
                    "description": "The script source"
                }
            },
            "required": ["type", "code"]
        })
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<ToolResult, ToolError> {
        let kind = arguments
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("missing 'type'".into()))?;
        let language = Language::parse(kind)
            .ok_or_else(|| ToolError::InvalidArguments(format!("unsupported script type '{kind}'")))?;
        let code = arguments
            .get("code")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("missing 'code'".into()))?;

        if !self.approved(language, code).await {
            return Err(ToolError::Cancelled("script execution declined".into()));
        }

        debug!(language = language.as_str(), bytes = code.len(), "Running script");
        let output = self.run(language, code).await?;
        Ok(ToolResult::ok("script", output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(kind: &str, code: &str) -> ToolArguments {
        json!({"type": kind, "code": code}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn bash_stdout() {
        let result = ScriptTool::new().execute(args("bash", "echo hello")).await.unwrap();
        assert_eq!(result.content, "hello");
    }

    #[tokio::test]
    async fn stderr_is_appended() {
        let result = ScriptTool::new()
            .execute(args("bash", "echo out; echo oops >&2"))
            .await
            .unwrap();
        assert_eq!(result.content, "out\nerr: oops");
    }

    #[tokio::test]
    async fn slow_script_times_out() {
        let err = ScriptTool::new()
            .with_timeout(Duration::from_millis(200))
            .execute(args("bash", "sleep 5"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }

    #[tokio::test]
    async fn declined_confirmation_cancels() {
        let tool = ScriptTool::new().with_confirm(|_: &str, _: &str| false);
        let err = tool.execute(args("bash", "echo never")).await.unwrap_err();
        assert_eq!(err.to_string(), "cancelled by user: script execution declined");
    }

    #[tokio::test]
    async fn confirmation_sees_the_code() {
        let tool = ScriptTool::new().with_confirm(|lang: &str, code: &str| lang == "bash" && code.contains("echo"));
        let result = tool.execute(args("bash", "echo yes")).await.unwrap();
        assert_eq!(result.content, "yes");
    }

    #[tokio::test]
    async fn unsupported_language() {
        let err = ScriptTool::new().execute(args("ruby", "puts 1")).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
