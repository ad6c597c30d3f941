//! API call tool: issue HTTP requests against one configured service.
//!
//! The model describes each request as a path template plus argument maps:
//!
//! ```json
//! { "path": "/users/{user_id}", "method": "GET",
//!   "path_args": {"user_id": "123"}, "query_args": {"verbose": true},
//!   "data_args": {"name": "John"}, "headers": {"Authorization": "Bearer t"} }
//! ```
//!
//! Several requests may be batched in one call; each produces a
//! `{status_code, headers, data}` entry, with transport failures reported as
//! `{status_code: null, data: {error}}` rather than failing the whole batch.

use crate::envelope::{ResponseFormat, ToolEnvelope, call_signature};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolArguments, ToolResult};
use tracing::debug;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// One request as described by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiRequest {
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub query_args: Map<String, Value>,
    #[serde(default)]
    pub path_args: Map<String, Value>,
    #[serde(default)]
    pub data_args: Map<String, Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// What came back for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status_code: Option<u16>,
    pub headers: BTreeMap<String, String>,
    pub data: Value,
}

impl ApiResponse {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            status_code: None,
            headers: BTreeMap::new(),
            data: serde_json::json!({ "error": error.into() }),
        }
    }
}

pub struct ApiCallTool {
    base_url: String,
    client: reqwest::Client,
}

impl ApiCallTool {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: &ApiRequest) -> ApiResponse {
        let path = match expand_path(&request.path, &request.path_args) {
            Ok(path) => path,
            Err(e) => return ApiResponse::failed(e),
        };
        let method = match Method::from_bytes(request.method.to_ascii_uppercase().as_bytes()) {
            Ok(method) => method,
            Err(_) => return ApiResponse::failed(format!("invalid method '{}'", request.method)),
        };
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "API call");

        let query: Vec<(String, String)> = request
            .query_args
            .iter()
            .map(|(k, v)| (k.clone(), plain_value(v)))
            .collect();

        let has_body = matches!(method, Method::POST | Method::PUT | Method::PATCH);
        let mut builder = self.client.request(method, &url).query(&query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if has_body {
            let is_form = request
                .headers
                .iter()
                .any(|(k, v)| k.eq_ignore_ascii_case("content-type") && v.starts_with(FORM_CONTENT_TYPE));
            builder = if is_form {
                let form: Vec<(String, String)> = request
                    .data_args
                    .iter()
                    .map(|(k, v)| (k.clone(), plain_value(v)))
                    .collect();
                builder.form(&form)
            } else {
                builder.json(&request.data_args)
            };
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return ApiResponse::failed(e.to_string()),
        };

        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let data = match response.bytes().await {
            Ok(body) if body.is_empty() => Value::Null,
            Ok(body) => serde_json::from_slice(&body)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned())),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };

        ApiResponse {
            status_code: Some(status_code),
            headers,
            data,
        }
    }
}

/// Substitute `{name}` placeholders from `args`.
fn expand_path(template: &str, args: &Map<String, Value>) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| format!("unclosed placeholder in path '{template}'"))?;
        let name = &after[..end];
        let value = args
            .get(name)
            .ok_or_else(|| format!("missing path argument '{name}'"))?;
        out.push_str(&plain_value(value));
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Strings without quotes; everything else as JSON.
fn plain_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_requests(arguments: &ToolArguments) -> Result<Vec<ApiRequest>, ToolError> {
    let raw = arguments
        .get("api_calls")
        .or_else(|| arguments.get("api_call"))
        .cloned()
        .ok_or_else(|| ToolError::InvalidArguments("missing 'api_calls'".into()))?;
    let raw = match raw {
        Value::Array(items) => Value::Array(items),
        single @ Value::Object(_) => Value::Array(vec![single]),
        _ => return Err(ToolError::InvalidArguments("'api_calls' must be a list".into())),
    };
    serde_json::from_value(raw).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

#[async_trait]
impl Tool for ApiCallTool {
    fn name(&self) -> &str {
        "api_call"
    }

    fn description(&self) -> &str {
        "Call the HTTP API. Each entry gives a path (with {placeholders}), a method, \
         and optional path_args, query_args, data_args and headers. \
         Returns status code, headers and response data for each call."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "api_calls": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "path": {"type": "string", "description": "API path, e.g. /users/{user_id}"},
                            "method": {"type": "string", "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"]},
                            "query_args": {"type": "object"},
                            "path_args": {"type": "object"},
                            "data_args": {"type": "object", "description": "Request body for POST/PUT/PATCH"},
                            "headers": {"type": "object", "additionalProperties": {"type": "string"}}
                        },
                        "required": ["path", "method"]
                    }
                }
            },
            "required": ["api_calls"]
        })
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<ToolResult, ToolError> {
        let call = call_signature(self.name(), &arguments);
        let requests = parse_requests(&arguments)?;

        let mut responses = Vec::with_capacity(requests.len());
        for request in &requests {
            responses.push(self.send(request).await);
        }

        let data = serde_json::to_value(&responses)
            .map_err(|e| ToolError::failed(self.name(), e.to_string()))?;
        let envelope = if responses.iter().all(|r| r.status_code.is_none()) {
            ToolEnvelope {
                data: Some(data),
                ..ToolEnvelope::failed(call, ResponseFormat::Json, "no request reached the server")
            }
        } else {
            ToolEnvelope::ok(call, ResponseFormat::Json, data)
        };
        Ok(envelope.into_result(self.name()))
    }
}
