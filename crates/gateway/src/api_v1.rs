//! `/v1` routes: tool listing, blocking chat, and the SSE chat stream.

use crate::SharedState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use stepwise_agent::{AgentEvent, AgentOutcome, ReactOutput, WorkflowError};
use stepwise_core::ChatMemory;
use tracing::{info, warn};

pub fn v1_router() -> Router<SharedState> {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolInfo>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Earlier turns to continue from.
    #[serde(default)]
    pub memory: Option<ChatMemory>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

/// `GET /v1/tools`
async fn list_tools(State(state): State<SharedState>) -> Json<ToolListResponse> {
    let tools: Vec<ToolInfo> = state
        .agent
        .tools()
        .iter()
        .map(|tool| ToolInfo {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        })
        .collect();
    let count = tools.len();
    Json(ToolListResponse { tools, count })
}

fn start_run(
    state: &SharedState,
    payload: ChatRequest,
) -> Result<stepwise_agent::AgentHandle, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }
    let started = match payload.memory {
        Some(memory) => state.agent.run_with_memory(payload.message, memory),
        None => state.agent.run(payload.message),
    };
    started.map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// `POST /v1/chat`: run to completion and return the answer with its trace.
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ReactOutput>, ApiError> {
    let handle = start_run(&state, payload)?;
    info!(run_id = handle.run_id(), "v1/chat request");

    match handle.await {
        Ok(AgentOutcome::Done(output)) => Ok(Json(output)),
        Ok(AgentOutcome::TimedOut { budget, elapsed }) => Err(api_error(
            StatusCode::GATEWAY_TIMEOUT,
            format!("{budget} budget exhausted after {:.1}s", elapsed.as_secs_f64()),
        )),
        Ok(AgentOutcome::Cancelled) => Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "run was cancelled",
        )),
        Err(e) => {
            warn!(error = %e, "Chat run failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

fn sse_event(event: &AgentEvent) -> SseEvent {
    let data = serde_json::to_string(event).unwrap_or_default();
    SseEvent::default().event(event.event_type()).data(data)
}

/// Trailing `error` event for runs that ended without an answer.
fn outcome_event(outcome: Result<AgentOutcome, WorkflowError>) -> Option<SseEvent> {
    let message = match outcome {
        Ok(AgentOutcome::Done(_)) | Ok(AgentOutcome::Cancelled) => return None,
        Ok(AgentOutcome::TimedOut { budget, .. }) => format!("{budget} budget exhausted"),
        Err(e) => e.to_string(),
    };
    let data = serde_json::to_string(&ErrorResponse { error: message }).unwrap_or_default();
    Some(SseEvent::default().event("error").data(data))
}

/// `POST /v1/chat/stream`: send a message, receive every run event over SSE.
///
/// The stream ends after `stop`, followed by an `error` event if the run
/// failed or timed out. Dropping the connection cancels the run.
async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let mut handle = start_run(&state, payload)?;
    info!(run_id = handle.run_id(), "v1/chat/stream SSE request");

    let events = handle
        .stream_events()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let guard = handle.cancellation_token().drop_guard();

    let tail = futures::stream::once(async move {
        let outcome = handle.await;
        drop(guard);
        outcome_event(outcome)
    })
    .filter_map(futures::future::ready);

    let stream = events
        .map(|event| sse_event(&event))
        .chain(tail)
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
