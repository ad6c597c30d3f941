//! Websocket chat.
//!
//! Each text frame from the client starts a run that continues the
//! connection's conversation. The server answers with prefixed text frames:
//!
//! | Frame             | Meaning                          |
//! |-------------------|----------------------------------|
//! | `0:{delta}`       | a piece of the model's output    |
//! | `a:{output}`      | a tool result                    |
//! | `e:{message}`     | the run failed or timed out      |
//! | `d:=== end ===`   | the run is over                  |
//!
//! Closing the socket mid-run cancels the run.

use crate::SharedState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::StreamExt;
use stepwise_agent::{AgentEvent, AgentHandle, AgentOutcome, WorkflowError};
use stepwise_core::ChatMemory;
use tracing::{debug, info, warn};

pub const END_FRAME: &str = "d:=== end ===";

/// `GET /ws/{client_id}`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, client_id))
}

/// The wire frame for a streamed event, if it has one.
pub fn frame(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::Stream { delta } => Some(format!("0:{delta}")),
        AgentEvent::ToolResultMessage { output } => Some(format!("a:{}", output.content)),
        AgentEvent::Stop => Some(END_FRAME.to_string()),
        _ => None,
    }
}

/// Frames that close a run, and the memory to carry into the next turn.
fn finish(outcome: Result<AgentOutcome, WorkflowError>) -> (Vec<String>, Option<ChatMemory>) {
    match outcome {
        Ok(AgentOutcome::Done(output)) => (vec![END_FRAME.to_string()], Some(output.memory)),
        Ok(AgentOutcome::Cancelled) => (vec![END_FRAME.to_string()], None),
        Ok(AgentOutcome::TimedOut { budget, elapsed }) => (
            vec![
                format!(
                    "e:run timed out: {budget} budget exhausted after {:.1}s",
                    elapsed.as_secs_f64()
                ),
                END_FRAME.to_string(),
            ],
            None,
        ),
        Err(e) => (vec![format!("e:{e}"), END_FRAME.to_string()], None),
    }
}

enum Turn {
    Finished(Option<ChatMemory>),
    Disconnected,
}

async fn send(socket: &mut WebSocket, frame: String) -> bool {
    socket.send(Message::Text(frame.into())).await.is_ok()
}

async fn handle_connection(mut socket: WebSocket, state: SharedState, client_id: String) {
    info!(client_id = %client_id, "WebSocket connection established");
    let mut memory = ChatMemory::new();

    while let Some(msg) = socket.recv().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.as_str().to_string(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(_) => break,
        };
        if text.trim().is_empty() {
            continue;
        }

        let handle = match state.agent.run_with_memory(text, memory.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                if !send(&mut socket, format!("e:{e}")).await {
                    break;
                }
                continue;
            }
        };
        debug!(client_id = %client_id, run_id = handle.run_id(), "Run started");

        match relay(&mut socket, handle).await {
            Turn::Finished(Some(next)) => memory = next,
            Turn::Finished(None) => {}
            Turn::Disconnected => break,
        }
    }

    info!(client_id = %client_id, "WebSocket connection closed");
}

/// Forward one run's events to the socket until the run is over.
async fn relay(socket: &mut WebSocket, mut handle: AgentHandle) -> Turn {
    let mut events = match handle.stream_events() {
        Ok(events) => events,
        Err(e) => {
            handle.cancel();
            let (frames, _) = finish(Err(e));
            for f in frames {
                if !send(socket, f).await {
                    return Turn::Disconnected;
                }
            }
            return Turn::Finished(None);
        }
    };

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                // The end frame waits until the outcome is known.
                if matches!(event, AgentEvent::Stop) {
                    continue;
                }
                if let Some(f) = frame(&event) {
                    if !send(socket, f).await {
                        handle.cancel();
                        return Turn::Disconnected;
                    }
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(_))) => {
                    if !send(socket, "e:a run is already in progress".to_string()).await {
                        handle.cancel();
                        return Turn::Disconnected;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    warn!(run_id = handle.run_id(), "Client left mid-run, cancelling");
                    handle.cancel();
                    return Turn::Disconnected;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    let (frames, memory) = finish(handle.await);
    for f in frames {
        if !send(socket, f).await {
            return Turn::Disconnected;
        }
    }
    Turn::Finished(memory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use stepwise_agent::{BudgetKind, ReactOutput};
    use stepwise_core::{ChatMessage, ToolResult};

    #[test]
    fn stream_and_tool_frames() {
        assert_eq!(
            frame(&AgentEvent::Stream { delta: "Hel".into() }).as_deref(),
            Some("0:Hel")
        );
        assert_eq!(
            frame(&AgentEvent::ToolResultMessage {
                output: ToolResult::ok("echo", "hi"),
            })
            .as_deref(),
            Some("a:hi")
        );
        assert_eq!(frame(&AgentEvent::Stop).as_deref(), Some(END_FRAME));
        assert!(frame(&AgentEvent::Prep).is_none());
        assert!(frame(&AgentEvent::Input { messages: vec![] }).is_none());
    }

    #[test]
    fn answer_ends_the_turn_and_keeps_memory() {
        let mut memory = ChatMemory::new();
        memory.put(ChatMessage::user("hi"));
        memory.put(ChatMessage::assistant("hello"));
        let output = ReactOutput {
            response: "hello".into(),
            reasoning: vec![],
            sources: vec![],
            memory,
        };

        let (frames, memory) = finish(Ok(AgentOutcome::Done(output)));
        assert_eq!(frames, [END_FRAME]);
        assert_eq!(memory.unwrap().len(), 2);
    }

    #[test]
    fn timeout_reports_an_error_first() {
        let (frames, memory) = finish(Ok(AgentOutcome::TimedOut {
            budget: BudgetKind::Iterations,
            elapsed: Duration::from_millis(1500),
        }));
        assert_eq!(
            frames,
            ["e:run timed out: iterations budget exhausted after 1.5s", END_FRAME]
        );
        assert!(memory.is_none());
    }

    #[test]
    fn failure_reports_the_error() {
        let err = WorkflowError::Unroutable { kind: "prep".into() };
        let (frames, _) = finish(Err(err));
        assert!(frames[0].starts_with("e:"));
        assert_eq!(frames[1], END_FRAME);
    }

    #[test]
    fn cancelled_turn_just_ends() {
        let (frames, memory) = finish(Ok(AgentOutcome::Cancelled));
        assert_eq!(frames, [END_FRAME]);
        assert!(memory.is_none());
    }
}
