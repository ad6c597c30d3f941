//! Events routed through the ReAct workflow.
//!
//! Scheduling events (`Start`, `Prep`, `Input`, `ToolCall`) are handed from
//! step to step. Stream-only events (`Stream`, `ToolResultMessage`) are only
//! ever published to observers. `Done` is terminal and `Stop` is the final
//! stream marker.

use crate::reasoning::ReasoningStep;
use serde::{Deserialize, Serialize};
use stepwise_core::{ChatMemory, ChatMessage, ToolCall, ToolResult};
use stepwise_workflow::WorkflowEvent;
use tracing::warn;

/// The final payload of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactOutput {
    /// The answer text.
    pub response: String,
    /// The full reasoning trace, ending with the answer.
    pub reasoning: Vec<ReasoningStep>,
    /// Every tool result produced during the run.
    pub sources: Vec<ToolResult>,
    /// Conversation memory including this turn's question and answer.
    pub memory: ChatMemory,
}

/// Events emitted and routed during a ReAct run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// User input starting a run, with optional prior conversation.
    Start {
        input: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        history: Option<ChatMemory>,
    },

    /// Build the next prompt.
    Prep,

    /// The formatted prompt for the next model call.
    Input { messages: Vec<ChatMessage> },

    /// The single tool call selected this turn.
    ToolCall { call: ToolCall },

    /// A text delta from the model.
    Stream { delta: String },

    /// A finished tool call.
    ToolResultMessage { output: ToolResult },

    /// End-of-stream marker.
    Stop,

    /// The run completed with an answer.
    Done(ReactOutput),
}

/// Routing key for [`AgentEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentEventKind {
    Start,
    Prep,
    Input,
    ToolCall,
    Stream,
    ToolResultMessage,
    Stop,
    Done,
}

impl AgentEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Prep => "prep",
            Self::Input => "input",
            Self::ToolCall => "tool_call",
            Self::Stream => "stream",
            Self::ToolResultMessage => "tool_result_message",
            Self::Stop => "stop",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for AgentEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AgentEvent {
    pub fn start(input: impl Into<String>) -> Self {
        Self::Start {
            input: input.into(),
            history: None,
        }
    }

    /// Build a `ToolCall` event from the model's selections.
    ///
    /// Only one tool runs per turn; extra selections are dropped with a warning.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Option<Self> {
        let count = calls.len();
        let call = calls.into_iter().next()?;
        if count > 1 {
            warn!(
                selected = count,
                kept = %call.tool_name,
                "Multiple tool calls selected; only the first is executed"
            );
        }
        Some(Self::ToolCall { call })
    }

    pub fn kind(&self) -> AgentEventKind {
        match self {
            Self::Start { .. } => AgentEventKind::Start,
            Self::Prep => AgentEventKind::Prep,
            Self::Input { .. } => AgentEventKind::Input,
            Self::ToolCall { .. } => AgentEventKind::ToolCall,
            Self::Stream { .. } => AgentEventKind::Stream,
            Self::ToolResultMessage { .. } => AgentEventKind::ToolResultMessage,
            Self::Stop => AgentEventKind::Stop,
            Self::Done(_) => AgentEventKind::Done,
        }
    }

    /// SSE event name for this event.
    pub fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }
}

impl WorkflowEvent for AgentEvent {
    type Kind = AgentEventKind;

    fn kind(&self) -> AgentEventKind {
        AgentEvent::kind(self)
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    fn stop() -> Self {
        Self::Stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_event_serialization() {
        let event = AgentEvent::Stream { delta: "Hel".into() };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"stream","delta":"Hel"}"#);
    }

    #[test]
    fn done_event_flattens_output() {
        let event = AgentEvent::Done(ReactOutput {
            response: "done".into(),
            reasoning: vec![ReasoningStep::answer("t", "done")],
            sources: vec![],
            memory: ChatMemory::new(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "done");
        assert_eq!(value["response"], "done");
        assert_eq!(value["reasoning"][0]["type"], "response");
    }

    #[test]
    fn stop_event_round_trips() {
        let event: AgentEvent = serde_json::from_str(r#"{"type":"stop"}"#).unwrap();
        assert!(matches!(event, AgentEvent::Stop));
        assert!(event.is_stop());
    }

    #[test]
    fn extra_tool_calls_are_truncated() {
        let calls = vec![
            ToolCall::new("first", Default::default()),
            ToolCall::new("second", Default::default()),
        ];
        match AgentEvent::tool_calls(calls) {
            Some(AgentEvent::ToolCall { call }) => assert_eq!(call.tool_name, "first"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(AgentEvent::tool_calls(vec![]).is_none());
    }

    #[test]
    fn only_done_is_terminal() {
        assert!(!AgentEvent::Prep.is_terminal());
        assert!(!AgentEvent::Stop.is_terminal());
        assert_eq!(AgentEvent::Prep.event_type(), "prep");
        assert_eq!(
            AgentEvent::ToolResultMessage {
                output: ToolResult::ok("x", "y")
            }
            .event_type(),
            "tool_result_message"
        );
    }
}
