//! Reasoning steps: the entries of a run's ReAct trace.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry in the reasoning trace.
///
/// The trace is append-only within a run. Action and Response steps come from
/// the model; Observation steps come from tool results and parse failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReasoningStep {
    /// The model wants to call a tool.
    Action {
        thought: String,
        action: String,
        action_input: Map<String, Value>,
    },
    /// What came back from a tool, or a note about unparseable output.
    Observation { observation: String },
    /// The model's answer.
    Response {
        thought: String,
        response: String,
        is_done: bool,
    },
}

impl ReasoningStep {
    pub fn action(
        thought: impl Into<String>,
        action: impl Into<String>,
        action_input: Map<String, Value>,
    ) -> Self {
        Self::Action {
            thought: thought.into(),
            action: action.into(),
            action_input,
        }
    }

    pub fn observation(observation: impl Into<String>) -> Self {
        Self::Observation {
            observation: observation.into(),
        }
    }

    /// A final answer.
    pub fn answer(thought: impl Into<String>, response: impl Into<String>) -> Self {
        Self::Response {
            thought: thought.into(),
            response: response.into(),
            is_done: true,
        }
    }

    /// Render the step in the prompt grammar the model is asked to follow.
    pub fn content(&self) -> String {
        match self {
            Self::Action {
                thought,
                action,
                action_input,
            } => {
                let input = Value::Object(action_input.clone());
                format!("Thought: {thought}\nAction: {action}\nAction Input: {input}")
            }
            Self::Observation { observation } => format!("Observation: {observation}"),
            Self::Response {
                thought, response, ..
            } => format!("Thought: {thought}\nAnswer: {response}"),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Response { is_done: true, .. })
    }

    pub fn is_observation(&self) -> bool {
        matches!(self, Self::Observation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_content_uses_prompt_grammar() {
        let input = json!({"text": "hi"}).as_object().cloned().unwrap();
        let step = ReasoningStep::action("I should echo", "echo", input);
        assert_eq!(
            step.content(),
            "Thought: I should echo\nAction: echo\nAction Input: {\"text\":\"hi\"}"
        );
        assert!(!step.is_done());
    }

    #[test]
    fn observation_and_answer_content() {
        assert_eq!(ReasoningStep::observation("42").content(), "Observation: 42");
        let answer = ReasoningStep::answer("I know", "done");
        assert_eq!(answer.content(), "Thought: I know\nAnswer: done");
        assert!(answer.is_done());
        assert!(!answer.is_observation());
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_string(&ReasoningStep::observation("x")).unwrap();
        assert_eq!(json, r#"{"type":"observation","observation":"x"}"#);
    }
}
