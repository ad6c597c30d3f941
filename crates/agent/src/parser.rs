//! ReAct output parser.
//!
//! Turns the model's full completion into a [`ReasoningStep`]:
//!
//! - an `Answer:` (or `Final Answer:`) line → `Response` (the answer runs to
//!   the end of the text; a preceding `Thought:` is optional)
//! - `Action:` + `Action Input:` with a JSON object → `Action`
//! - anything else → [`ParseError`]
//!
//! When both markers are present the answer wins.

use crate::reasoning::ReasoningStep;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a completion could not be turned into a reasoning step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Could not find an 'Action:' or 'Answer:' marker in the output: {0}")]
    NoMarkers(String),

    #[error("Action Input for '{action}' is not a valid JSON object: {reason}")]
    InvalidActionInput { action: String, reason: String },
}

/// How much of an unparseable completion is quoted back in the error.
const QUOTE_LIMIT: usize = 200;

/// Regex-based parser for ReAct completions.
#[derive(Debug, Clone)]
pub struct ReactOutputParser {
    answer_regex: Regex,
    action_regex: Regex,
    thought_regex: Regex,
}

impl ReactOutputParser {
    pub fn new() -> Self {
        let answer_regex =
            Regex::new(r"(?m)^[ \t]*(?:Final Answer|Answer):[ \t]*").expect("Invalid answer regex");
        let action_regex = Regex::new(
            r#"(?s)Action:[ \t]*[`"']?(?P<action>[A-Za-z0-9_-]+)[^\r\n]*\r?\n\s*Action Input:[ \t]*(?P<input>.*)"#,
        )
        .expect("Invalid action regex");
        let thought_regex = Regex::new(r"(?s).*Thought:\s*(?P<thought>.*)").expect("Invalid thought regex");

        Self {
            answer_regex,
            action_regex,
            thought_regex,
        }
    }

    /// Parse a complete model output.
    pub fn parse(&self, output: &str) -> Result<ReasoningStep, ParseError> {
        if let Some(marker) = self.answer_regex.find(output) {
            let thought = self.thought(&output[..marker.start()]);
            let response = output[marker.end()..].trim();
            return Ok(ReasoningStep::answer(thought, response));
        }

        if let Some(captures) = self.action_regex.captures(output) {
            let Some(whole) = captures.get(0) else {
                return Err(ParseError::NoMarkers(quote(output)));
            };
            let action = captures
                .name("action")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let raw_input = captures.name("input").map(|m| m.as_str()).unwrap_or_default();
            let action_input = parse_action_input(&action, raw_input)?;
            let thought = self.thought(&output[..whole.start()]);
            return Ok(ReasoningStep::action(thought, action, action_input));
        }

        Err(ParseError::NoMarkers(quote(output)))
    }

    /// Text after the last `Thought:` marker, or the whole prefix if there is none.
    fn thought(&self, prefix: &str) -> String {
        match self.thought_regex.captures(prefix).and_then(|c| c.name("thought")) {
            Some(m) => m.as_str().trim().to_string(),
            None => prefix.trim().to_string(),
        }
    }
}

impl Default for ReactOutputParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the JSON object following `Action Input:`.
///
/// A hallucinated `Observation:` after the input is ignored. If strict
/// parsing fails, single quotes are swapped for double quotes once.
fn parse_action_input(action: &str, raw: &str) -> Result<Map<String, Value>, ParseError> {
    let invalid = |reason: String| ParseError::InvalidActionInput {
        action: action.to_string(),
        reason,
    };

    let raw = match raw.find("\nObservation:") {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return Err(invalid("expected a JSON object".into()));
    };
    if end < start {
        return Err(invalid("expected a JSON object".into()));
    }
    let json = &raw[start..=end];

    match serde_json::from_str::<Map<String, Value>>(json) {
        Ok(map) => Ok(map),
        Err(strict) => serde_json::from_str::<Map<String, Value>>(&json.replace('\'', "\""))
            .map_err(|_| invalid(strict.to_string())),
    }
}

fn quote(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.chars().count() <= QUOTE_LIMIT {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(QUOTE_LIMIT).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser() -> ReactOutputParser {
        ReactOutputParser::new()
    }

    #[test]
    fn parses_action_with_thought() {
        let out = "Thought: I need to echo\nAction: echo\nAction Input: {\"text\": \"hi\"}";
        let step = parser().parse(out).unwrap();
        assert_eq!(
            step,
            ReasoningStep::action(
                "I need to echo",
                "echo",
                json!({"text": "hi"}).as_object().cloned().unwrap()
            )
        );
    }

    #[test]
    fn thought_is_optional_for_actions() {
        let out = "Action: datetime\nAction Input: {}";
        match parser().parse(out).unwrap() {
            ReasoningStep::Action { thought, action, action_input } => {
                assert_eq!(thought, "");
                assert_eq!(action, "datetime");
                assert!(action_input.is_empty());
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn parses_answer_with_thought() {
        let out = "Thought: I can answer without tools.\nAnswer: Paris is the capital.";
        assert_eq!(
            parser().parse(out).unwrap(),
            ReasoningStep::answer("I can answer without tools.", "Paris is the capital.")
        );
    }

    #[test]
    fn final_answer_marker_and_multiline_body() {
        let out = "Final Answer: line one\nline two";
        match parser().parse(out).unwrap() {
            ReasoningStep::Response { response, is_done, .. } => {
                assert_eq!(response, "line one\nline two");
                assert!(is_done);
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn answer_wins_over_action() {
        let out = "Thought: t\nAction: echo\nAction Input: {\"text\": \"x\"}\nAnswer: done";
        let step = parser().parse(out).unwrap();
        assert!(step.is_done());
        match step {
            ReasoningStep::Response { response, .. } => assert_eq!(response, "done"),
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn single_quoted_input_is_repaired() {
        let out = "Thought: t\nAction: echo\nAction Input: {'text': 'hi'}";
        match parser().parse(out).unwrap() {
            ReasoningStep::Action { action_input, .. } => {
                assert_eq!(action_input.get("text"), Some(&json!("hi")));
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn fenced_and_nested_input() {
        let out = "Thought: call api\nAction: api_call\nAction Input: ```json\n{\"api_calls\": [{\"path\": \"/users\", \"method\": \"GET\"}]}\n```";
        match parser().parse(out).unwrap() {
            ReasoningStep::Action { action, action_input, .. } => {
                assert_eq!(action, "api_call");
                assert_eq!(action_input["api_calls"][0]["path"], json!("/users"));
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn hallucinated_observation_is_ignored() {
        let out = "Thought: t\nAction: echo\nAction Input: {\"text\": \"a\"}\nObservation: {\"made\": \"up\"}";
        match parser().parse(out).unwrap() {
            ReasoningStep::Action { action_input, .. } => {
                assert_eq!(action_input.len(), 1);
                assert_eq!(action_input["text"], json!("a"));
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn backticked_action_name_is_cleaned() {
        let out = "Action: `echo`\nAction Input: {\"text\": \"a\"}";
        match parser().parse(out).unwrap() {
            ReasoningStep::Action { action, .. } => assert_eq!(action, "echo"),
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn action_name_stops_at_punctuation() {
        let out = "Action: api_call.
Action Input: {}";
        match parser().parse(out).unwrap() {
            ReasoningStep::Action { action, .. } => assert_eq!(action, "api_call"),
            other => panic!("expected action, got {other:?}"),
        }

        let out = "Action: (none)
Action Input: {}";
        assert!(matches!(parser().parse(out), Err(ParseError::NoMarkers(_))));
    }

    #[test]
    fn non_object_input_is_an_error() {
        let out = "Thought: t\nAction: echo\nAction Input: hello";
        let err = parser().parse(out).unwrap_err();
        assert!(matches!(err, ParseError::InvalidActionInput { ref action, .. } if action == "echo"));
    }

    #[test]
    fn broken_json_is_an_error() {
        let out = "Action: echo\nAction Input: {\"text\": }";
        assert!(matches!(
            parser().parse(out),
            Err(ParseError::InvalidActionInput { .. })
        ));
    }

    #[test]
    fn plain_text_is_a_parse_failure() {
        let err = parser().parse("I think the answer is 4").unwrap_err();
        assert_eq!(err, ParseError::NoMarkers("I think the answer is 4".into()));
    }

    #[test]
    fn long_output_is_truncated_in_error() {
        let long = "x".repeat(500);
        let ParseError::NoMarkers(quoted) = parser().parse(&long).unwrap_err() else {
            panic!("expected NoMarkers");
        };
        assert!(quoted.chars().count() <= QUOTE_LIMIT + 1);
        assert!(quoted.ends_with('…'));
    }
}
