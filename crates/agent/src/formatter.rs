//! ReAct chat formatter.
//!
//! Converts chat history and the current reasoning trace into the message
//! list sent to the model: one system header describing the tools and the
//! response grammar, then the history, then the trace. Observations are sent
//! in the user role and the model's own steps in the assistant role.

use crate::reasoning::ReasoningStep;
use stepwise_core::{ChatMessage, Role, Tool, ToolRegistry};

/// Default system header. `{tool_desc}`, `{tool_names}` and `{context}` are filled in.
pub const DEFAULT_REACT_HEADER: &str = r#"You are designed to help with a variety of tasks, from answering questions to calling APIs and running scripts.
{context}
## Tools

You have access to the following tools. You are responsible for using them in any sequence you deem appropriate to complete the task at hand. This may require breaking the task into subtasks and using different tools to complete each subtask.

{tool_desc}

## Output Format

Please answer in the same language as the question and use the following format:

```
Thought: The current language of the user is: (user's language). I need to use a tool to help me answer the question.
Action: tool name (one of {tool_names}) if using a tool.
Action Input: the input to the tool, in a JSON format representing the kwargs (e.g. {"input": "hello world", "num_beams": 5})
```

Please ALWAYS start with a Thought.

NEVER surround your response with markdown code markers. You may use code markers within your response if you need to.

Please use a valid JSON format for the Action Input. Do NOT do this {'input': 'hello world', 'num_beams': 5}.

If this format is used, the tool will respond in the following format:

```
Observation: tool response
```

You should keep repeating the above format till you have enough information to answer the question without using any more tools. At that point, you MUST respond in one of the following two formats:

```
Thought: I can answer without using any more tools. I'll use the user's language to answer
Answer: [your answer here (In the same language as the user's question)]
```

```
Thought: I cannot answer the question with the provided tools.
Answer: [your answer here (In the same language as the user's question)]
```

## Current Conversation

Below is the current conversation consisting of interleaving human and assistant messages."#;

/// Formats prompts for the reasoning loop.
#[derive(Debug, Clone)]
pub struct ReactFormatter {
    system_header: String,
    context: String,
}

impl ReactFormatter {
    pub fn new() -> Self {
        Self {
            system_header: DEFAULT_REACT_HEADER.to_string(),
            context: String::new(),
        }
    }

    /// Replace the header template.
    pub fn with_system_header(mut self, header: impl Into<String>) -> Self {
        self.system_header = header.into();
        self
    }

    /// Extra instructions placed in the header's `{context}` slot.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Build the full message list for one model call.
    pub fn format(
        &self,
        tools: &ToolRegistry,
        history: &[ChatMessage],
        trace: &[ReasoningStep],
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(1 + history.len() + trace.len());
        messages.push(self.system_message(tools));
        messages.extend_from_slice(history);
        messages.extend(trace.iter().map(|step| {
            let role = if step.is_observation() {
                Role::User
            } else {
                Role::Assistant
            };
            ChatMessage::new(role, step.content())
        }));
        messages
    }

    fn system_message(&self, tools: &ToolRegistry) -> ChatMessage {
        let tool_names = tools.names().join(", ");
        let context = if self.context.trim().is_empty() {
            String::new()
        } else {
            format!("\n## Additional Context\n\n{}\n", self.context.trim())
        };

        let header = self
            .system_header
            .replace("{tool_desc}", &describe_tools(tools))
            .replace("{tool_names}", &tool_names)
            .replace("{context}", &context);
        ChatMessage::system(header)
    }
}

impl Default for ReactFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_tools(tools: &ToolRegistry) -> String {
    if tools.is_empty() {
        return "No tools available.".to_string();
    }
    tools.iter().map(describe_tool).collect::<Vec<_>>().join("\n\n")
}

fn describe_tool(tool: &dyn Tool) -> String {
    format!(
        "> Tool Name: {}\nTool Description: {}\nTool Args: {}",
        tool.name(),
        tool.description(),
        tool.parameters_schema()
    )
}
