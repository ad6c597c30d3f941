//! The four steps of the ReAct workflow.
//!
//! ```text
//! Start ─▶ NewUserMessage ─▶ Prep ─▶ PrepareChatHistory ─▶ Input ─▶ HandleLlmInput
//!                              ▲                                        │
//!                              │                        ToolCall ◀──────┤──▶ Done
//!                              └──── HandleToolCalls ◀────┘   (parse error ─▶ Prep)
//! ```
//!
//! Run state lives in the workflow context under [`MEMORY_KEY`],
//! [`TRACE_KEY`] and [`SOURCES_KEY`].

use crate::dispatcher::ToolDispatcher;
use crate::event::{AgentEvent, AgentEventKind, ReactOutput};
use crate::formatter::ReactFormatter;
use crate::parser::ReactOutputParser;
use crate::reasoning::ReasoningStep;
use async_trait::async_trait;
use std::sync::Arc;
use stepwise_core::{ChatMemory, ChatMessage, Provider, ProviderRequest, ToolCall, ToolRegistry, ToolResult};
use stepwise_workflow::{Context, Step, StepError};
use tracing::{debug, info, warn};

/// Conversation memory ([`ChatMemory`]).
pub const MEMORY_KEY: &str = "memory";
/// Reasoning trace for the current run (`Vec<ReasoningStep>`).
pub const TRACE_KEY: &str = "current_reasoning";
/// Tool results for the current run (`Vec<ToolResult>`).
pub const SOURCES_KEY: &str = "sources";

fn unexpected(step: &str, event: &AgentEvent) -> StepError {
    format!("{step} received unexpected '{}' event", event.kind()).into()
}

/// Seeds the run: fresh trace and sources, user message appended to memory.
pub struct NewUserMessage {
    memory_token_limit: Option<usize>,
}

impl NewUserMessage {
    pub fn new(memory_token_limit: Option<usize>) -> Self {
        Self { memory_token_limit }
    }
}

#[async_trait]
impl Step<AgentEvent> for NewUserMessage {
    fn name(&self) -> &str {
        "new_user_msg"
    }

    fn accepts(&self) -> AgentEventKind {
        AgentEventKind::Start
    }

    async fn run(&self, ctx: &Context<AgentEvent>, event: AgentEvent) -> Result<AgentEvent, StepError> {
        let AgentEvent::Start { input, history } = event else {
            return Err(unexpected(self.name(), &event));
        };

        ctx.set(SOURCES_KEY, Vec::<ToolResult>::new()).await;
        ctx.set(TRACE_KEY, Vec::<ReasoningStep>::new()).await;

        let mut memory = history.unwrap_or_default();
        if let Some(limit) = self.memory_token_limit {
            memory = memory.with_token_limit(limit);
        }
        memory.put(ChatMessage::user(input));
        debug!(history = memory.len() - 1, "User message received");
        ctx.set(MEMORY_KEY, memory).await;

        Ok(AgentEvent::Prep)
    }
}

/// Formats memory and trace into the next prompt and publishes it.
pub struct PrepareChatHistory {
    formatter: ReactFormatter,
    tools: Arc<ToolRegistry>,
}

impl PrepareChatHistory {
    pub fn new(formatter: ReactFormatter, tools: Arc<ToolRegistry>) -> Self {
        Self { formatter, tools }
    }
}

#[async_trait]
impl Step<AgentEvent> for PrepareChatHistory {
    fn name(&self) -> &str {
        "prepare_chat_history"
    }

    fn accepts(&self) -> AgentEventKind {
        AgentEventKind::Prep
    }

    async fn run(&self, ctx: &Context<AgentEvent>, _event: AgentEvent) -> Result<AgentEvent, StepError> {
        let memory: ChatMemory = ctx.get(MEMORY_KEY, ChatMemory::new()).await?;
        let trace: Vec<ReasoningStep> = ctx.get(TRACE_KEY, Vec::new()).await?;

        let messages = self.formatter.format(&self.tools, memory.get(), &trace);
        let input = AgentEvent::Input { messages };
        ctx.publish(input.clone()).await;
        Ok(input)
    }
}

/// Model settings for [`HandleLlmInput`].
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Streams the model's completion, then decides what happens next.
///
/// - final answer → `Done`
/// - action → `ToolCall`
/// - unparseable output → an observation explaining the error, then `Prep`
///
/// Backend failures are fatal.
pub struct HandleLlmInput {
    provider: Arc<dyn Provider>,
    settings: LlmSettings,
    parser: ReactOutputParser,
}

impl HandleLlmInput {
    pub fn new(provider: Arc<dyn Provider>, settings: LlmSettings) -> Self {
        Self {
            provider,
            settings,
            parser: ReactOutputParser::new(),
        }
    }

    async fn stream_completion(
        &self,
        ctx: &Context<AgentEvent>,
        request: ProviderRequest,
    ) -> Result<String, StepError> {
        let mut rx = self.provider.stream(request).await?;
        let mut full = String::new();
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk?;
            if let Some(delta) = chunk.content.filter(|d| !d.is_empty()) {
                full.push_str(&delta);
                ctx.publish(AgentEvent::Stream { delta }).await;
            }
            if chunk.done {
                break;
            }
        }
        Ok(full)
    }
}

#[async_trait]
impl Step<AgentEvent> for HandleLlmInput {
    fn name(&self) -> &str {
        "handle_llm_input"
    }

    fn accepts(&self) -> AgentEventKind {
        AgentEventKind::Input
    }

    async fn run(&self, ctx: &Context<AgentEvent>, event: AgentEvent) -> Result<AgentEvent, StepError> {
        let AgentEvent::Input { messages } = event else {
            return Err(unexpected(self.name(), &event));
        };

        let mut request = ProviderRequest::new(self.settings.model.clone(), messages);
        request.temperature = self.settings.temperature;
        request.max_tokens = self.settings.max_tokens;
        request.stream = true;

        let output = self.stream_completion(ctx, request).await?;
        debug!(provider = self.provider.name(), chars = output.len(), "Model output received");

        let step = match self.parser.parse(&output) {
            Ok(step) => step,
            Err(e) => {
                warn!(error = %e, "Could not parse model output");
                let note = ReasoningStep::observation(format!(
                    "There was an error in parsing my reasoning: {e}"
                ));
                ctx.update(TRACE_KEY, Vec::<ReasoningStep>::new(), |trace| trace.push(note)).await?;
                return Ok(AgentEvent::Prep);
            }
        };
        ctx.update(TRACE_KEY, Vec::<ReasoningStep>::new(), |trace| trace.push(step.clone())).await?;

        match step {
            ReasoningStep::Response { response, .. } => {
                let memory = ctx
                    .update(MEMORY_KEY, ChatMemory::new(), |memory| {
                        memory.put(ChatMessage::assistant(response.clone()));
                        memory.clone()
                    })
                    .await?;
                let reasoning: Vec<ReasoningStep> = ctx.get(TRACE_KEY, Vec::new()).await?;
                let sources: Vec<ToolResult> = ctx.get(SOURCES_KEY, Vec::new()).await?;
                info!(steps = reasoning.len(), sources = sources.len(), "Final answer produced");
                Ok(AgentEvent::Done(ReactOutput {
                    response,
                    reasoning,
                    sources,
                    memory,
                }))
            }
            ReasoningStep::Action {
                action, action_input, ..
            } => {
                debug!(tool = %action, "Tool selected");
                let call = ToolCall::new(action, action_input);
                AgentEvent::tool_calls(vec![call])
                    .ok_or_else(|| "no tool call selected".into())
            }
            ReasoningStep::Observation { .. } => Ok(AgentEvent::Prep),
        }
    }
}

/// Runs the selected tool and records the result.
pub struct HandleToolCalls {
    dispatcher: ToolDispatcher,
}

impl HandleToolCalls {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Step<AgentEvent> for HandleToolCalls {
    fn name(&self) -> &str {
        "handle_tool_calls"
    }

    fn accepts(&self) -> AgentEventKind {
        AgentEventKind::ToolCall
    }

    async fn run(&self, ctx: &Context<AgentEvent>, event: AgentEvent) -> Result<AgentEvent, StepError> {
        let AgentEvent::ToolCall { call } = event else {
            return Err(unexpected(self.name(), &event));
        };

        let result = self.dispatcher.dispatch(&call).await;
        let observation = ReasoningStep::observation(result.content.clone());

        ctx.update(SOURCES_KEY, Vec::<ToolResult>::new(), |sources| sources.push(result.clone()))
            .await?;
        ctx.update(TRACE_KEY, Vec::<ReasoningStep>::new(), |trace| trace.push(observation))
            .await?;
        ctx.publish(AgentEvent::ToolResultMessage { output: result }).await;

        Ok(AgentEvent::Prep)
    }
}
