//! `ReactAgent`: wires the four steps into a workflow and runs it.

use crate::dispatcher::ToolDispatcher;
use crate::event::{AgentEvent, AgentEventKind, ReactOutput};
use crate::formatter::ReactFormatter;
use crate::steps::{HandleLlmInput, HandleToolCalls, LlmSettings, NewUserMessage, PrepareChatHistory};
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use stepwise_core::{ChatMemory, Provider, ToolRegistry};
use stepwise_workflow::{
    BudgetKind, CancellationToken, DEFAULT_STREAM_CAPACITY, DEFAULT_TIMEOUT, EventStream,
    RunHandle, RunOutcome, RunStatus, Workflow, WorkflowError,
};
use tracing::info;

/// Default cap on reasoning iterations (dispatches of `Prep`).
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// A tool-using ReAct agent.
///
/// Each call to [`ReactAgent::run`] starts an independent run with its own
/// context; the agent itself holds only shared, immutable collaborators.
pub struct ReactAgent {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    settings: LlmSettings,
    max_iterations: usize,
    timeout: Duration,
    stream_capacity: usize,
    memory_token_limit: Option<usize>,
    tool_timeout: Option<Duration>,
    extra_context: Option<String>,
}

impl ReactAgent {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            settings: LlmSettings {
                model: model.into(),
                temperature: 0.7,
                max_tokens: None,
            },
            max_iterations: DEFAULT_MAX_ITERATIONS,
            timeout: DEFAULT_TIMEOUT,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            memory_token_limit: None,
            tool_timeout: None,
            extra_context: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.settings.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.settings.max_tokens = Some(max);
        self
    }

    /// Set max iterations.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Wall-clock budget for a whole run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity;
        self
    }

    /// Bound the history window sent to the model.
    pub fn with_memory_token_limit(mut self, limit: usize) -> Self {
        self.memory_token_limit = Some(limit);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    /// Extra instructions added to the system header.
    pub fn with_extra_context(mut self, context: impl Into<String>) -> Self {
        self.extra_context = Some(context.into());
        self
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Assemble the ReAct workflow from the current settings.
    pub fn workflow(&self) -> Result<Workflow<AgentEvent>, WorkflowError> {
        let mut formatter = ReactFormatter::new();
        if let Some(context) = &self.extra_context {
            formatter = formatter.with_context(context.clone());
        }
        let mut dispatcher = ToolDispatcher::new(Arc::clone(&self.tools));
        if let Some(limit) = self.tool_timeout {
            dispatcher = dispatcher.with_timeout(limit);
        }

        Workflow::builder("react")
            .step(NewUserMessage::new(self.memory_token_limit))
            .step(PrepareChatHistory::new(formatter, Arc::clone(&self.tools)))
            .step(HandleLlmInput::new(Arc::clone(&self.provider), self.settings.clone()))
            .step(HandleToolCalls::new(dispatcher))
            .iteration_budget(AgentEventKind::Prep, self.max_iterations)
            .timeout(self.timeout)
            .stream_capacity(self.stream_capacity)
            .build()
    }

    /// Start a run for `input` with an empty conversation.
    pub fn run(&self, input: impl Into<String>) -> Result<AgentHandle, WorkflowError> {
        self.start(AgentEvent::start(input))
    }

    /// Start a run continuing an earlier conversation.
    pub fn run_with_memory(
        &self,
        input: impl Into<String>,
        memory: ChatMemory,
    ) -> Result<AgentHandle, WorkflowError> {
        self.start(AgentEvent::Start {
            input: input.into(),
            history: Some(memory),
        })
    }

    /// Run to completion, discarding the event stream.
    pub async fn chat(&self, input: impl Into<String>) -> Result<AgentOutcome, WorkflowError> {
        self.run(input)?.await
    }

    fn start(&self, start: AgentEvent) -> Result<AgentHandle, WorkflowError> {
        let workflow = self.workflow()?;
        let inner = workflow.run(start);
        info!(
            run_id = inner.run_id(),
            model = %self.settings.model,
            max_iterations = self.max_iterations,
            "ReAct run started"
        );
        Ok(AgentHandle { inner })
    }
}

/// How a ReAct run ended.
#[derive(Debug, Clone)]
pub enum AgentOutcome {
    Done(ReactOutput),
    TimedOut { budget: BudgetKind, elapsed: Duration },
    Cancelled,
}

impl AgentOutcome {
    pub fn output(&self) -> Option<&ReactOutput> {
        match self {
            AgentOutcome::Done(output) => Some(output),
            _ => None,
        }
    }

    pub fn into_output(self) -> Option<ReactOutput> {
        match self {
            AgentOutcome::Done(output) => Some(output),
            _ => None,
        }
    }
}

impl TryFrom<RunOutcome<AgentEvent>> for AgentOutcome {
    type Error = WorkflowError;

    fn try_from(outcome: RunOutcome<AgentEvent>) -> Result<Self, WorkflowError> {
        match outcome {
            RunOutcome::Completed(AgentEvent::Done(output)) => Ok(AgentOutcome::Done(output)),
            RunOutcome::Completed(other) => Err(WorkflowError::UnexpectedTerminal {
                kind: other.kind().to_string(),
            }),
            RunOutcome::TimedOut { budget, elapsed } => Ok(AgentOutcome::TimedOut { budget, elapsed }),
            RunOutcome::Cancelled => Ok(AgentOutcome::Cancelled),
        }
    }
}

/// Handle to a running ReAct loop.
#[derive(Debug)]
pub struct AgentHandle {
    inner: RunHandle<AgentEvent>,
}

impl AgentHandle {
    pub fn run_id(&self) -> &str {
        self.inner.run_id()
    }

    /// Take the event stream. Can only be called once.
    pub fn stream_events(&mut self) -> Result<EventStream<AgentEvent>, WorkflowError> {
        self.inner.stream_events()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancellation_token()
    }

    pub fn status(&self) -> RunStatus {
        self.inner.status()
    }

    pub async fn wait(self) -> Result<AgentOutcome, WorkflowError> {
        AgentOutcome::try_from(self.inner.wait().await?)
    }
}

impl IntoFuture for AgentHandle {
    type Output = Result<AgentOutcome, WorkflowError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
