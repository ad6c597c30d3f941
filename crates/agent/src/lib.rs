//! The ReAct reasoning loop, built on the Stepwise workflow engine.
//!
//! The agent follows a **Think → Act → Observe** cycle:
//!
//! 1. **Receive** the user's message and append it to memory
//! 2. **Format** a prompt from the tool descriptions, memory, and trace
//! 3. **Stream** the model's completion to observers, then **parse** it
//! 4. **If an action**: call the tool, record the observation, go to 2
//! 5. **If an answer**: append it to memory and finish
//!
//! Unparseable output and failing tools become observations the model sees
//! on the next turn. The loop ends on an answer, when the iteration cap or
//! wall-clock budget runs out, or when the caller cancels.

pub mod agent;
pub mod dispatcher;
pub mod event;
pub mod formatter;
pub mod parser;
pub mod reasoning;
pub mod steps;

pub use agent::{AgentHandle, AgentOutcome, DEFAULT_MAX_ITERATIONS, ReactAgent};
pub use dispatcher::ToolDispatcher;
pub use event::{AgentEvent, AgentEventKind, ReactOutput};
pub use formatter::ReactFormatter;
pub use parser::{ParseError, ReactOutputParser};
pub use reasoning::ReasoningStep;
pub use stepwise_workflow::{BudgetKind, RunStatus, WorkflowError};
