//! Errors raised by the workflow engine.

use thiserror::Error;

/// Error type returned by step bodies.
///
/// Any error implementing `std::error::Error` converts into this with `?`.
pub type StepError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal workflow errors.
///
/// Build-time errors (`DuplicateStep`, `InvalidConfig`) come out of
/// [`WorkflowBuilder::build`](crate::WorkflowBuilder::build); the rest end a
/// run in the `Failed` state.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Step '{step}' cannot accept '{kind}' events: already handled by '{existing}'")]
    DuplicateStep {
        kind: String,
        existing: String,
        step: String,
    },

    #[error("Invalid workflow configuration: {0}")]
    InvalidConfig(String),

    #[error("No step accepts '{kind}' events")]
    Unroutable { kind: String },

    #[error("Run completed on an unexpected '{kind}' event")]
    UnexpectedTerminal { kind: String },

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: StepError,
    },

    #[error("Step '{step}' panicked: {message}")]
    StepPanicked { step: String, message: String },

    #[error("Context value '{key}' is not a {expected}")]
    ContextType { key: String, expected: &'static str },

    #[error("Event stream already taken for this run")]
    StreamTaken,

    #[error("Run task failed: {0}")]
    Join(String),
}

impl WorkflowError {
    /// Name of the step that failed, if the error came from one.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step, .. } | Self::StepPanicked { step, .. } => Some(step),
            _ => None,
        }
    }
}
