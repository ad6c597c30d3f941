//! Step-based async workflow engine.
//!
//! A [`Workflow`] is a set of [`Step`]s, each handling exactly one kind of a
//! closed [`WorkflowEvent`] family. Running a workflow spawns a task that
//! routes events from step to step until one of them returns a terminal
//! event, a budget runs out, the run is cancelled, or a step fails.
//!
//! ```text
//! Start ──▶ step A ──▶ Prep ──▶ step B ──▶ … ──▶ Done
//!              │                   │
//!              └──── publish ──────┴──▶ EventStream (observer)
//! ```
//!
//! Steps share run-scoped state through the [`Context`] and publish
//! observable events to the run's bounded [`EventStream`]. The stream always
//! ends with the event family's stop marker.

pub mod context;
pub mod engine;
pub mod error;
pub mod event;
pub mod handle;
pub mod step;
pub mod stream;

pub use context::Context;
pub use engine::{DEFAULT_TIMEOUT, TERMINAL_GRACE, Workflow, WorkflowBuilder};
pub use error::{StepError, WorkflowError};
pub use event::WorkflowEvent;
pub use handle::{BudgetKind, RunHandle, RunOutcome, RunStatus};
pub use step::Step;
pub use stream::{DEFAULT_STREAM_CAPACITY, EventSink, EventStream};
pub use tokio_util::sync::CancellationToken;
