//! Run handles, lifecycle states, and outcomes.

use crate::error::WorkflowError;
use crate::event::WorkflowEvent;
use crate::stream::EventStream;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Running,
    Stopped,
    TimedOut,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn is_finished(self) -> bool {
        !matches!(self, RunStatus::Idle | RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Stopped => "stopped",
            RunStatus::TimedOut => "timed_out",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Which budget ended a run early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetKind {
    /// The run-wide wall-clock timeout.
    WallClock,
    /// The cap on dispatches of the budgeted event kind.
    Iterations,
}

impl std::fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetKind::WallClock => f.write_str("wall clock"),
            BudgetKind::Iterations => f.write_str("iterations"),
        }
    }
}

/// How a run ended, short of a fatal error.
#[derive(Debug, Clone)]
pub enum RunOutcome<E> {
    /// A terminal event was produced.
    Completed(E),
    TimedOut { budget: BudgetKind, elapsed: Duration },
    Cancelled,
}

impl<E> RunOutcome<E> {
    pub fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Completed(_) => RunStatus::Stopped,
            RunOutcome::TimedOut { .. } => RunStatus::TimedOut,
            RunOutcome::Cancelled => RunStatus::Cancelled,
        }
    }

    pub fn into_completed(self) -> Option<E> {
        match self {
            RunOutcome::Completed(e) => Some(e),
            _ => None,
        }
    }
}

/// Handle to a spawned run.
///
/// Take the event stream with [`RunHandle::stream_events`], then `.await` the
/// handle for the outcome. Awaiting without having taken the stream discards
/// all observable events. Dropping the handle detaches the run; it keeps
/// going until it finishes on its own.
#[derive(Debug)]
pub struct RunHandle<E: WorkflowEvent> {
    run_id: String,
    stream: Option<EventStream<E>>,
    cancel: CancellationToken,
    status: watch::Receiver<RunStatus>,
    join: JoinHandle<Result<RunOutcome<E>, WorkflowError>>,
}

impl<E: WorkflowEvent> RunHandle<E> {
    pub(crate) fn new(
        run_id: String,
        stream: EventStream<E>,
        cancel: CancellationToken,
        status: watch::Receiver<RunStatus>,
        join: JoinHandle<Result<RunOutcome<E>, WorkflowError>>,
    ) -> Self {
        Self {
            run_id,
            stream: Some(stream),
            cancel,
            status,
            join,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Take the run's event stream. Can only be called once.
    pub fn stream_events(&mut self) -> Result<EventStream<E>, WorkflowError> {
        self.stream.take().ok_or(WorkflowError::StreamTaken)
    }

    /// Request cancellation. The run ends as `Cancelled` at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this run, for use by other tasks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current lifecycle state.
    pub fn status(&self) -> RunStatus {
        *self.status.borrow()
    }

    /// Subscribe to lifecycle changes.
    pub fn watch_status(&self) -> watch::Receiver<RunStatus> {
        self.status.clone()
    }

    /// Wait for the run to end.
    pub async fn wait(mut self) -> Result<RunOutcome<E>, WorkflowError> {
        // Nobody will read the stream now; let publishers proceed.
        drop(self.stream.take());
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(WorkflowError::Join(e.to_string())),
        }
    }
}

impl<E: WorkflowEvent> IntoFuture for RunHandle<E> {
    type Output = Result<RunOutcome<E>, WorkflowError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
