//! Step Scheduler: routes events to steps until the run ends.
//!
//! Events are processed strictly one at a time in production order. Each
//! dispatch races the step against cancellation and the run deadline, so
//! every suspension point inside a step honours both.

use crate::context::Context;
use crate::error::WorkflowError;
use crate::event::WorkflowEvent;
use crate::handle::{BudgetKind, RunHandle, RunOutcome, RunStatus};
use crate::step::Step;
use crate::stream::{self, DEFAULT_STREAM_CAPACITY};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

/// Default wall-clock budget for a run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// How long the final events may wait on a stalled stream consumer.
pub const TERMINAL_GRACE: Duration = Duration::from_secs(5);

/// Collects steps and budgets, then validates them into a [`Workflow`].
pub struct WorkflowBuilder<E: WorkflowEvent> {
    name: String,
    steps: Vec<Box<dyn Step<E>>>,
    timeout: Duration,
    iteration_budget: Option<(E::Kind, usize)>,
    stream_capacity: usize,
}

impl<E: WorkflowEvent> WorkflowBuilder<E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            iteration_budget: None,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
        }
    }

    pub fn step(self, step: impl Step<E> + 'static) -> Self {
        self.boxed_step(Box::new(step))
    }

    pub fn boxed_step(mut self, step: Box<dyn Step<E>>) -> Self {
        self.steps.push(step);
        self
    }

    /// Wall-clock budget measured from run start.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// End the run as timed out once `kind` has been dispatched more than `max` times.
    pub fn iteration_budget(mut self, kind: E::Kind, max: usize) -> Self {
        self.iteration_budget = Some((kind, max));
        self
    }

    /// Events buffered before publishers wait for the consumer.
    pub fn stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<Workflow<E>, WorkflowError> {
        if self.stream_capacity == 0 {
            return Err(WorkflowError::InvalidConfig(
                "stream capacity must be at least 1".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(WorkflowError::InvalidConfig("timeout must be non-zero".into()));
        }

        let mut steps: HashMap<E::Kind, Box<dyn Step<E>>> = HashMap::new();
        for step in self.steps {
            let kind = step.accepts();
            if let Some(existing) = steps.get(&kind) {
                return Err(WorkflowError::DuplicateStep {
                    kind: kind.to_string(),
                    existing: existing.name().to_string(),
                    step: step.name().to_string(),
                });
            }
            steps.insert(kind, step);
        }

        debug!(workflow = %self.name, steps = steps.len(), "Workflow built");
        Ok(Workflow {
            inner: Arc::new(Inner {
                name: self.name,
                steps,
                timeout: self.timeout,
                iteration_budget: self.iteration_budget,
                stream_capacity: self.stream_capacity,
            }),
        })
    }
}

/// A validated set of steps. Cheap to clone; every [`Workflow::run`] is independent.
pub struct Workflow<E: WorkflowEvent> {
    inner: Arc<Inner<E>>,
}

impl<E: WorkflowEvent> Clone for Workflow<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<E: WorkflowEvent> {
    name: String,
    steps: HashMap<E::Kind, Box<dyn Step<E>>>,
    timeout: Duration,
    iteration_budget: Option<(E::Kind, usize)>,
    stream_capacity: usize,
}

enum Race<T> {
    Cancelled,
    Deadline,
    Finished(T),
}

impl<E: WorkflowEvent> Workflow<E> {
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder<E> {
        WorkflowBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Start a run from `start` on the current tokio runtime.
    pub fn run(&self, start: E) -> RunHandle<E> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let (sink, events) = stream::channel(self.inner.stream_capacity);
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(RunStatus::Idle);

        let ctx = Context::new(run_id.clone(), sink);
        let inner = Arc::clone(&self.inner);
        let token = cancel.clone();
        let span = info_span!("run", workflow = %self.inner.name, run_id = %run_id);
        let join = tokio::spawn(
            async move { inner.drive(ctx, start, token, status_tx).await }.instrument(span),
        );

        RunHandle::new(run_id, events, cancel, status_rx, join)
    }
}

impl<E: WorkflowEvent> Inner<E> {
    async fn drive(
        &self,
        ctx: Context<E>,
        start: E,
        cancel: CancellationToken,
        status: watch::Sender<RunStatus>,
    ) -> Result<RunOutcome<E>, WorkflowError> {
        let started = Instant::now();
        status.send_replace(RunStatus::Running);
        info!(start = %start.kind(), "Run started");

        let result = self.step_loop(&ctx, start, &cancel, started).await;

        let final_status = match &result {
            Ok(outcome) => outcome.status(),
            Err(_) => RunStatus::Failed,
        };
        status.send_replace(final_status);

        match &result {
            Ok(RunOutcome::Completed(done)) => {
                deliver_final(&ctx, vec![done.clone(), E::stop()], &cancel).await;
            }
            // The canceller may have stopped reading; never wait on it.
            Ok(RunOutcome::Cancelled) => {
                ctx.sink().try_publish(E::stop());
            }
            _ => deliver_final(&ctx, vec![E::stop()], &cancel).await,
        }
        drop(ctx);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(RunOutcome::TimedOut { budget, .. }) => {
                warn!(%budget, elapsed_ms, "Run timed out")
            }
            Ok(_) => info!(status = %final_status, elapsed_ms, "Run finished"),
            Err(e) => warn!(error = %e, elapsed_ms, "Run failed"),
        }
        result
    }

    async fn step_loop(
        &self,
        ctx: &Context<E>,
        mut event: E,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<RunOutcome<E>, WorkflowError> {
        let deadline = started + self.timeout;
        let mut dispatched = 0usize;

        loop {
            if event.is_terminal() {
                return Ok(RunOutcome::Completed(event));
            }

            let kind = event.kind();
            let step = self
                .steps
                .get(&kind)
                .ok_or_else(|| WorkflowError::Unroutable {
                    kind: kind.to_string(),
                })?;

            if let Some((budget_kind, max)) = self.iteration_budget {
                if budget_kind == kind {
                    dispatched += 1;
                    if dispatched > max {
                        return Ok(RunOutcome::TimedOut {
                            budget: BudgetKind::Iterations,
                            elapsed: started.elapsed(),
                        });
                    }
                }
            }

            debug!(step = step.name(), %kind, "Dispatching event");
            let work = AssertUnwindSafe(step.run(ctx, event)).catch_unwind();
            let raced = tokio::select! {
                biased;
                _ = cancel.cancelled() => Race::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Race::Deadline,
                r = work => Race::Finished(r),
            };

            event = match raced {
                Race::Cancelled => return Ok(RunOutcome::Cancelled),
                Race::Deadline => {
                    return Ok(RunOutcome::TimedOut {
                        budget: BudgetKind::WallClock,
                        elapsed: started.elapsed(),
                    });
                }
                Race::Finished(Ok(Ok(next))) => next,
                Race::Finished(Ok(Err(source))) => {
                    return Err(WorkflowError::StepFailed {
                        step: step.name().to_string(),
                        source,
                    });
                }
                Race::Finished(Err(panic)) => {
                    return Err(WorkflowError::StepPanicked {
                        step: step.name().to_string(),
                        message: panic_message(panic.as_ref()),
                    });
                }
            };
        }
    }
}

/// Publish the closing events, giving up on cancellation or once a stalled
/// consumer has held them back for [`TERMINAL_GRACE`]. Dropping the sink
/// afterwards still ends the stream.
async fn deliver_final<E: WorkflowEvent>(
    ctx: &Context<E>,
    events: Vec<E>,
    cancel: &CancellationToken,
) {
    let deliver = async {
        for event in events {
            ctx.publish(event).await;
        }
    };
    tokio::select! {
        biased;
        _ = deliver => {}
        _ = cancel.cancelled() => debug!("Cancelled while closing the stream"),
        _ = tokio::time::sleep(TERMINAL_GRACE) => {
            let grace_ms = TERMINAL_GRACE.as_millis() as u64;
            warn!(grace_ms, "Stream consumer stalled, final events dropped");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
