//! The step abstraction.

use crate::context::Context;
use crate::error::StepError;
use crate::event::WorkflowEvent;
use async_trait::async_trait;

/// A named unit of work that handles exactly one event kind.
///
/// A step receives the event, may read and write the run [`Context`] and
/// publish observable events through it, and returns the next event to route.
/// Returning an error fails the run; recoverable conditions should instead be
/// turned into a successor event by the step itself.
#[async_trait]
pub trait Step<E: WorkflowEvent>: Send + Sync {
    fn name(&self) -> &str;

    /// The event kind this step is registered for.
    fn accepts(&self) -> E::Kind;

    async fn run(&self, ctx: &Context<E>, event: E) -> Result<E, StepError>;
}
