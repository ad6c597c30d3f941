//! The event contract every workflow event type implements.

use std::fmt;
use std::hash::Hash;

/// A closed family of events routed through a workflow.
///
/// Each event has a [`Kind`](WorkflowEvent::Kind) used for routing: exactly
/// one step accepts each kind. Terminal events end the run; the stop marker
/// is the last item every observer stream yields.
pub trait WorkflowEvent: Clone + fmt::Debug + Send + Sync + 'static {
    type Kind: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;

    /// Whether this event ends the run successfully.
    fn is_terminal(&self) -> bool;

    /// The marker published after the final event of every run.
    fn stop() -> Self;

    fn is_stop(&self) -> bool {
        self.kind() == Self::stop().kind()
    }
}
