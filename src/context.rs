//! Shared carrier threaded through every processor of one flow execution.

use serde::{Deserialize, Serialize};

/// Mutable state plus an optional side payload, shared by all processors.
///
/// A single context is handed by `&mut` to each processor in turn, so any
/// change a processor makes to `state` is visible to the processors after it
/// and to the caller once [`Flow::execute`](crate::Flow::execute) returns.
/// The flow never clones, forks or drops the context.
///
/// # Examples
///
/// ```
/// use crinkle::Context;
///
/// let ctx: Context<String, u32> = Context::new("pending".to_string(), Some(7));
/// assert_eq!(ctx.state, "pending");
/// assert_eq!(ctx.additional_data, Some(7));
///
/// let ctx: Context<u64> = Context::from_state(42);
/// assert_eq!(ctx.additional_data, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Context<S, D = ()> {
    /// Caller-defined state, mutated by processors.
    pub state: S,
    /// Informational side data. Never consulted by the flow itself.
    pub additional_data: Option<D>,
}

impl<S, D> Context<S, D> {
    /// Creates a context from an initial state and optional side data.
    pub fn new(state: S, additional_data: Option<D>) -> Self {
        Self {
            state,
            additional_data,
        }
    }

    /// Creates a context with no side data.
    pub fn from_state(state: S) -> Self {
        Self::new(state, None)
    }

    /// Returns the side data, if any.
    pub fn additional_data(&self) -> Option<&D> {
        self.additional_data.as_ref()
    }

    /// Consumes the context and returns its state and side data.
    pub fn into_parts(self) -> (S, Option<D>) {
        (self.state, self.additional_data)
    }
}
