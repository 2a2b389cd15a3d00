//! Execution event aggregation
//!
//! Reduces the lifecycle signal stream into per-attempt records and exposes
//! the final (non-retried) attempt of every pickle.

mod attempt;
mod channel;
mod state;

pub use attempt::{Attempt, StepRecord};
pub use channel::{signal_channel, DEFAULT_CAPACITY};
pub use state::{AggregateSnapshot, ConsistencyMode, EventAggregator};
