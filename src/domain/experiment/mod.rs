//! Experiment domain module
//!
//! Types shared by the execution engine: behaviors and their registry, the
//! execution context, observations and the publisher seam.

mod behavior;
mod context;
mod observation;
mod publisher;

pub use behavior::{Behavior, BehaviorFn, BehaviorFuture, BehaviorRegistry, CONTROL_KEY};
pub use context::{ExecutionContext, Interruption};
pub use observation::{Observation, ObservationRecord, Observations};
pub use publisher::{PublishError, Publisher};
