//! Experiment engine
//!
//! Sampling, scheduling, evaluation and publishing for a single
//! [`Experiment`]. The domain types these operate on live in
//! `crate::domain::experiment`.

mod aggregator;
mod dispatcher;
mod evaluation;
mod runner;
mod sampling;
mod scheduler;

pub use aggregator::ObservationAggregator;
pub use dispatcher::PublishDispatcher;
pub use evaluation::{CleanFn, CompareFn, EvaluationPipeline};
pub use runner::{BeforeFilter, Experiment};
pub use sampling::SamplingGate;
pub use scheduler::{ExecutionScheduler, ScheduleOutcome};
