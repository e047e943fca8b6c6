//! PMP Experiment
//!
//! Runs a trusted control code path next to one or more candidate paths,
//! always returning the control's result while recording how every
//! candidate behaved:
//! - Percentage or hit-rate sampling with `force` / `ignore` overrides
//! - Concurrent or sequential dispatch with an optional per-behavior timeout
//! - Candidate panics captured as observations, control panics re-raised
//! - Clean and compare steps, then fan-out to pluggable publishers
//!
//! ```no_run
//! use pmp_experiment::{ExecutionContext, Experiment, ExperimentConfig, LogPublisher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut experiment = Experiment::new(ExperimentConfig::new("search").with_percentage(50))?;
//! experiment.control(|_ctx| async { Ok(legacy_search().await) })?;
//! experiment.candidate("indexed", |_ctx| async { Ok(indexed_search().await) })?;
//! experiment.compare(|control: &Vec<u64>, candidate: &Vec<u64>| control == candidate);
//! experiment.publisher(LogPublisher::new("search"));
//!
//! let ctx = ExecutionContext::background();
//! let ids = experiment.run(&ctx).await?;
//! experiment.publish(&ctx).await?;
//! # let _ = ids;
//! # Ok(())
//! # }
//! # async fn legacy_search() -> Vec<u64> { vec![] }
//! # async fn indexed_search() -> Vec<u64> { vec![] }
//! ```

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{AppConfig, ExperimentConfig, SamplingStrategy};
pub use domain::{
    BehaviorError, ExecutionContext, ExperimentError, Observation, ObservationRecord,
    Observations, PanicPayload, PublishError, Publisher, CONTROL_KEY,
};
pub use infrastructure::experiment::Experiment;
pub use infrastructure::logging::init_logging;
pub use infrastructure::publisher::{LogPublisher, MetricsPublisher};
