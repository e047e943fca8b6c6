//! Infrastructure layer - Experiment engine, publishers and logging

pub mod experiment;
pub mod logging;
pub mod publisher;

pub use experiment::{Experiment, SamplingGate};
pub use logging::{build_subscriber, init_logging};
pub use publisher::{LogPublisher, MetricsPublisher};
