//! Built-in observation publishers

mod log;
mod metrics;

pub use self::log::LogPublisher;
pub use self::metrics::{record_observation, MetricsPublisher};
