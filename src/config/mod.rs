mod app_config;
mod experiment_config;

pub use app_config::{AppConfig, LogFormat, LoggingConfig};
pub use experiment_config::{ExperimentConfig, SamplingStrategy};
