//! Publisher recording observations through the `metrics` facade
//!
//! Nothing is exported unless the host application installs a recorder,
//! a Prometheus exporter for instance.

use async_trait::async_trait;
use metrics::{counter, histogram};

use crate::domain::experiment::{ExecutionContext, Observation, Publisher};

/// Timing histogram plus outcome counters, labelled by experiment and behavior
#[derive(Debug, Clone)]
pub struct MetricsPublisher {
    experiment: String,
}

impl MetricsPublisher {
    pub fn new(experiment: impl Into<String>) -> Self {
        Self {
            experiment: experiment.into(),
        }
    }
}

#[async_trait]
impl<T> Publisher<T> for MetricsPublisher
where
    T: Send + Sync + 'static,
{
    async fn publish(
        &self,
        _ctx: &ExecutionContext,
        observation: &Observation<T>,
    ) -> anyhow::Result<()> {
        record_observation(&self.experiment, observation);
        Ok(())
    }
}

/// Record one observation against the installed recorder
pub fn record_observation<T>(experiment: &str, observation: &Observation<T>) {
    let labels = [
        ("experiment", experiment.to_string()),
        ("behavior", observation.name.clone()),
    ];

    counter!("experiment_observations_total", &labels).increment(1);
    histogram!("experiment_behavior_duration_seconds", &labels)
        .record(observation.duration.as_secs_f64());

    if observation.is_error() {
        counter!("experiment_errors_total", &labels).increment(1);
    }

    if observation.is_mismatch() {
        counter!("experiment_mismatches_total", &labels).increment(1);
    }
}
