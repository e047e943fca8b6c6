//! Publisher writing observations to the tracing pipeline

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::experiment::{ExecutionContext, Observation, Publisher};

/// Emits one structured event per observation
///
/// Mismatches and failed behaviors are logged at `warn`, everything else at
/// `info`. The `record` field holds the JSON form of the observation.
#[derive(Debug, Clone)]
pub struct LogPublisher {
    experiment: String,
}

impl LogPublisher {
    pub fn new(experiment: impl Into<String>) -> Self {
        Self {
            experiment: experiment.into(),
        }
    }

    pub fn experiment(&self) -> &str {
        &self.experiment
    }
}

#[async_trait]
impl<T> Publisher<T> for LogPublisher
where
    T: Send + Sync + 'static,
{
    async fn publish(
        &self,
        _ctx: &ExecutionContext,
        observation: &Observation<T>,
    ) -> anyhow::Result<()> {
        let summary = observation.record();
        let duration_ms = summary.duration_ms;
        let record = serde_json::to_string(&summary)?;

        if observation.is_error() || observation.is_mismatch() {
            let error = summary.error.unwrap_or_default();
            warn!(
                experiment = %self.experiment,
                behavior = %observation.name,
                run_id = %observation.run_id,
                duration_ms,
                mismatch = observation.is_mismatch(),
                error = %error,
                record = %record,
                "Experiment observation"
            );
        } else {
            info!(
                experiment = %self.experiment,
                behavior = %observation.name,
                run_id = %observation.run_id,
                duration_ms,
                compared = observation.compared,
                success = observation.success,
                record = %record,
                "Experiment observation"
            );
        }

        Ok(())
    }
}
