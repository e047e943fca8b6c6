use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ExperimentError;

/// How the sampling gate decides whether candidates run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Independent random draw per run
    #[default]
    Random,
    /// Keep the observed hits/runs ratio at the configured percentage
    HitRate,
}

/// Settings of a single experiment, fixed once the experiment is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Experiment name, used in logs and metric labels
    pub name: String,
    /// Share of runs (0-100) in which candidates execute
    pub percentage: u8,
    /// Run all behaviors at the same time instead of one after another
    pub concurrency: bool,
    /// Per-behavior deadline in milliseconds
    pub timeout_ms: Option<u64>,
    pub sampling: SamplingStrategy,
    /// Seed for the sampling and ordering RNG
    pub seed: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: "experiment".to_string(),
            percentage: 10,
            concurrency: false,
            timeout_ms: None,
            sampling: SamplingStrategy::default(),
            seed: None,
        }
    }
}

impl ExperimentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_percentage(mut self, percentage: u8) -> Self {
        self.percentage = percentage;
        self
    }

    pub fn with_concurrency(mut self, concurrency: bool) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the per-behavior timeout, rounded up to whole milliseconds
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_micros().div_ceil(1000);
        self.timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingStrategy) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.name.trim().is_empty() {
            return Err(ExperimentError::EmptyExperimentName);
        }

        if self.percentage > 100 {
            return Err(ExperimentError::InvalidPercentage(self.percentage));
        }

        if self.timeout_ms == Some(0) {
            return Err(ExperimentError::ZeroTimeout);
        }

        Ok(())
    }
}
