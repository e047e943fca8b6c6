//! Publisher trait and the aggregate publish error

use async_trait::async_trait;
use thiserror::Error;

use super::context::ExecutionContext;
use super::observation::Observation;

/// Destination for experiment observations
///
/// Called once per observation per publish. Implementations must not panic;
/// a panicking publisher is not caught by the dispatcher.
#[async_trait]
pub trait Publisher<T>: Send + Sync {
    async fn publish(
        &self,
        ctx: &ExecutionContext,
        observation: &Observation<T>,
    ) -> anyhow::Result<()>;
}

/// Every failure collected during one publish, in call order
#[derive(Debug, Error)]
#[error("{} publish call(s) failed: {}", .errors.len(), join_errors(.errors))]
pub struct PublishError {
    errors: Vec<anyhow::Error>,
}

impl PublishError {
    pub fn new(errors: Vec<anyhow::Error>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[anyhow::Error] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<anyhow::Error> {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

fn join_errors(errors: &[anyhow::Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
