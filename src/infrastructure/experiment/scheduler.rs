//! Dispatch of behaviors under per-behavior contexts
//!
//! Every behavior runs as its own tokio task inside a `catch_unwind`
//! boundary. Candidate panics are turned into observations; a control panic
//! is handed back untouched so the caller can re-raise it once every other
//! behavior has reported.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, FutureExt};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::aggregator::ObservationAggregator;
use crate::domain::experiment::{Behavior, ExecutionContext, Observation, Observations};
use crate::domain::{BehaviorError, PanicPayload, CONTROL_KEY};

type RawPanic = Box<dyn Any + Send>;

/// Observations of one run plus a control panic still to be re-raised
pub struct ScheduleOutcome<T> {
    pub observations: Observations<T>,
    pub control_panic: Option<RawPanic>,
}

impl<T> ScheduleOutcome<T> {
    /// Re-raise a control panic, otherwise return the observations
    pub fn into_observations(self) -> Observations<T> {
        if let Some(payload) = self.control_panic {
            std::panic::resume_unwind(payload);
        }

        self.observations
    }
}

/// Runs behaviors either all at once or strictly one after another
#[derive(Debug, Clone)]
pub struct ExecutionScheduler {
    concurrency: bool,
    timeout: Option<Duration>,
}

impl ExecutionScheduler {
    pub fn new(concurrency: bool, timeout: Option<Duration>) -> Self {
        Self {
            concurrency,
            timeout,
        }
    }

    pub fn is_concurrent(&self) -> bool {
        self.concurrency
    }

    /// Run `behaviors` in the given order and wait for every one of them
    pub async fn execute<T>(
        &self,
        behaviors: Vec<Behavior<T>>,
        ctx: &ExecutionContext,
        run_id: Uuid,
    ) -> ScheduleOutcome<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let aggregator = Arc::new(ObservationAggregator::new(run_id));
        let mut control_panic = None;

        if self.concurrency {
            let (names, handles): (Vec<_>, Vec<_>) = behaviors
                .into_iter()
                .map(|behavior| {
                    let name = behavior.name().to_string();
                    (name, self.dispatch(behavior, ctx, &aggregator))
                })
                .unzip();

            for (name, joined) in names.into_iter().zip(join_all(handles).await) {
                if let Some(payload) = absorb(&name, joined, &aggregator, run_id).await {
                    control_panic = Some(payload);
                }
            }
        } else {
            for behavior in behaviors {
                let name = behavior.name().to_string();
                let joined = self.dispatch(behavior, ctx, &aggregator).await;

                if let Some(payload) = absorb(&name, joined, &aggregator, run_id).await {
                    control_panic = Some(payload);
                }
            }
        }

        ScheduleOutcome {
            observations: aggregator.close().await,
            control_panic,
        }
    }

    fn dispatch<T>(
        &self,
        behavior: Behavior<T>,
        ctx: &ExecutionContext,
        aggregator: &Arc<ObservationAggregator<T>>,
    ) -> JoinHandle<Option<RawPanic>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let ctx = match self.timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.child(),
        };
        let aggregator = Arc::clone(aggregator);
        let dispatched_at = Instant::now();

        tokio::spawn(observe(behavior, ctx, aggregator, dispatched_at))
    }
}

/// Body of a behavior task; returns the payload of a control panic
async fn observe<T>(
    behavior: Behavior<T>,
    ctx: ExecutionContext,
    aggregator: Arc<ObservationAggregator<T>>,
    dispatched_at: Instant,
) -> Option<RawPanic>
where
    T: Clone + Send + Sync + 'static,
{
    let mut observation = Observation::new(behavior.name(), aggregator.run_id());

    let outcome = AssertUnwindSafe(run_bounded(&behavior, &ctx))
        .catch_unwind()
        .await;

    observation.duration = dispatched_at.elapsed();
    ctx.cancel();

    match outcome {
        Ok(Ok(value)) => observation.value = Some(value),
        Ok(Err(error)) => {
            debug!(
                behavior = %behavior.name(),
                error = %error,
                "Behavior returned an error"
            );
            observation.error = Some(error);
        }
        Err(payload) if behavior.is_control() => return Some(payload),
        Err(payload) => {
            let payload = PanicPayload::new(payload);
            warn!(
                behavior = %behavior.name(),
                panic = %payload,
                "Candidate panicked"
            );
            observation.error = Some(BehaviorError::CandidatePanicked {
                name: behavior.name().to_string(),
                payload: payload.clone(),
            });
            observation.panic = Some(payload);
        }
    }

    aggregator.record(observation).await;
    None
}

/// Race a candidate against its context; the loser is dropped
///
/// The control is always awaited to completion. It sees the deadline and
/// cancellation through `ctx` and decides for itself how to react.
async fn run_bounded<T>(
    behavior: &Behavior<T>,
    ctx: &ExecutionContext,
) -> Result<T, BehaviorError> {
    if behavior.is_control() {
        return behavior
            .call(ctx.clone())
            .await
            .map_err(BehaviorError::failed);
    }

    if let Some(interruption) = ctx.err() {
        return Err(interruption.into());
    }

    tokio::select! {
        biased;
        interruption = ctx.done() => Err(interruption.into()),
        result = behavior.call(ctx.clone()) => result.map_err(BehaviorError::failed),
    }
}

/// Handle a finished task; tasks that never reported get an observation here
async fn absorb<T>(
    name: &str,
    joined: Result<Option<RawPanic>, JoinError>,
    aggregator: &ObservationAggregator<T>,
    run_id: Uuid,
) -> Option<RawPanic>
where
    T: Clone,
{
    let error = match joined {
        Ok(control_panic) => return control_panic,
        Err(error) => error,
    };

    let is_control = name == CONTROL_KEY;
    let mut observation = Observation::new(name, run_id);

    if error.is_panic() {
        let payload = error.into_panic();
        if is_control {
            return Some(payload);
        }

        let payload = PanicPayload::new(payload);
        observation.error = Some(BehaviorError::CandidatePanicked {
            name: name.to_string(),
            payload: payload.clone(),
        });
        observation.panic = Some(payload);
    } else {
        warn!(behavior = %name, "Behavior task was cancelled");
        observation.error = Some(BehaviorError::Cancelled);
    }

    aggregator.record(observation).await;
    None
}
