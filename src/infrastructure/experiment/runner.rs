//! Experiment runner
//!
//! Registration goes through `&mut self` and running through `&self`, so an
//! experiment shared behind an `Arc` can be run by many tasks at once while
//! its behaviors stay fixed. The latest observation set and the sampling
//! counters are the only state mutated by a run.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use super::dispatcher::PublishDispatcher;
use super::evaluation::EvaluationPipeline;
use super::sampling::SamplingGate;
use super::scheduler::ExecutionScheduler;
use crate::config::ExperimentConfig;
use crate::domain::experiment::{
    Behavior, BehaviorRegistry, ExecutionContext, Observations, PublishError, Publisher,
};
use crate::domain::ExperimentError;

/// Context transform applied before behaviors are dispatched
pub type BeforeFilter = Arc<dyn Fn(ExecutionContext) -> ExecutionContext + Send + Sync>;

/// A control behavior plus candidates validated against it
pub struct Experiment<T> {
    config: ExperimentConfig,
    registry: BehaviorRegistry<T>,
    gate: SamplingGate,
    scheduler: ExecutionScheduler,
    pipeline: EvaluationPipeline<T>,
    dispatcher: PublishDispatcher<T>,
    before: Vec<BeforeFilter>,
    force: bool,
    ignore: bool,
    observations: RwLock<Option<Arc<Observations<T>>>>,
}

impl<T> Experiment<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Build an experiment; the config is validated and then frozen
    pub fn new(config: ExperimentConfig) -> Result<Self, ExperimentError> {
        config.validate()?;

        let gate = SamplingGate::new(config.percentage, config.sampling, config.seed);
        let scheduler = ExecutionScheduler::new(config.concurrency, config.timeout());

        Ok(Self {
            config,
            registry: BehaviorRegistry::new(),
            gate,
            scheduler,
            pipeline: EvaluationPipeline::new(),
            dispatcher: PublishDispatcher::new(),
            before: Vec::new(),
            force: false,
            ignore: false,
            observations: RwLock::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Register the control behavior
    pub fn control<F, Fut>(&mut self, function: F) -> Result<(), ExperimentError>
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.registry.register_control(function)
    }

    /// Register a candidate behavior
    pub fn candidate<F, Fut>(
        &mut self,
        name: impl Into<String>,
        function: F,
    ) -> Result<(), ExperimentError>
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.registry.register_candidate(name, function)
    }

    /// Set the clean function applied to every successful value
    pub fn clean<F>(&mut self, clean: F)
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        self.pipeline.set_clean(clean);
    }

    /// Set the compare function judging candidates against the control
    pub fn compare<F>(&mut self, compare: F)
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.pipeline.set_compare(compare);
    }

    /// Append a before filter; filters run in registration order and only
    /// on runs where candidates execute
    pub fn before<F>(&mut self, filter: F)
    where
        F: Fn(ExecutionContext) -> ExecutionContext + Send + Sync + 'static,
    {
        self.before.push(Arc::new(filter));
    }

    /// Add a publisher
    pub fn publisher<P>(&mut self, publisher: P)
    where
        P: Publisher<T> + 'static,
    {
        self.dispatcher.add(Arc::new(publisher));
    }

    /// Always run candidates, regardless of the percentage
    pub fn force(&mut self, force: bool) {
        self.force = force;
    }

    /// Never run candidates; takes precedence over `force`
    pub fn ignore(&mut self, ignore: bool) {
        self.ignore = ignore;
    }

    pub fn registry(&self) -> &BehaviorRegistry<T> {
        &self.registry
    }

    pub fn sampling(&self) -> &SamplingGate {
        &self.gate
    }

    // ------------------------------------------------------------------------
    // Running
    // ------------------------------------------------------------------------

    /// Run the experiment and return the control's result
    ///
    /// Candidate errors, panics and timeouts never change what is returned.
    /// A control panic is re-raised here once every dispatched behavior has
    /// finished.
    pub async fn run(&self, ctx: &ExecutionContext) -> Result<T, ExperimentError> {
        let control = self
            .registry
            .control()
            .cloned()
            .ok_or(ExperimentError::MissingControl)?;

        let run_id = Uuid::new_v4();
        let span = info_span!("experiment", experiment = %self.config.name, run_id = %run_id);

        self.run_with(ctx, control, run_id).instrument(span).await
    }

    async fn run_with(
        &self,
        ctx: &ExecutionContext,
        control: Behavior<T>,
        run_id: Uuid,
    ) -> Result<T, ExperimentError> {
        let run_candidates = self.gate.should_run(self.force, self.ignore);

        let mut behaviors = vec![control];
        let base = if run_candidates {
            behaviors.extend(self.registry.candidates().cloned());
            self.apply_before(ctx)
        } else {
            ctx.clone()
        };
        self.gate.shuffle(&mut behaviors);

        debug!(
            behaviors = behaviors.len(),
            candidates = run_candidates,
            concurrent = self.scheduler.is_concurrent(),
            "Running experiment"
        );

        let mut observations = self
            .scheduler
            .execute(behaviors, &base, run_id)
            .await
            .into_observations();

        self.pipeline.evaluate(&mut observations);

        let observations = Arc::new(observations);
        *self.observations.write().await = Some(Arc::clone(&observations));

        let control = observations
            .control()
            .ok_or(ExperimentError::NoControlObservation)?;

        debug!(
            observations = observations.len(),
            mismatches = observations.mismatches().len(),
            "Experiment run finished"
        );

        match (&control.error, &control.value) {
            (Some(error), _) => Err(ExperimentError::Control(error.clone())),
            (None, Some(value)) => Ok(value.clone()),
            (None, None) => Err(ExperimentError::NoControlObservation),
        }
    }

    fn apply_before(&self, ctx: &ExecutionContext) -> ExecutionContext {
        self.before
            .iter()
            .fold(ctx.clone(), |ctx, filter| filter(ctx))
    }

    /// Observations of the most recent run
    pub async fn observations(&self) -> Option<Arc<Observations<T>>> {
        self.observations.read().await.clone()
    }

    // ------------------------------------------------------------------------
    // Publishing
    // ------------------------------------------------------------------------

    /// Publish the most recent observations to every publisher
    ///
    /// A no-op before the first run.
    pub async fn publish(&self, ctx: &ExecutionContext) -> Result<(), PublishError> {
        match self.observations().await {
            Some(observations) => self.dispatcher.dispatch(ctx, &observations).await,
            None => Ok(()),
        }
    }

    /// Publish on a separate task, off the caller's path
    pub fn publish_in_background(
        self: &Arc<Self>,
        ctx: ExecutionContext,
    ) -> JoinHandle<Result<(), PublishError>> {
        let experiment = Arc::clone(self);
        tokio::spawn(async move { experiment.publish(&ctx).await })
    }
}

impl<T> fmt::Debug for Experiment<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Experiment")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("pipeline", &self.pipeline)
            .field("dispatcher", &self.dispatcher)
            .field("before", &self.before.len())
            .field("force", &self.force)
            .field("ignore", &self.ignore)
            .finish()
    }
}
