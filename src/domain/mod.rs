//! Domain layer - Experiment types and errors

pub mod error;
pub mod experiment;

pub use error::{BehaviorError, ExperimentError, PanicPayload};
pub use experiment::{
    Behavior, BehaviorRegistry, ExecutionContext, Interruption, Observation, ObservationRecord,
    Observations, PublishError, Publisher, CONTROL_KEY,
};
