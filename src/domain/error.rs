use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// Errors raised while configuring or running an experiment
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("Experiment has no control behavior")]
    MissingControl,

    #[error("Behavior '{0}' is already registered")]
    DuplicateBehavior(String),

    #[error("Behavior name '{0}' is reserved for the control")]
    ReservedName(String),

    #[error("Behavior name cannot be empty")]
    EmptyBehaviorName,

    #[error("Experiment name cannot be empty")]
    EmptyExperimentName,

    #[error("Percentage must be between 0 and 100, got {0}")]
    InvalidPercentage(u8),

    #[error("Timeout must be at least 1ms")]
    ZeroTimeout,

    #[error("Run finished without a control observation")]
    NoControlObservation,

    /// The control behavior failed; carries its error untouched
    #[error(transparent)]
    Control(#[from] BehaviorError),
}

impl ExperimentError {
    /// Whether this is a configuration problem detected before anything ran
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            Self::MissingControl
                | Self::DuplicateBehavior(_)
                | Self::ReservedName(_)
                | Self::EmptyBehaviorName
                | Self::EmptyExperimentName
                | Self::InvalidPercentage(_)
                | Self::ZeroTimeout
        )
    }

    /// The control's error, if the control is what failed
    pub fn as_control(&self) -> Option<&BehaviorError> {
        match self {
            Self::Control(error) => Some(error),
            _ => None,
        }
    }
}

/// Outcome of a behavior that did not produce a value
#[derive(Debug, Clone, Error)]
pub enum BehaviorError {
    /// The behavior returned an error of its own
    #[error("{0}")]
    Failed(Arc<anyhow::Error>),

    #[error("experiment candidate '{name}' panicked")]
    CandidatePanicked { name: String, payload: PanicPayload },

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("context canceled")]
    Cancelled,
}

impl BehaviorError {
    pub fn failed(error: anyhow::Error) -> Self {
        Self::Failed(Arc::new(error))
    }

    /// The error returned by the behavior itself, if any
    pub fn as_failure(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Failed(error) => Some(error.as_ref()),
            _ => None,
        }
    }

    /// Downcast the behavior's own error to a concrete type
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.as_failure().and_then(|error| error.downcast_ref::<E>())
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Self::CandidatePanicked { .. })
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Payload captured from a panicking candidate
///
/// Keeps a readable message for logs and publishers next to the original
/// boxed payload, which can be taken out once.
#[derive(Clone)]
pub struct PanicPayload {
    message: Arc<str>,
    raw: Arc<Mutex<Option<Box<dyn Any + Send>>>>,
}

impl PanicPayload {
    pub fn new(payload: Box<dyn Any + Send>) -> Self {
        let message = panic_message(payload.as_ref());

        Self {
            message: message.into(),
            raw: Arc::new(Mutex::new(Some(payload))),
        }
    }

    /// Message extracted from a `&str` or `String` payload
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Take the original payload; `None` if it was already taken
    pub fn take(&self) -> Option<Box<dyn Any + Send>> {
        self.raw.lock().ok().and_then(|mut raw| raw.take())
    }
}

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicPayload")
            .field("message", &self.message)
            .finish()
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
