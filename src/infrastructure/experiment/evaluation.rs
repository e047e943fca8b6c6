//! Clean and compare steps applied once a run has fully completed

use std::fmt;
use std::sync::Arc;

use crate::domain::experiment::Observations;

/// Normalizes a value before comparison and publishing
pub type CleanFn<T> = Arc<dyn Fn(&T) -> T + Send + Sync>;

/// Decides whether a candidate value matches the control value
pub type CompareFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Optional clean step followed by an optional compare step
///
/// Only observations without an error take part. Without a clean function
/// the clean value is a copy of the value; without a compare function
/// candidates keep `success == false` and `compared == false`.
pub struct EvaluationPipeline<T> {
    clean: Option<CleanFn<T>>,
    compare: Option<CompareFn<T>>,
}

impl<T> EvaluationPipeline<T>
where
    T: Clone,
{
    pub fn new() -> Self {
        Self {
            clean: None,
            compare: None,
        }
    }

    pub fn set_clean<F>(&mut self, clean: F)
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        self.clean = Some(Arc::new(clean));
    }

    pub fn set_compare<F>(&mut self, compare: F)
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.compare = Some(Arc::new(compare));
    }

    fn clean_value(&self, value: &T) -> T {
        match &self.clean {
            Some(clean) => clean(value),
            None => value.clone(),
        }
    }

    /// Clean every qualifying observation, then judge candidates against control
    pub fn evaluate(&self, observations: &mut Observations<T>) {
        for observation in observations.iter_mut() {
            if observation.error.is_some() {
                continue;
            }

            if let Some(value) = &observation.value {
                observation.clean_value = Some(self.clean_value(value));
            }
        }

        let control_clean = observations
            .control()
            .and_then(|control| control.clean_value.clone());

        if let Some(control) = observations.control_mut() {
            control.success = true;
        }

        for candidate in observations
            .iter_mut()
            .filter(|observation| !observation.is_control())
        {
            candidate.control_value = control_clean.clone();

            if let (Some(compare), Some(expected), Some(actual)) =
                (&self.compare, &control_clean, &candidate.clean_value)
            {
                candidate.success = compare(expected, actual);
                candidate.compared = true;
            }
        }
    }
}

impl<T> Default for EvaluationPipeline<T>
where
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EvaluationPipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationPipeline")
            .field("clean", &self.clean.is_some())
            .field("compare", &self.compare.is_some())
            .finish()
    }
}
