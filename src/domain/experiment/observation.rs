//! Recorded outcome of running a behavior once

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::behavior::CONTROL_KEY;
use crate::domain::error::{BehaviorError, PanicPayload};

// ============================================================================
// Observation
// ============================================================================

/// Outcome of one behavior in one run
#[derive(Debug, Clone)]
pub struct Observation<T> {
    /// Behavior name
    pub name: String,
    /// Run this observation belongs to
    pub run_id: Uuid,
    /// When the behavior was dispatched
    pub started_at: DateTime<Utc>,
    /// Value returned by the behavior
    pub value: Option<T>,
    /// Error returned by, or imposed on, the behavior
    pub error: Option<BehaviorError>,
    /// Payload of a candidate panic
    pub panic: Option<PanicPayload>,
    /// Wall-clock time from dispatch to completion
    pub duration: Duration,
    /// Result of the compare step; always true for the control
    pub success: bool,
    /// Whether compare ran for this observation
    pub compared: bool,
    /// Value after the clean step
    pub clean_value: Option<T>,
    /// Cleaned control value this observation was judged against
    pub control_value: Option<T>,
}

impl<T> Observation<T> {
    pub fn new(name: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            name: name.into(),
            run_id,
            started_at: Utc::now(),
            value: None,
            error: None,
            panic: None,
            duration: Duration::ZERO,
            success: false,
            compared: false,
            clean_value: None,
            control_value: None,
        }
    }

    pub fn is_control(&self) -> bool {
        self.name == CONTROL_KEY
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn panicked(&self) -> bool {
        self.panic.is_some()
    }

    /// Compare ran and rejected the candidate
    pub fn is_mismatch(&self) -> bool {
        self.compared && !self.success
    }

    /// Serializable summary without the value itself
    pub fn record(&self) -> ObservationRecord {
        ObservationRecord {
            name: self.name.clone(),
            run_id: self.run_id,
            started_at: self.started_at,
            duration_ms: self.duration.as_micros() as f64 / 1000.0,
            success: self.success,
            compared: self.compared,
            error: self.error.as_ref().map(ToString::to_string),
            panic: self.panic.as_ref().map(|p| p.message().to_string()),
        }
    }
}

// ============================================================================
// ObservationRecord
// ============================================================================

/// Value-free view of an observation, suitable for logs and exporters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub name: String,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: f64,
    pub success: bool,
    pub compared: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panic: Option<String>,
}

// ============================================================================
// Observations
// ============================================================================

/// All observations of a single run, keyed by behavior name
#[derive(Debug, Clone)]
pub struct Observations<T> {
    run_id: Uuid,
    entries: HashMap<String, Observation<T>>,
}

impl<T> Observations<T> {
    pub fn new(run_id: Uuid, entries: HashMap<String, Observation<T>>) -> Self {
        Self { run_id, entries }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn control(&self) -> Option<&Observation<T>> {
        self.entries.get(CONTROL_KEY)
    }

    /// Candidate observations, sorted by name
    pub fn candidates(&self) -> Vec<&Observation<T>> {
        let mut candidates: Vec<&Observation<T>> = self
            .entries
            .values()
            .filter(|observation| !observation.is_control())
            .collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        candidates
    }

    /// Candidates that were compared and did not match, sorted by name
    pub fn mismatches(&self) -> Vec<&Observation<T>> {
        self.candidates()
            .into_iter()
            .filter(|observation| observation.is_mismatch())
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<&Observation<T>> {
        self.entries.get(name)
    }

    /// Control first, then candidates by name
    pub fn iter(&self) -> impl Iterator<Item = &Observation<T>> {
        self.control().into_iter().chain(self.candidates())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn control_mut(&mut self) -> Option<&mut Observation<T>> {
        self.entries.get_mut(CONTROL_KEY)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Observation<T>> {
        self.entries.values_mut()
    }
}
