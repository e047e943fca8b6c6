//! Concurrent collection of observations for a single run

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::domain::experiment::{Observation, Observations};

/// Accumulates one observation per behavior, written from many tasks
#[derive(Debug)]
pub struct ObservationAggregator<T> {
    run_id: Uuid,
    entries: Mutex<HashMap<String, Observation<T>>>,
}

impl<T> ObservationAggregator<T>
where
    T: Clone,
{
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Record an observation; a second report for the same behavior keeps the first
    pub async fn record(&self, observation: Observation<T>) {
        let mut entries = self.entries.lock().await;

        if entries.contains_key(&observation.name) {
            warn!(
                run_id = %self.run_id,
                behavior = %observation.name,
                "Duplicate observation ignored"
            );
            return;
        }

        entries.insert(observation.name.clone(), observation);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Close the run and hand out the collected set
    ///
    /// Only call once every dispatched behavior has reported.
    pub async fn close(self: Arc<Self>) -> Observations<T> {
        match Arc::try_unwrap(self) {
            Ok(aggregator) => Observations::new(aggregator.run_id, aggregator.entries.into_inner()),
            Err(shared) => {
                let entries = shared.entries.lock().await.clone();
                Observations::new(shared.run_id, entries)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(name: &str, run_id: Uuid, value: u32) -> Observation<u32> {
        let mut observation = Observation::new(name, run_id);
        observation.value = Some(value);
        observation
    }

    #[tokio::test]
    async fn test_record_and_close() {
        let run_id = Uuid::new_v4();
        let aggregator = Arc::new(ObservationAggregator::new(run_id));

        aggregator.record(observation("control", run_id, 1)).await;
        aggregator.record(observation("alt", run_id, 2)).await;
        assert_eq!(aggregator.len().await, 2);

        let observations = aggregator.close().await;
        assert_eq!(observations.run_id(), run_id);
        assert_eq!(observations.control().and_then(|o| o.value), Some(1));
        assert_eq!(observations.find("alt").and_then(|o| o.value), Some(2));
    }

    #[tokio::test]
    async fn test_duplicate_keeps_first() {
        let run_id = Uuid::new_v4();
        let aggregator = Arc::new(ObservationAggregator::new(run_id));

        aggregator.record(observation("alt", run_id, 1)).await;
        aggregator.record(observation("alt", run_id, 2)).await;

        let observations = aggregator.close().await;
        assert_eq!(observations.len(), 1);
        assert_eq!(observations.find("alt").and_then(|o| o.value), Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers() {
        let run_id = Uuid::new_v4();
        let aggregator = Arc::new(ObservationAggregator::new(run_id));

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let aggregator = Arc::clone(&aggregator);
                tokio::spawn(async move {
                    aggregator
                        .record(observation(&format!("candidate-{}", i), run_id, i))
                        .await;
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        let observations = aggregator.close().await;
        assert_eq!(observations.len(), 64);
        assert_eq!(observations.find("candidate-17").and_then(|o| o.value), Some(17));
    }

    #[tokio::test]
    async fn test_close_while_shared() {
        let run_id = Uuid::new_v4();
        let aggregator = Arc::new(ObservationAggregator::new(run_id));
        let other = Arc::clone(&aggregator);

        aggregator.record(observation("control", run_id, 5)).await;

        let observations = aggregator.close().await;
        assert_eq!(observations.len(), 1);
        assert!(!other.is_empty().await);
    }
}
