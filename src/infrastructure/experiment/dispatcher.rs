//! Fan-out of observations to every configured publisher

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::experiment::{ExecutionContext, Observations, PublishError, Publisher};

/// Sends each observation to each publisher and keeps every failure
pub struct PublishDispatcher<T> {
    publishers: Vec<Arc<dyn Publisher<T>>>,
}

impl<T> PublishDispatcher<T>
where
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            publishers: Vec::new(),
        }
    }

    pub fn add(&mut self, publisher: Arc<dyn Publisher<T>>) {
        self.publishers.push(publisher);
    }

    /// Publish the whole set; control first, then candidates by name
    pub async fn dispatch(
        &self,
        ctx: &ExecutionContext,
        observations: &Observations<T>,
    ) -> Result<(), PublishError> {
        let mut errors = Vec::new();

        for observation in observations.iter() {
            for publisher in &self.publishers {
                if let Err(error) = publisher.publish(ctx, observation).await {
                    warn!(
                        run_id = %observations.run_id(),
                        behavior = %observation.name,
                        error = %error,
                        "Publisher failed"
                    );
                    errors.push(error);
                }
            }
        }

        debug!(
            run_id = %observations.run_id(),
            observations = observations.len(),
            publishers = self.publishers.len(),
            failures = errors.len(),
            "Observations published"
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PublishError::new(errors))
        }
    }
}

impl<T> Default for PublishDispatcher<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PublishDispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishDispatcher")
            .field("publishers", &self.publishers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::{Observation, CONTROL_KEY};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use uuid::Uuid;

    // Records call order and fails for selected behavior names
    struct MockPublisher {
        fail_for: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl MockPublisher {
        fn new(fail_for: Vec<&'static str>) -> Self {
            Self {
                fail_for,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Publisher<u32> for MockPublisher {
        async fn publish(
            &self,
            _ctx: &ExecutionContext,
            observation: &Observation<u32>,
        ) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(observation.name.clone());

            if self.fail_for.iter().any(|name| *name == observation.name) {
                anyhow::bail!("rejected {}", observation.name);
            }

            Ok(())
        }
    }

    fn observations() -> Observations<u32> {
        let run_id = Uuid::new_v4();
        let entries: HashMap<_, _> = [CONTROL_KEY, "b", "a"]
            .into_iter()
            .map(|name| (name.to_string(), Observation::new(name, run_id)))
            .collect();

        Observations::new(run_id, entries)
    }

    #[tokio::test]
    async fn test_no_publishers_is_ok() {
        let dispatcher = PublishDispatcher::<u32>::new();
        let result = dispatcher
            .dispatch(&ExecutionContext::background(), &observations())
            .await;

        tokio_test::assert_ok!(result);
    }

    #[tokio::test]
    async fn test_every_observation_reaches_every_publisher() {
        let first = Arc::new(MockPublisher::new(vec![]));
        let second = Arc::new(MockPublisher::new(vec![]));

        let mut dispatcher = PublishDispatcher::<u32>::new();
        dispatcher.add(first.clone());
        dispatcher.add(second.clone());

        let result = dispatcher
            .dispatch(&ExecutionContext::background(), &observations())
            .await;

        tokio_test::assert_ok!(result);
        assert_eq!(first.calls(), vec![CONTROL_KEY, "a", "b"]);
        assert_eq!(second.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_failures_are_collected_not_short_circuited() {
        let publisher = Arc::new(MockPublisher::new(vec!["a", "b"]));

        let mut dispatcher = PublishDispatcher::<u32>::new();
        dispatcher.add(publisher.clone());

        let error = dispatcher
            .dispatch(&ExecutionContext::background(), &observations())
            .await
            .unwrap_err();

        assert_eq!(error.len(), 2);
        assert_eq!(error.errors()[0].to_string(), "rejected a");
        assert_eq!(error.errors()[1].to_string(), "rejected b");
        assert_eq!(publisher.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_in_one_publisher_does_not_skip_others() {
        let failing = Arc::new(MockPublisher::new(vec![CONTROL_KEY, "a", "b"]));
        let healthy = Arc::new(MockPublisher::new(vec![]));

        let mut dispatcher = PublishDispatcher::<u32>::new();
        dispatcher.add(failing);
        dispatcher.add(healthy.clone());

        let error = dispatcher
            .dispatch(&ExecutionContext::background(), &observations())
            .await
            .unwrap_err();

        assert_eq!(error.len(), 3);
        assert_eq!(healthy.calls().len(), 3);
    }
}
