//! Behaviors and the registry that holds them

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use super::context::ExecutionContext;
use crate::domain::error::ExperimentError;

/// Name reserved for the control behavior
pub const CONTROL_KEY: &str = "control";

/// Boxed future returned by a behavior
pub type BehaviorFuture<T> = BoxFuture<'static, anyhow::Result<T>>;

/// Type-erased behavior function
pub type BehaviorFn<T> = Arc<dyn Fn(ExecutionContext) -> BehaviorFuture<T> + Send + Sync>;

// ============================================================================
// Behavior
// ============================================================================

/// A named unit of work, either the control or a candidate
pub struct Behavior<T> {
    name: String,
    function: BehaviorFn<T>,
}

impl<T> Behavior<T> {
    pub fn new<F, Fut>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            name: name.into(),
            function: Arc::new(move |ctx| function(ctx).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_control(&self) -> bool {
        self.name == CONTROL_KEY
    }

    /// Invoke the behavior; the returned future owns everything it needs
    pub fn call(&self, ctx: ExecutionContext) -> BehaviorFuture<T> {
        (self.function)(ctx)
    }
}

impl<T> Clone for Behavior<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            function: Arc::clone(&self.function),
        }
    }
}

impl<T> fmt::Debug for Behavior<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior").field("name", &self.name).finish()
    }
}

// ============================================================================
// BehaviorRegistry
// ============================================================================

/// Behaviors of one experiment, keyed by name
///
/// Registration takes every function by value, so a function can only ever
/// back a single behavior.
pub struct BehaviorRegistry<T> {
    behaviors: HashMap<String, Behavior<T>>,
}

impl<T> BehaviorRegistry<T> {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
        }
    }

    /// Register the control behavior; fails if one is already present
    pub fn register_control<F, Fut>(&mut self, function: F) -> Result<(), ExperimentError>
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.insert(Behavior::new(CONTROL_KEY, function))
    }

    /// Register a candidate under `name`
    pub fn register_candidate<F, Fut>(
        &mut self,
        name: impl Into<String>,
        function: F,
    ) -> Result<(), ExperimentError>
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(ExperimentError::EmptyBehaviorName);
        }

        if name == CONTROL_KEY {
            return Err(ExperimentError::ReservedName(name));
        }

        self.insert(Behavior::new(name, function))
    }

    fn insert(&mut self, behavior: Behavior<T>) -> Result<(), ExperimentError> {
        if self.behaviors.contains_key(behavior.name()) {
            return Err(ExperimentError::DuplicateBehavior(behavior.name().to_string()));
        }

        self.behaviors.insert(behavior.name().to_string(), behavior);
        Ok(())
    }

    pub fn control(&self) -> Option<&Behavior<T>> {
        self.behaviors.get(CONTROL_KEY)
    }

    /// Every registered behavior except the control
    pub fn candidates(&self) -> impl Iterator<Item = &Behavior<T>> {
        self.behaviors.values().filter(|behavior| !behavior.is_control())
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates().count()
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }
}

impl<T> Default for BehaviorRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BehaviorRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.behaviors.keys().map(String::as_str).collect();
        names.sort_unstable();

        f.debug_struct("BehaviorRegistry")
            .field("behaviors", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn control_fn(_ctx: ExecutionContext) -> anyhow::Result<String> {
        Ok("control".to_string())
    }

    async fn candidate_fn(_ctx: ExecutionContext) -> anyhow::Result<String> {
        Ok("candidate".to_string())
    }

    #[test]
    fn test_register_control_once() {
        let mut registry = BehaviorRegistry::new();
        assert!(registry.is_empty());

        assert!(registry.register_control(control_fn).is_ok());
        assert_eq!(registry.len(), 1);

        let err = registry.register_control(control_fn).unwrap_err();
        assert!(matches!(err, ExperimentError::DuplicateBehavior(ref name) if name == CONTROL_KEY));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_candidates() {
        let mut registry = BehaviorRegistry::new();

        assert!(registry.register_candidate("first", candidate_fn).is_ok());
        assert!(matches!(
            registry.register_candidate("first", candidate_fn),
            Err(ExperimentError::DuplicateBehavior(_))
        ));
        assert!(registry.register_candidate("second", candidate_fn).is_ok());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.candidate_count(), 2);
        assert!(registry.control().is_none());
    }

    #[test]
    fn test_candidate_cannot_use_control_name() {
        let mut registry = BehaviorRegistry::new();

        let err = registry
            .register_candidate(CONTROL_KEY, candidate_fn)
            .unwrap_err();

        assert!(matches!(err, ExperimentError::ReservedName(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_candidate_name_required() {
        let mut registry = BehaviorRegistry::<String>::new();

        assert!(matches!(
            registry.register_candidate("  ", candidate_fn),
            Err(ExperimentError::EmptyBehaviorName)
        ));
    }

    #[test]
    fn test_candidates_exclude_control() {
        let mut registry = BehaviorRegistry::new();
        registry.register_control(control_fn).unwrap();
        registry.register_candidate("alt", candidate_fn).unwrap();

        let names: Vec<&str> = registry.candidates().map(Behavior::name).collect();
        assert_eq!(names, vec!["alt"]);
        assert!(registry.control().unwrap().is_control());
    }

    #[tokio::test]
    async fn test_call_behavior() {
        let behavior = Behavior::new("alt", |ctx: ExecutionContext| async move {
            Ok(ctx.value::<u32>().copied().unwrap_or_default())
        });

        let ctx = ExecutionContext::background().with_value(9_u32);
        assert_eq!(behavior.call(ctx).await.unwrap(), 9);
        assert_eq!(behavior.name(), "alt");
    }
}
