//! Execution context handed to every behavior
//!
//! A context carries a cancellation signal, an optional deadline and a bag of
//! typed values. Deriving a child context never affects the parent or any
//! sibling, while cancelling a parent cascades to every context derived
//! from it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{select_all, BoxFuture, FutureExt};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::domain::error::BehaviorError;

type Values = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Reason a context stopped accepting work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Cancelled,
    DeadlineExceeded,
}

impl From<Interruption> for BehaviorError {
    fn from(interruption: Interruption) -> Self {
        match interruption {
            Interruption::Cancelled => BehaviorError::Cancelled,
            Interruption::DeadlineExceeded => BehaviorError::DeadlineExceeded,
        }
    }
}

/// Cancellable, deadline-aware context
///
/// Cloning yields a handle to the same context; use [`child`](Self::child)
/// or [`with_timeout`](Self::with_timeout) to derive an independent one.
#[derive(Clone)]
pub struct ExecutionContext {
    // Ancestors first, this context's own signal last.
    signals: Vec<Arc<watch::Sender<bool>>>,
    deadline: Option<Instant>,
    values: Arc<Values>,
}

impl ExecutionContext {
    /// Root context: never cancelled unless asked, no deadline, no values
    pub fn background() -> Self {
        Self {
            signals: vec![Arc::new(watch::Sender::new(false))],
            deadline: None,
            values: Arc::new(HashMap::new()),
        }
    }

    /// Derive a context that is cancelled with this one but can also be
    /// cancelled on its own
    pub fn child(&self) -> Self {
        let mut signals = self.signals.clone();
        signals.push(Arc::new(watch::Sender::new(false)));

        Self {
            signals,
            deadline: self.deadline,
            values: Arc::clone(&self.values),
        }
    }

    /// Derive a child context that expires after `timeout`
    ///
    /// An earlier deadline inherited from the parent is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child context that expires at `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.child();
        child.deadline = Some(match self.deadline {
            Some(inherited) if inherited < deadline => inherited,
            _ => deadline,
        });
        child
    }

    /// Attach a value, keyed by its type
    ///
    /// The returned context shares cancellation with `self`.
    pub fn with_value<V>(&self, value: V) -> Self
    where
        V: Send + Sync + 'static,
    {
        let mut values = (*self.values).clone();
        values.insert(TypeId::of::<V>(), Arc::new(value));

        Self {
            signals: self.signals.clone(),
            deadline: self.deadline,
            values: Arc::new(values),
        }
    }

    /// Look up a value previously attached with [`with_value`](Self::with_value)
    pub fn value<V>(&self) -> Option<&V>
    where
        V: Send + Sync + 'static,
    {
        self.values
            .get(&TypeId::of::<V>())
            .and_then(|value| value.downcast_ref::<V>())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and everything derived from it
    pub fn cancel(&self) {
        if let Some(own) = self.signals.last() {
            own.send_replace(true);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.signals.iter().any(|signal| *signal.borrow())
    }

    /// Why the context stopped, or `None` while it is still live
    pub fn err(&self) -> Option<Interruption> {
        if self.is_cancelled() {
            return Some(Interruption::Cancelled);
        }

        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interruption::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once this context or any ancestor is cancelled
    pub async fn cancelled(&self) {
        let waits: Vec<BoxFuture<'static, ()>> = self
            .signals
            .iter()
            .map(|signal| {
                let signal = Arc::clone(signal);
                let mut receiver = signal.subscribe();

                async move {
                    let _ = receiver.wait_for(|cancelled| *cancelled).await;
                    drop(signal);
                }
                .boxed()
            })
            .collect();

        select_all(waits).await;
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn done(&self) -> Interruption {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancelled() => Interruption::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Interruption::DeadlineExceeded,
            },
            None => {
                self.cancelled().await;
                Interruption::Cancelled
            }
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("depth", &self.signals.len())
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .field("values", &self.values.len())
            .finish()
    }
}
