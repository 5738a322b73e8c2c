//! Failure observers for swallowed middleware failures.

use cmdbus_core::{FailureObserver, MiddlewareFailure};
use std::sync::Arc;

#[cfg(not(feature = "tracing"))]
use cmdbus_core::IgnoreFailures;

/// Logs every swallowed middleware failure as a `tracing` warning.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

#[cfg(feature = "tracing")]
impl FailureObserver for TracingObserver {
    fn on_middleware_failure(&self, failure: &MiddlewareFailure) {
        tracing::warn!(
            middleware = failure.middleware,
            index = failure.index,
            phase = %failure.phase,
            "{failure}"
        );
    }
}

/// An observer that forwards every failure to each inner observer in turn.
pub struct FanoutObserver {
    observers: Vec<Arc<dyn FailureObserver>>,
}

impl FanoutObserver {
    /// Create an observer over `observers`.
    pub fn new(observers: Vec<Arc<dyn FailureObserver>>) -> Self {
        Self { observers }
    }
}

impl FailureObserver for FanoutObserver {
    fn on_middleware_failure(&self, failure: &MiddlewareFailure) {
        for observer in &self.observers {
            observer.on_middleware_failure(failure);
        }
    }
}

#[cfg(feature = "tracing")]
pub(crate) fn default_observer() -> Arc<dyn FailureObserver> {
    Arc::new(TracingObserver)
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn default_observer() -> Arc<dyn FailureObserver> {
    Arc::new(IgnoreFailures)
}
