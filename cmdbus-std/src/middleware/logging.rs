//! Logging middleware for dispatch observation.

use cmdbus_core::{
    BoxError, ContextContainer, Injectable, Injected, InjectionError, InjectionPoints, MessageRef,
    Middleware, ResultSlot,
};
use std::time::{Duration, Instant};

/// When the current dispatch entered the [`LoggingMiddleware`].
///
/// Bound into the dispatch context, so later middleware and the handler can
/// inject it.
#[derive(Debug, Clone, Copy)]
pub struct DispatchTimer {
    started: Instant,
}

impl DispatchTimer {
    /// Start a timer now.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Time since the timer started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// A middleware that logs every dispatch and its outcome.
///
/// Place it first so the logged duration covers the whole pipeline.
#[derive(Debug, Default)]
pub struct LoggingMiddleware {
    container: Injected<ContextContainer>,
}

impl LoggingMiddleware {
    /// Create a logging middleware.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Injectable for LoggingMiddleware {
    fn injection_points<'a>(
        &'a self,
        points: &mut InjectionPoints<'a>,
    ) -> Result<(), InjectionError> {
        points.container(&self.container);
        Ok(())
    }
}

impl Middleware for LoggingMiddleware {
    fn pre_handle(&self, message: MessageRef<'_>, _slot: &mut ResultSlot) -> Result<(), BoxError> {
        let container = self.container.get().ok_or("dispatch context not injected")?;
        container.bind(DispatchTimer::start());

        #[cfg(feature = "tracing")]
        tracing::info!(message = message.type_name(), "dispatching message");
        #[cfg(not(feature = "tracing"))]
        let _ = message;

        Ok(())
    }

    fn post_handle(&self, message: MessageRef<'_>, slot: &mut ResultSlot) -> Result<(), BoxError> {
        let elapsed = self
            .container
            .get()
            .and_then(|container| container.get::<DispatchTimer>())
            .map(|timer| timer.elapsed())
            .unwrap_or_default();

        #[cfg(feature = "tracing")]
        match slot.error() {
            Some(error) => tracing::warn!(
                message = message.type_name(),
                ?elapsed,
                %error,
                "dispatch failed"
            ),
            None => tracing::info!(
                message = message.type_name(),
                ?elapsed,
                has_result = slot.has_result(),
                "dispatch completed"
            ),
        }
        #[cfg(not(feature = "tracing"))]
        let _ = (message, slot, elapsed);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageBus;
    use crate::factory::HandlerRegistry;
    use cmdbus_core::{Handler, Message};

    struct Slow;
    impl Message for Slow {
        type Result = bool;
    }

    #[derive(Default)]
    struct TimedHandler {
        timer: Injected<DispatchTimer>,
    }

    impl Injectable for TimedHandler {
        fn injection_points<'a>(
            &'a self,
            points: &mut InjectionPoints<'a>,
        ) -> Result<(), InjectionError> {
            points.context(&self.timer);
            Ok(())
        }
    }

    impl Handler<Slow> for TimedHandler {
        fn handle(&self, _: &Slow) -> Result<bool, BoxError> {
            Ok(self.timer.is_set())
        }
    }

    #[test]
    fn test_binds_timer_for_later_stages() {
        let registry = HandlerRegistry::builder()
            .handler::<Slow, _, _>(TimedHandler::default)
            .build()
            .unwrap();
        let bus = MessageBus::builder(registry)
            .middleware(LoggingMiddleware::new())
            .build();

        assert_eq!(bus.dispatch(&Slow).unwrap(), Some(true));
    }

    #[test]
    fn test_leaves_slot_untouched() {
        let registry = HandlerRegistry::builder()
            .handler::<Slow, _, _>(|| cmdbus_core::handler_fn(|_: &Slow| Err::<bool, BoxError>("nope".into())))
            .build()
            .unwrap();
        let bus = MessageBus::builder(registry)
            .middleware(LoggingMiddleware::new())
            .build();

        assert!(matches!(
            bus.dispatch(&Slow),
            Err(cmdbus_core::BusError::Handler(_))
        ));
    }
}
