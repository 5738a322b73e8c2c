//! Tower integration for cmdbus.
//!
//! [`BusService`] exposes a [`MessageBus`] as a `tower::Service` for every
//! message type, so a bus can sit behind tower layers (timeouts, rate
//! limits, load shedding) or be called from tower-based servers.
//!
//! Dispatch is synchronous; the returned future is already complete.
//!
//! # Example
//!
//! ```rust,ignore
//! use cmdbus::tower::BusService;
//! use tower::Service;
//!
//! let mut service = BusService::new(bus);
//! let id = service.call(CreateUser { name: "ada".into() }).await?;
//! ```

use crate::{BusError, Message, MessageBus};
use futures::future::{Ready, ready};
use std::sync::Arc;
use std::task::{Context, Poll};

/// Wraps a [`MessageBus`] as a tower `Service`.
#[derive(Debug, Clone)]
pub struct BusService {
    bus: Arc<MessageBus>,
}

impl BusService {
    /// Create a service over `bus`.
    pub fn new(bus: MessageBus) -> Self {
        Self { bus: Arc::new(bus) }
    }

    /// Create a service over an already shared bus.
    pub fn from_arc(bus: Arc<MessageBus>) -> Self {
        Self { bus }
    }

    /// Get a reference to the inner bus.
    pub fn inner(&self) -> &MessageBus {
        &self.bus
    }
}

impl<M: Message> ::tower::Service<M> for BusService {
    type Response = Option<M::Result>;
    type Error = BusError;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: M) -> Self::Future {
        ready(self.bus.dispatch(&request))
    }
}

/// Convert a bus into a tower Service.
pub fn into_service(bus: MessageBus) -> BusService {
    BusService::new(bus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoxError, HandlerRegistry, handler_fn};
    use ::tower::Service;
    use futures::executor::block_on;

    #[derive(Debug)]
    struct Double(u32);
    impl Message for Double {
        type Result = u32;
    }

    struct Unknown;
    impl Message for Unknown {
        type Result = ();
    }

    fn service() -> BusService {
        let registry = HandlerRegistry::builder()
            .handler::<Double, _, _>(|| handler_fn(|m: &Double| Ok::<_, BoxError>(m.0 * 2)))
            .build()
            .unwrap();
        into_service(MessageBus::builder(registry).build())
    }

    #[test]
    fn test_service_dispatches() {
        let mut service = service();
        let result = block_on(service.call(Double(21))).unwrap();
        assert_eq!(result, Some(42));
    }

    #[test]
    fn test_service_reports_missing_handler() {
        let mut service = service();
        let err = block_on(service.call(Unknown)).unwrap_err();
        assert!(err.is_no_handler_found());
    }
}
