//! The message bus: resolves a handler and runs it through the middleware
//! pipeline.
//!
//! # Execution Model
//!
//! ```text
//! dispatch(message)
//!   ├─ resolve handler            (none → NoHandlerFound, nothing else runs)
//!   ├─ pre_handle  m0 → m1 → …    (stop at the first stage that writes the slot)
//!   ├─ handler                    (only if the slot is still empty)
//!   ├─ post_handle … → m1 → m0    (over every middleware whose pre_handle ran)
//!   └─ resolve the slot
//! ```
//!
//! Every middleware and the handler receive dependency injection against the
//! dispatch's [`ContextContainer`] before each of their stages. The injected
//! cells are cleared when the dispatch returns or unwinds.
//!
//! A panicking handler is caught and stored in the slot as a [`HandlerPanic`],
//! so post-handle still runs and may recover it.

use crate::observer::default_observer;
use cmdbus_core::{
    BoxError, BusError, ContextContainer, DependencyInjector, FailureKind, FailureObserver,
    HandlerFactory, HandlerPanic, InjectionError, Message, MessageRef, Middleware,
    MiddlewareFailure, Phase, ResultSlot, Stage, Target, message_type_name,
};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// An in-process message bus.
///
/// The middleware list and the handler factory are fixed at construction.
/// The bus is `Send + Sync`; every [`dispatch`](MessageBus::dispatch)
/// allocates its own slot, container and injector.
pub struct MessageBus {
    factory: Arc<dyn HandlerFactory>,
    middleware: Vec<Arc<dyn Middleware>>,
    observer: Arc<dyn FailureObserver>,
}

impl MessageBus {
    /// Create a bus from a factory and an ordered middleware list.
    pub fn new<F: HandlerFactory>(factory: F, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            factory: Arc::new(factory),
            middleware,
            observer: default_observer(),
        }
    }

    /// Start building a bus around `factory`.
    pub fn builder<F: HandlerFactory>(factory: F) -> MessageBusBuilder {
        MessageBusBuilder::new(factory)
    }

    /// Names of the configured middleware, in pre-handle order.
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    /// Dispatch `message` through the pipeline.
    ///
    /// Returns the handler's result, or whatever a middleware left in the
    /// slot. `Ok(None)` means the slot ended up empty, for example after a
    /// middleware recovered an error without writing a replacement result.
    pub fn dispatch<M: Message>(&self, message: &M) -> Result<Option<M::Result>, BusError> {
        let message_type = message_type_name::<M>();

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("dispatch", message = message_type).entered();

        let Some(handler) = self.factory.create_handler(message_type) else {
            #[cfg(feature = "tracing")]
            tracing::debug!(message = message_type, "no handler registered");
            return Err(BusError::NoHandlerFound {
                message_type: message_type.to_string(),
            });
        };

        let message = MessageRef::new(message);
        let mut slot = ResultSlot::new();
        let mut injector = DependencyInjector::new(Arc::new(ContextContainer::new()));
        let mut fatal: Option<InjectionError> = None;
        let mut entered = 0;

        for (index, middleware) in self.middleware.iter().enumerate() {
            if let Err(err) = self.inject(&mut injector, Target::Middleware(index), middleware) {
                fatal = Some(err);
                break;
            }
            entered = index + 1;

            slot.enter(Stage::PreHandle(middleware.name()));
            self.guard(index, Phase::PreHandle, middleware.as_ref(), || {
                middleware.pre_handle(message, &mut slot)
            });

            if !slot.is_empty() {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    middleware = middleware.name(),
                    error = slot.has_error(),
                    "pipeline short-circuited"
                );
                break;
            }
        }

        if fatal.is_none() && slot.is_empty() {
            match self.inject(&mut injector, Target::Handler, handler.as_ref()) {
                Ok(()) => {
                    slot.enter(Stage::Handler);
                    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle_dyn(message))) {
                        Ok(Ok(result)) => slot.set_boxed_result(result),
                        Ok(Err(err)) => slot.set_error(err),
                        Err(payload) => {
                            let err = HandlerPanic::new(panic_message(payload));
                            #[cfg(feature = "tracing")]
                            tracing::warn!(message = message_type, error = %err, "handler panicked");
                            slot.set_error(err);
                        }
                    }
                }
                Err(err) => fatal = Some(err),
            }
        }

        for index in (0..entered).rev() {
            let middleware = &self.middleware[index];
            if let Err(err) = self.inject(&mut injector, Target::Middleware(index), middleware) {
                fatal.get_or_insert(err);
                continue;
            }

            slot.enter(Stage::PostHandle(middleware.name()));
            self.guard(index, Phase::PostHandle, middleware.as_ref(), || {
                middleware.post_handle(message, &mut slot)
            });
        }

        if let Some(err) = fatal {
            return Err(err.into());
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(slot = ?slot, "dispatch resolved");

        slot.resolve::<M::Result>()
    }

    fn inject<'a, T>(
        &self,
        injector: &mut DependencyInjector<'a>,
        target: Target,
        object: &'a T,
    ) -> Result<(), InjectionError>
    where
        T: cmdbus_core::Injectable + ?Sized,
    {
        match injector.inject(target, object) {
            Ok(_report) => {
                #[cfg(feature = "tracing")]
                if !_report.pending.is_empty() {
                    tracing::trace!(
                        target_name = object.target_name(),
                        pending = ?_report.pending,
                        "context not bound yet"
                    );
                }
                Ok(())
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %err, "dependency injection failed");
                Err(err)
            }
        }
    }

    fn guard(
        &self,
        index: usize,
        phase: Phase,
        middleware: &dyn Middleware,
        hook: impl FnOnce() -> Result<(), BoxError>,
    ) {
        let kind = match panic::catch_unwind(AssertUnwindSafe(hook)) {
            Ok(Ok(())) => return,
            Ok(Err(err)) => FailureKind::Error(err),
            Err(payload) => FailureKind::Panic(panic_message(payload)),
        };

        self.observer.on_middleware_failure(&MiddlewareFailure {
            middleware: middleware.name(),
            index,
            phase,
            kind,
        });
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("middleware", &self.middleware_names())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Builder for constructing a [`MessageBus`].
pub struct MessageBusBuilder {
    factory: Arc<dyn HandlerFactory>,
    middleware: Vec<Arc<dyn Middleware>>,
    observer: Option<Arc<dyn FailureObserver>>,
}

impl MessageBusBuilder {
    /// Create a builder around `factory`.
    pub fn new<F: HandlerFactory>(factory: F) -> Self {
        Self {
            factory: Arc::new(factory),
            middleware: Vec::new(),
            observer: None,
        }
    }

    /// Append a middleware. Order of calls is pre-handle order.
    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Append an already shared middleware.
    pub fn middleware_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Set the observer for swallowed middleware failures.
    pub fn observer<O: FailureObserver>(mut self, observer: O) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Build the bus.
    pub fn build(self) -> MessageBus {
        MessageBus {
            factory: self.factory,
            middleware: self.middleware,
            observer: self.observer.unwrap_or_else(default_observer),
        }
    }
}
