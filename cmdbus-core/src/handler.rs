//! # Handlers
//!
//! A handler is the terminal stage of a dispatch: the business logic for one
//! message type. Exactly one handler is resolvable per message type.
//!
//! Handlers are written against their concrete message type with
//! [`Handler<M>`]. The bus only sees them through the type-erased
//! [`DynHandler`], produced by [`boxed`] or [`HandlerBox`].
//!
//! # Usage Patterns
//!
//! 1. **Struct implementation**: `impl Handler<CreateUser> for CreateUserHandler`
//! 2. **Closure**: `handler_fn(|cmd: &CreateUser| Ok(UserId(1)))`

use crate::error::BoxError;
use crate::inject::{Injectable, InjectionPoints};
use crate::message::{Message, MessageRef, message_type_name};
use std::any::Any;
use std::marker::PhantomData;
use thiserror::Error;

/// The business logic for message type `M`.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot handle messages of type `{M}`",
    label = "missing `Handler<{M}>` implementation",
    note = "Handlers must implement `Injectable` and `handle` for the message type `{M}`."
)]
pub trait Handler<M: Message>: Injectable + Send + Sync + 'static {
    /// Handle the message, producing its result or failing.
    fn handle(&self, message: &M) -> Result<M::Result, BoxError>;
}

/// Object-safe, type-erased handler as produced by a handler factory.
pub trait DynHandler: Injectable + Send + Sync {
    /// The message type this handler accepts.
    fn message_type(&self) -> &'static str;

    /// Handle a type-erased message.
    fn handle_dyn(&self, message: MessageRef<'_>) -> Result<Box<dyn Any + Send>, BoxError>;
}

/// A handler was asked to handle a message of another type.
#[derive(Error, Debug)]
#[error("handler for `{expected}` received a `{actual}`")]
pub struct UnexpectedMessage {
    /// The message type the handler accepts.
    pub expected: &'static str,
    /// The message type it received.
    pub actual: &'static str,
}

/// Adapts a [`Handler<M>`] into a [`DynHandler`].
pub struct HandlerBox<M, H> {
    handler: H,
    _marker: PhantomData<fn(M)>,
}

impl<M, H> HandlerBox<M, H> {
    /// Wrap `handler`.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }

    /// Borrow the wrapped handler.
    pub fn inner(&self) -> &H {
        &self.handler
    }
}

impl<M, H: Injectable> Injectable for HandlerBox<M, H> {
    fn injection_points<'a>(
        &'a self,
        points: &mut InjectionPoints<'a>,
    ) -> Result<(), crate::error::InjectionError> {
        self.handler.injection_points(points)
    }

    fn target_name(&self) -> &'static str {
        self.handler.target_name()
    }
}

impl<M, H> DynHandler for HandlerBox<M, H>
where
    M: Message,
    H: Handler<M>,
{
    fn message_type(&self) -> &'static str {
        message_type_name::<M>()
    }

    fn handle_dyn(&self, message: MessageRef<'_>) -> Result<Box<dyn Any + Send>, BoxError> {
        let message = message.downcast_ref::<M>().ok_or_else(|| UnexpectedMessage {
            expected: message_type_name::<M>(),
            actual: message.type_name(),
        })?;
        let result = self.handler.handle(message)?;
        Ok(Box::new(result))
    }
}

/// Box a handler for message type `M` as a [`DynHandler`].
pub fn boxed<M, H>(handler: H) -> Box<dyn DynHandler>
where
    M: Message,
    H: Handler<M>,
{
    Box::new(HandlerBox::<M, H>::new(handler))
}

/// A handler built from a closure. It declares no injection points.
#[derive(Clone)]
pub struct FnHandler<F> {
    func: F,
}

/// Build a handler from a closure.
///
/// ```rust,ignore
/// let handler = handler_fn(|cmd: &CreateUser| Ok(UserId::new(&cmd.name)));
/// ```
pub fn handler_fn<F>(func: F) -> FnHandler<F> {
    FnHandler { func }
}

impl<F> Injectable for FnHandler<F> {}

impl<M, F> Handler<M> for FnHandler<F>
where
    M: Message,
    F: Fn(&M) -> Result<M::Result, BoxError> + Send + Sync + 'static,
{
    fn handle(&self, message: &M) -> Result<M::Result, BoxError> {
        (self.func)(message)
    }
}
