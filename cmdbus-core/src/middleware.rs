//! # Middleware
//!
//! Cross-cutting logic wrapped around every handler: logging, transactions,
//! validation, context wiring. A bus runs its middleware in configured order
//! before the handler and in reverse order after it.
//!
//! # Protocol
//!
//! Middleware talks to the pipeline only through the [`ResultSlot`]:
//!
//! - writing a result or an error during [`pre_handle`] short-circuits the
//!   pipeline: the handler and the remaining pre-handle stages are skipped;
//! - writing during [`post_handle`] replaces the outcome, and clearing the
//!   error recovers from a failure.
//!
//! Returning `Err` from either hook is *not* part of the protocol. It is an
//! unexpected failure of the middleware itself: the bus reports it to its
//! [`FailureObserver`] and carries on with the next stage.
//!
//! [`pre_handle`]: Middleware::pre_handle
//! [`post_handle`]: Middleware::post_handle

use crate::error::BoxError;
use crate::inject::Injectable;
use crate::message::MessageRef;
use crate::slot::ResultSlot;
use std::fmt;
use std::sync::Arc;

/// A pluggable stage wrapped around every handler.
///
/// Middleware is shared by every dispatch of the bus it is configured on,
/// so hooks take `&self`. Per-dispatch state belongs in the dispatch context.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a Middleware",
    label = "missing `Middleware` implementation",
    note = "Middleware must implement `Injectable` and both `pre_handle` and `post_handle`."
)]
pub trait Middleware: Injectable + Send + Sync + 'static {
    /// Runs before the handler, in configured order.
    fn pre_handle(&self, message: MessageRef<'_>, slot: &mut ResultSlot) -> Result<(), BoxError>;

    /// Runs after the handler, in reverse order.
    ///
    /// Called even when an earlier stage short-circuited, as long as this
    /// middleware's `pre_handle` ran.
    fn post_handle(&self, message: MessageRef<'_>, slot: &mut ResultSlot) -> Result<(), BoxError>;

    /// The name used in errors and diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<M: Middleware + ?Sized> Injectable for Arc<M> {
    fn injection_points<'a>(
        &'a self,
        points: &mut crate::inject::InjectionPoints<'a>,
    ) -> Result<(), crate::error::InjectionError> {
        (**self).injection_points(points)
    }

    fn target_name(&self) -> &'static str {
        (**self).target_name()
    }
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn pre_handle(&self, message: MessageRef<'_>, slot: &mut ResultSlot) -> Result<(), BoxError> {
        (**self).pre_handle(message, slot)
    }

    fn post_handle(&self, message: MessageRef<'_>, slot: &mut ResultSlot) -> Result<(), BoxError> {
        (**self).post_handle(message, slot)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Which hook of a middleware was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// [`Middleware::pre_handle`].
    PreHandle,
    /// [`Middleware::post_handle`].
    PostHandle,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::PreHandle => f.write_str("pre_handle"),
            Phase::PostHandle => f.write_str("post_handle"),
        }
    }
}

/// How a middleware hook failed outside the slot protocol.
#[derive(Debug)]
pub enum FailureKind {
    /// The hook returned an error.
    Error(BoxError),
    /// The hook panicked.
    Panic(String),
}

/// An unexpected middleware failure that the bus swallowed.
#[derive(Debug)]
pub struct MiddlewareFailure {
    /// Name of the failing middleware.
    pub middleware: &'static str,
    /// Position of the middleware in the pipeline.
    pub index: usize,
    /// The hook that failed.
    pub phase: Phase,
    /// The failure itself.
    pub kind: FailureKind,
}

impl fmt::Display for MiddlewareFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::Error(err) => write!(
                f,
                "middleware `{}` failed in {}: {}",
                self.middleware, self.phase, err
            ),
            FailureKind::Panic(msg) => write!(
                f,
                "middleware `{}` panicked in {}: {}",
                self.middleware, self.phase, msg
            ),
        }
    }
}

/// Receives middleware failures the bus swallows.
pub trait FailureObserver: Send + Sync + 'static {
    /// Called once per swallowed failure.
    fn on_middleware_failure(&self, failure: &MiddlewareFailure);
}

impl<F> FailureObserver for F
where
    F: Fn(&MiddlewareFailure) + Send + Sync + 'static,
{
    fn on_middleware_failure(&self, failure: &MiddlewareFailure) {
        (self)(failure)
    }
}

/// An observer that ignores every failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreFailures;

impl FailureObserver for IgnoreFailures {
    fn on_middleware_failure(&self, _failure: &MiddlewareFailure) {}
}
