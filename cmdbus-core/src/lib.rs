//! # cmdbus-core
//!
//! Core contracts for the cmdbus message dispatch pipeline.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! crates that provide middleware or handlers without depending on the bus
//! implementation in `cmdbus-std`.
//!
//! # Pipeline Model
//!
//! A dispatch runs one message through three kinds of stage:
//!
//! ## Middleware ([`Middleware`])
//!
//! Cross-cutting stages with a `pre_handle` hook run in configured order and a
//! `post_handle` hook run in reverse. Middleware steers the pipeline only by
//! writing to the [`ResultSlot`].
//!
//! ## Handler ([`Handler`])
//!
//! The business logic for one message type, resolved per dispatch by a
//! [`HandlerFactory`]. Skipped when a middleware short-circuits.
//!
//! ## Context ([`ContextContainer`], [`Injectable`])
//!
//! Middleware binds typed context into the per-dispatch container; later
//! middleware and the handler receive it through declared injection points,
//! resolved by the [`DependencyInjector`] before each of their stages.
//!
//! # Error Types
//!
//! - [`BusError`] - The failure outcome of a dispatch
//! - [`InjectionError`] - Injection points could not be enumerated
//! - [`HandlerPanic`] - A handler panicked
//! - [`MiddlewareFailure`] - A swallowed middleware failure

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod context;
mod error;
mod factory;
mod handler;
mod inject;
mod message;
mod middleware;
mod slot;

// Re-exports
pub use context::{ContextArgs, ContextContainer, ContextKey, Injected};
pub use error::{BoxError, BusError, HandlerPanic, InjectionError};
pub use factory::HandlerFactory;
pub use handler::{
    DynHandler, FnHandler, Handler, HandlerBox, UnexpectedMessage, boxed, handler_fn,
};
pub use inject::{
    DependencyInjector, Injectable, InjectionPoint, InjectionPoints, InjectionReport, PointKind,
    Target,
};
pub use message::{Message, MessageRef, message_type_name};
pub use middleware::{
    FailureKind, FailureObserver, IgnoreFailures, Middleware, MiddlewareFailure, Phase,
};
pub use slot::{ResultSlot, SlotState, Stage};
