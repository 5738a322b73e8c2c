//! # cmdbus - In-Process Message Bus
//!
//! `cmdbus` dispatches a message to exactly one handler through an ordered
//! chain of middleware. Middleware runs a `pre_handle` hook in configured
//! order and a `post_handle` hook in reverse, and steers the pipeline only
//! through the shared [`ResultSlot`]: writing a result or an error during
//! pre-handle short-circuits the handler, writing during post-handle
//! replaces the outcome.
//!
//! Middleware publishes typed context (a transaction, the current user) into
//! the per-dispatch [`ContextContainer`]; later middleware and the handler
//! receive it through [`Injected`] fields declared with [`Injectable`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cmdbus::prelude::*;
//!
//! struct CreateUser { name: String }
//! impl Message for CreateUser { type Result = u64; }
//!
//! let registry = HandlerRegistry::builder()
//!     .handler::<CreateUser, _, _>(|| handler_fn(|cmd: &CreateUser| Ok(cmd.name.len() as u64)))
//!     .build()?;
//!
//! let bus = MessageBus::builder(registry)
//!     .middleware(LoggingMiddleware::new())
//!     .build();
//!
//! let id = bus.dispatch(&CreateUser { name: "ada".into() })?;
//! ```
//!
//! ## Features
//!
//! - `tracing` (default): structured logging of dispatches and swallowed
//!   middleware failures
//! - `macros`: `#[derive(Message)]` and `#[derive(Injectable)]`
//! - `inventory`: link-time handler registration with [`submit_handler!`]
//! - `tower`: expose a bus as a `tower::Service`

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use cmdbus_core::{
    // Errors
    BoxError,
    BusError,
    // Context
    ContextArgs,
    ContextContainer,
    ContextKey,
    // Injection
    DependencyInjector,
    // Handlers
    DynHandler,
    // Middleware
    FailureKind,
    FailureObserver,
    FnHandler,
    Handler,
    HandlerBox,
    HandlerFactory,
    HandlerPanic,
    IgnoreFailures,
    Injectable,
    Injected,
    InjectionError,
    InjectionPoint,
    InjectionPoints,
    InjectionReport,
    // Message
    Message,
    MessageRef,
    Middleware,
    MiddlewareFailure,
    Phase,
    PointKind,
    // Result slot
    ResultSlot,
    SlotState,
    Stage,
    Target,
    UnexpectedMessage,
    boxed,
    handler_fn,
    message_type_name,
};

// The bus
pub use cmdbus_std::{MessageBus, MessageBusBuilder};

/// Handler factories.
pub mod factory {
    pub use cmdbus_std::factory::{HandlerRegistry, HandlerRegistryBuilder, RegistryError};

    #[cfg(feature = "inventory")]
    pub use cmdbus_std::factory::{HandlerRegistration, InventoryHandlerFactory};
}

pub use factory::{HandlerRegistry, HandlerRegistryBuilder, RegistryError};

#[cfg(feature = "inventory")]
pub use factory::InventoryHandlerFactory;

/// Standard middleware implementations.
pub mod middleware {
    #![allow(clippy::wildcard_imports)]
    pub use cmdbus_std::middleware::*;
}

/// Failure observers.
pub mod observer {
    #![allow(clippy::wildcard_imports)]
    pub use cmdbus_std::observer::*;
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use cmdbus_std::testing::*;
}

#[cfg(feature = "tower")]
pub mod tower;

/// Prelude module - common imports for cmdbus.
///
/// # Usage
///
/// ```rust,ignore
/// use cmdbus::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BoxError,
        BusError,
        ContextContainer,
        Handler,
        HandlerFactory,
        HandlerRegistry,
        Injectable,
        Injected,
        InjectionError,
        InjectionPoints,
        Message,
        MessageBus,
        MessageRef,
        Middleware,
        ResultSlot,
        handler_fn,
        middleware::{LoggingMiddleware, TransactionMiddleware, ValidationMiddleware},
    };
}

#[cfg(feature = "macros")]
pub use cmdbus_macros::{Injectable, Message};

#[cfg(feature = "inventory")]
pub use cmdbus_std::submit_handler;

#[cfg(feature = "inventory")]
pub use inventory;
