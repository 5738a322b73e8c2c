//! # cmdbus-std
//!
//! Standard implementations for the cmdbus message dispatch pipeline.
//!
//! This crate provides:
//! - **The bus**: [`MessageBus`], [`MessageBusBuilder`]
//! - **Handler factories**: [`HandlerRegistry`](factory::HandlerRegistry),
//!   and `InventoryHandlerFactory` with the `inventory` feature
//! - **Standard middleware**: Logging, Validation, Transaction
//! - **Failure observers**: [`FanoutObserver`](observer::FanoutObserver), and
//!   `TracingObserver` with the `tracing` feature
//! - **Testing utilities**: [`testing`]

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use cmdbus_core;

// Modules
mod bus;
pub mod factory;
pub mod middleware;
pub mod observer;
pub mod testing;

pub use bus::{MessageBus, MessageBusBuilder};

#[cfg(feature = "inventory")]
pub use inventory;
