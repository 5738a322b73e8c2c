//! Handler factories.
//!
//! - [`HandlerRegistry`]: explicit registration through a builder
//! - [`InventoryHandlerFactory`]: link-time registration with
//!   [`submit_handler!`](crate::submit_handler) (requires the `inventory` feature)

mod registry;

#[cfg(feature = "inventory")]
mod inventory;

pub use registry::{HandlerRegistry, HandlerRegistryBuilder, RegistryError};

#[cfg(feature = "inventory")]
pub use self::inventory::{HandlerRegistration, InventoryHandlerFactory};
