//! Link-time handler registration.
//!
//! Handlers submitted anywhere in the final binary with
//! [`submit_handler!`](crate::submit_handler) are collected by
//! [`InventoryHandlerFactory`].

use super::RegistryError;
use cmdbus_core::{DynHandler, HandlerFactory};
use std::collections::HashMap;
use std::fmt;

/// Registration entry for a handler in the global registry.
///
/// This struct is submitted to `inventory` for automatic collection.
pub struct HandlerRegistration {
    message_type: fn() -> &'static str,
    create: fn() -> Box<dyn DynHandler>,
}

impl HandlerRegistration {
    /// Create a registration entry.
    pub const fn new(
        message_type: fn() -> &'static str,
        create: fn() -> Box<dyn DynHandler>,
    ) -> Self {
        Self {
            message_type,
            create,
        }
    }

    /// The message type this entry handles.
    pub fn message_type(&self) -> &'static str {
        (self.message_type)()
    }
}

::inventory::collect!(HandlerRegistration);

/// A [`HandlerFactory`] over every [`HandlerRegistration`] in the binary.
///
/// ```rust,ignore
/// submit_handler!(CreateUser => CreateUserHandler::default());
///
/// let bus = MessageBus::builder(InventoryHandlerFactory::try_new()?).build();
/// ```
pub struct InventoryHandlerFactory {
    constructors: HashMap<&'static str, fn() -> Box<dyn DynHandler>>,
}

impl InventoryHandlerFactory {
    /// Collect every submitted handler.
    ///
    /// When a message type was submitted more than once, one of the entries
    /// is kept and the others are ignored. Use [`try_new`](Self::try_new) to
    /// reject duplicates instead.
    pub fn new() -> Self {
        let mut constructors = HashMap::new();
        for registration in ::inventory::iter::<HandlerRegistration>() {
            let message_type = registration.message_type();
            if constructors.contains_key(message_type) {
                #[cfg(feature = "tracing")]
                tracing::warn!(message = message_type, "ignoring duplicate handler registration");
                continue;
            }
            constructors.insert(message_type, registration.create);
        }
        Self { constructors }
    }

    /// Collect every submitted handler, failing on duplicates.
    pub fn try_new() -> Result<Self, RegistryError> {
        let mut constructors = HashMap::new();
        for registration in ::inventory::iter::<HandlerRegistration>() {
            let message_type = registration.message_type();
            if constructors.insert(message_type, registration.create).is_some() {
                return Err(RegistryError::DuplicateHandler(message_type));
            }
        }
        Ok(Self { constructors })
    }

    /// Number of collected handlers.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Returns `true` if nothing was submitted.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl Default for InventoryHandlerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerFactory for InventoryHandlerFactory {
    fn create_handler(&self, message_type: &str) -> Option<Box<dyn DynHandler>> {
        self.constructors.get(message_type).map(|create| create())
    }
}

impl fmt::Debug for InventoryHandlerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}

/// Registers a handler for a message type with [`InventoryHandlerFactory`].
///
/// The expression is evaluated each time a handler is needed, so it should
/// be a cheap constructor.
///
/// # Example
/// ```rust,ignore
/// submit_handler!(CreateUser => CreateUserHandler::default());
/// ```
#[macro_export]
macro_rules! submit_handler {
    ($message:ty => $handler:expr) => {
        $crate::inventory::submit! {
            $crate::factory::HandlerRegistration::new(
                $crate::cmdbus_core::message_type_name::<$message>,
                || $crate::cmdbus_core::boxed::<$message, _>($handler),
            )
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdbus_core::{BoxError, Message, MessageRef, handler_fn, message_type_name};

    struct Collected;
    impl Message for Collected {
        type Result = u32;
    }

    struct Missing;
    impl Message for Missing {
        type Result = ();
    }

    crate::submit_handler!(Collected => handler_fn(|_: &Collected| Ok::<_, BoxError>(11)));

    #[test]
    fn test_collects_submitted_handlers() {
        let factory = InventoryHandlerFactory::try_new().unwrap();
        assert!(!factory.is_empty());

        let handler = factory
            .create_handler(message_type_name::<Collected>())
            .unwrap();
        let result = handler.handle_dyn(MessageRef::new(&Collected)).unwrap();
        assert_eq!(result.downcast_ref::<u32>(), Some(&11));

        assert!(factory.create_handler(message_type_name::<Missing>()).is_none());
    }
}
