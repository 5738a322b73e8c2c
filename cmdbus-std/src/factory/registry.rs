//! Builder-configured handler registry.

use cmdbus_core::{DynHandler, Handler, HandlerFactory, Message, boxed, message_type_name};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

type Constructor = Box<dyn Fn() -> Box<dyn DynHandler> + Send + Sync>;

/// Errors raised while building a [`HandlerRegistry`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two handlers were registered for the same message type.
    #[error("duplicate handler for message type `{0}`")]
    DuplicateHandler(&'static str),
}

/// A [`HandlerFactory`] backed by a map from message type to constructor.
///
/// A fresh handler is constructed for every dispatch, so handlers may keep
/// per-dispatch state in their fields.
pub struct HandlerRegistry {
    constructors: HashMap<&'static str, Constructor>,
}

impl HandlerRegistry {
    /// Start building a registry.
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// Returns `true` if a handler is registered for `M`.
    pub fn contains<M: Message>(&self) -> bool {
        self.constructors.contains_key(message_type_name::<M>())
    }

    /// The registered message types, in no particular order.
    pub fn message_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl HandlerFactory for HandlerRegistry {
    fn create_handler(&self, message_type: &str) -> Option<Box<dyn DynHandler>> {
        self.constructors.get(message_type).map(|create| create())
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}

/// Builder for [`HandlerRegistry`].
///
/// Duplicate registrations are rejected unless
/// [`allow_overrides`](Self::allow_overrides) is set, in which case the last
/// registration wins.
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    constructors: HashMap<&'static str, Constructor>,
    allow_overrides: bool,
    error: Option<RegistryError>,
}

impl HandlerRegistryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Let later registrations replace earlier ones for the same message type.
    pub fn allow_overrides(mut self) -> Self {
        self.allow_overrides = true;
        self
    }

    /// Register `create` as the constructor of the handler for `M`.
    ///
    /// A duplicate is reported by [`build`](Self::build).
    pub fn handler<M, H, F>(mut self, create: F) -> Self
    where
        M: Message,
        H: Handler<M>,
        F: Fn() -> H + Send + Sync + 'static,
    {
        if let Err(err) = self.insert::<M, H, F>(create) {
            self.error.get_or_insert(err);
        }
        self
    }

    /// Register a constructor, reporting a duplicate immediately.
    pub fn insert<M, H, F>(&mut self, create: F) -> Result<(), RegistryError>
    where
        M: Message,
        H: Handler<M>,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.insert_dyn(message_type_name::<M>(), Box::new(move || boxed::<M, H>(create())))
    }

    /// Register a type-erased constructor under an explicit message type name.
    pub fn insert_dyn(
        &mut self,
        message_type: &'static str,
        create: Box<dyn Fn() -> Box<dyn DynHandler> + Send + Sync>,
    ) -> Result<(), RegistryError> {
        if !self.allow_overrides && self.constructors.contains_key(message_type) {
            return Err(RegistryError::DuplicateHandler(message_type));
        }
        self.constructors.insert(message_type, create);
        Ok(())
    }

    /// Build the registry.
    pub fn build(self) -> Result<HandlerRegistry, RegistryError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(HandlerRegistry {
                constructors: self.constructors,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdbus_core::{BoxError, MessageRef, handler_fn};

    struct Ping;
    impl Message for Ping {
        type Result = &'static str;
    }

    struct Pong;
    impl Message for Pong {
        type Result = u8;
    }

    #[test]
    fn test_resolves_registered_handler() {
        let registry = HandlerRegistry::builder()
            .handler::<Ping, _, _>(|| handler_fn(|_: &Ping| Ok::<_, BoxError>("pong")))
            .build()
            .unwrap();

        assert!(registry.contains::<Ping>());
        assert!(!registry.contains::<Pong>());
        assert_eq!(registry.len(), 1);

        let handler = registry.create_handler(message_type_name::<Ping>()).unwrap();
        let result = handler.handle_dyn(MessageRef::new(&Ping)).unwrap();
        assert_eq!(result.downcast_ref::<&str>(), Some(&"pong"));
        assert!(registry.create_handler(message_type_name::<Pong>()).is_none());
    }

    #[test]
    fn test_duplicate_handler_error() {
        let result = HandlerRegistry::builder()
            .handler::<Pong, _, _>(|| handler_fn(|_: &Pong| Ok::<_, BoxError>(1)))
            .handler::<Pong, _, _>(|| handler_fn(|_: &Pong| Ok::<_, BoxError>(2)))
            .build();

        assert_eq!(
            result.unwrap_err(),
            RegistryError::DuplicateHandler(message_type_name::<Pong>())
        );
    }

    #[test]
    fn test_allow_overrides() {
        let registry = HandlerRegistry::builder()
            .allow_overrides()
            .handler::<Pong, _, _>(|| handler_fn(|_: &Pong| Ok::<_, BoxError>(1)))
            .handler::<Pong, _, _>(|| handler_fn(|_: &Pong| Ok::<_, BoxError>(2)))
            .build()
            .unwrap();

        let handler = registry.create_handler(message_type_name::<Pong>()).unwrap();
        let result = handler.handle_dyn(MessageRef::new(&Pong)).unwrap();
        assert_eq!(result.downcast_ref::<u8>(), Some(&2));
    }

    #[test]
    fn test_insert_reports_duplicate_immediately() {
        let mut builder = HandlerRegistryBuilder::new();
        builder
            .insert::<Ping, _, _>(|| handler_fn(|_: &Ping| Ok::<_, BoxError>("a")))
            .unwrap();
        let err = builder
            .insert::<Ping, _, _>(|| handler_fn(|_: &Ping| Ok::<_, BoxError>("b")))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate handler"));
    }
}
