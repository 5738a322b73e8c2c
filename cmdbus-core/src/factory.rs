//! Handler factory contract.

use crate::handler::DynHandler;

/// Resolves the handler responsible for a message type.
///
/// The key is the message's concrete type name as returned by
/// [`message_type_name`](crate::message_type_name). A factory must answer
/// deterministically for a given type; `None` is a normal outcome that the
/// bus turns into [`BusError::NoHandlerFound`](crate::BusError::NoHandlerFound).
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a HandlerFactory",
    label = "missing `HandlerFactory` implementation",
    note = "Implement `create_handler`, or pass a closure `Fn(&str) -> Option<Box<dyn DynHandler>>`."
)]
pub trait HandlerFactory: Send + Sync + 'static {
    /// Create a handler for `message_type`, or `None` if none is registered.
    fn create_handler(&self, message_type: &str) -> Option<Box<dyn DynHandler>>;
}

impl<F> HandlerFactory for F
where
    F: Fn(&str) -> Option<Box<dyn DynHandler>> + Send + Sync + 'static,
{
    fn create_handler(&self, message_type: &str) -> Option<Box<dyn DynHandler>> {
        (self)(message_type)
    }
}
