//! Message trait for dispatchable payloads.

use std::any::Any;
use std::fmt;

/// A marker trait for commands and queries submitted to the bus.
///
/// Every message names the type its handler produces through
/// [`Message::Result`]. Messages are borrowed immutably by the pipeline and
/// must be `Send + Sync + 'static` so a single bus can be shared between
/// threads.
///
/// # Example
///
/// ```rust,ignore
/// struct CreateUser { name: String }
///
/// impl Message for CreateUser {
///     type Result = UserId;
/// }
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a valid Message",
    label = "must implement `Message` and be `Send + Sync + 'static`",
    note = "Messages declare the type their handler returns through `type Result`."
)]
pub trait Message: Send + Sync + 'static {
    /// The value a successful dispatch of this message produces.
    type Result: Send + 'static;
}

/// Returns the key used to resolve the handler for `M`.
pub fn message_type_name<M: Message>() -> &'static str {
    std::any::type_name::<M>()
}

/// A type-erased view of the message being dispatched.
///
/// Middleware is configured once for every message type, so it sees the
/// message through this view and downcasts when it cares about a concrete
/// type.
#[derive(Clone, Copy)]
pub struct MessageRef<'a> {
    inner: &'a (dyn Any + Send + Sync),
    type_name: &'static str,
}

impl<'a> MessageRef<'a> {
    /// Wrap a concrete message.
    pub fn new<M: Message>(message: &'a M) -> Self {
        Self {
            inner: message,
            type_name: message_type_name::<M>(),
        }
    }

    /// The concrete type name of the wrapped message.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the wrapped message is an `M`.
    pub fn is<M: Message>(&self) -> bool {
        self.inner.is::<M>()
    }

    /// Borrow the wrapped message as `M`, if it is one.
    pub fn downcast_ref<M: Message>(&self) -> Option<&'a M> {
        self.inner.downcast_ref::<M>()
    }
}

impl fmt::Debug for MessageRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRef")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;
    impl Message for Ping {
        type Result = &'static str;
    }

    struct Other;
    impl Message for Other {
        type Result = ();
    }

    #[test]
    fn test_message_ref_downcast() {
        let ping = Ping;
        let message = MessageRef::new(&ping);

        assert!(message.is::<Ping>());
        assert!(!message.is::<Other>());
        assert!(message.downcast_ref::<Ping>().is_some());
        assert!(message.downcast_ref::<Other>().is_none());
    }

    #[test]
    fn test_type_name_matches_key() {
        let ping = Ping;
        let message = MessageRef::new(&ping);
        assert_eq!(message.type_name(), message_type_name::<Ping>());
        assert!(message.type_name().ends_with("Ping"));
    }
}
