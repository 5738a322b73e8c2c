//! Error types for cmdbus.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`BusError`] - The failure outcome of a dispatch
//! - [`InjectionError`] - A target could not enumerate its injection points
//! - [`HandlerPanic`] - A handler panicked during a dispatch

use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The failure outcome of a dispatch.
#[derive(Error, Debug)]
pub enum BusError {
    /// The handler factory did not resolve a handler. No middleware ran.
    #[error("no handler found for message type `{message_type}`")]
    NoHandlerFound {
        /// Type name the factory was asked for.
        message_type: String,
    },

    /// The handler failed and no middleware recovered the error.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    /// A middleware wrote an error during pre-handle, short-circuiting the pipeline.
    #[error("rejected by middleware `{middleware}`: {source}")]
    Rejected {
        /// Name of the middleware that rejected the message.
        middleware: &'static str,
        /// The error written into the slot.
        #[source]
        source: BoxError,
    },

    /// A middleware wrote an error during post-handle.
    #[error("middleware `{middleware}` failed the dispatch: {source}")]
    Middleware {
        /// Name of the middleware that wrote the error.
        middleware: &'static str,
        /// The error written into the slot.
        #[source]
        source: BoxError,
    },

    /// A target could not enumerate its injection points.
    #[error("dependency injection failed: {0}")]
    Injection(#[from] InjectionError),

    /// The slot held a value that is not the message's result type.
    #[error("dispatch result is not a `{expected}`")]
    ResultTypeMismatch {
        /// The result type the message declares.
        expected: &'static str,
    },
}

impl BusError {
    /// The error a handler or middleware wrote into the slot, if any.
    pub fn slot_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            BusError::Handler(source)
            | BusError::Rejected { source, .. }
            | BusError::Middleware { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }

    /// Consume the error, returning what a handler or middleware wrote into the slot.
    pub fn into_slot_error(self) -> Option<BoxError> {
        match self {
            BusError::Handler(source)
            | BusError::Rejected { source, .. }
            | BusError::Middleware { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns `true` if the factory resolved no handler.
    pub fn is_no_handler_found(&self) -> bool {
        matches!(self, BusError::NoHandlerFound { .. })
    }
}

/// A target's injection points could not be enumerated.
///
/// This is a configuration error: it is never produced for context that
/// simply has not been bound yet.
#[derive(Error, Debug)]
#[error("`{target}` could not enumerate its injection points: {source}")]
pub struct InjectionError {
    target: &'static str,
    #[source]
    source: BoxError,
}

impl InjectionError {
    /// Create an injection error for `target`.
    pub fn new(target: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            target,
            source: source.into(),
        }
    }

    /// Name of the target whose enumeration failed.
    pub fn target(&self) -> &'static str {
        self.target
    }
}

/// A handler panicked.
///
/// The bus stores this in the slot as the handler's error, so it surfaces as
/// [`BusError::Handler`] unless a post-handle stage recovers it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("handler panicked: {message}")]
pub struct HandlerPanic {
    message: String,
}

impl HandlerPanic {
    /// Create a panic error from the panic payload's message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The panic message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error, PartialEq)]
    #[error("denied")]
    struct Denied;

    #[test]
    fn test_slot_error_downcast() {
        let err = BusError::Rejected {
            middleware: "auth",
            source: Box::new(Denied),
        };
        assert_eq!(err.slot_error().and_then(|e| e.downcast_ref::<Denied>()), Some(&Denied));
        assert_eq!(err.to_string(), "rejected by middleware `auth`: denied");
    }

    #[test]
    fn test_no_handler_has_no_slot_error() {
        let err = BusError::NoHandlerFound {
            message_type: "app::Missing".into(),
        };
        assert!(err.is_no_handler_found());
        assert!(err.slot_error().is_none());
        assert!(err.into_slot_error().is_none());
    }

    #[test]
    fn test_injection_error_converts() {
        let err: BusError = InjectionError::new("app::Broken", "bad table").into();
        match err {
            BusError::Injection(inner) => assert_eq!(inner.target(), "app::Broken"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
