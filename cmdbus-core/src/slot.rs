//! # Result Slot
//!
//! The single carrier every stage of a dispatch reads and writes. A slot is
//! in exactly one of three states: empty, holding a result, or holding an
//! error. The last write wins, which is what lets middleware short-circuit
//! the pipeline during pre-handle, replace the handler's result during
//! post-handle, or recover from a failure by clearing the error.
//!
//! Results are stored type-erased because middleware is shared across every
//! message type; the bus downcasts to the message's declared result type when
//! the dispatch resolves.

use crate::error::{BoxError, BusError};
use std::any::Any;
use std::fmt;

/// The pipeline stage currently writing to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Pre-handle of the named middleware.
    PreHandle(&'static str),
    /// The handler invocation.
    Handler,
    /// Post-handle of the named middleware.
    PostHandle(&'static str),
}

/// The content of a [`ResultSlot`].
pub enum SlotState {
    /// Nothing has been written, or an error was cleared.
    Empty,
    /// A success value.
    Result(Box<dyn Any + Send>),
    /// An error, tagged with the stage that wrote it.
    Error {
        /// The error itself.
        error: BoxError,
        /// The stage that wrote it.
        stage: Stage,
    },
}

/// A single-use carrier for the outcome of a dispatch.
pub struct ResultSlot {
    state: SlotState,
    stage: Stage,
}

impl Default for ResultSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self {
            state: SlotState::Empty,
            stage: Stage::Handler,
        }
    }

    /// Mark the stage that subsequent writes belong to.
    ///
    /// Bus implementations call this before handing the slot to a stage.
    pub fn enter(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// The stage currently holding the slot.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Store a result, clearing any error.
    pub fn set_result<T: Send + 'static>(&mut self, value: T) {
        self.state = SlotState::Result(Box::new(value));
    }

    /// Store an already boxed result, clearing any error.
    pub fn set_boxed_result(&mut self, value: Box<dyn Any + Send>) {
        self.state = SlotState::Result(value);
    }

    /// Store an error, clearing any result.
    pub fn set_error(&mut self, error: impl Into<BoxError>) {
        self.state = SlotState::Error {
            error: error.into(),
            stage: self.stage,
        };
    }

    /// Remove a stored error, leaving the slot empty.
    ///
    /// A stored result is left untouched.
    pub fn clear_error(&mut self) -> Option<BoxError> {
        match std::mem::replace(&mut self.state, SlotState::Empty) {
            SlotState::Error { error, .. } => Some(error),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Remove whatever the slot holds.
    pub fn clear(&mut self) {
        self.state = SlotState::Empty;
    }

    /// Returns `true` if the slot holds a result.
    pub fn has_result(&self) -> bool {
        matches!(self.state, SlotState::Result(_))
    }

    /// Returns `true` if the slot holds an error.
    pub fn has_error(&self) -> bool {
        matches!(self.state, SlotState::Error { .. })
    }

    /// Returns `true` if the slot holds neither a result nor an error.
    pub fn is_empty(&self) -> bool {
        matches!(self.state, SlotState::Empty)
    }

    /// Borrow the stored result as `T`.
    ///
    /// Returns `None` if the slot holds no result or a result of another type.
    pub fn result<T: 'static>(&self) -> Option<&T> {
        match &self.state {
            SlotState::Result(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Borrow the stored error.
    pub fn error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match &self.state {
            SlotState::Error { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }

    /// The stage that wrote the stored error.
    pub fn error_stage(&self) -> Option<Stage> {
        match &self.state {
            SlotState::Error { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Borrow the raw state.
    pub fn state(&self) -> &SlotState {
        &self.state
    }

    /// Resolve the slot into the outcome of a dispatch producing `R`.
    ///
    /// An empty slot resolves to `Ok(None)`.
    pub fn resolve<R: 'static>(self) -> Result<Option<R>, BusError> {
        match self.state {
            SlotState::Empty => Ok(None),
            SlotState::Result(value) => match value.downcast::<R>() {
                Ok(value) => Ok(Some(*value)),
                Err(_) => Err(BusError::ResultTypeMismatch {
                    expected: std::any::type_name::<R>(),
                }),
            },
            SlotState::Error { error, stage } => Err(match stage {
                Stage::PreHandle(middleware) => BusError::Rejected {
                    middleware,
                    source: error,
                },
                Stage::Handler => BusError::Handler(error),
                Stage::PostHandle(middleware) => BusError::Middleware {
                    middleware,
                    source: error,
                },
            }),
        }
    }
}

impl fmt::Debug for ResultSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            SlotState::Empty => "Empty",
            SlotState::Result(_) => "Result",
            SlotState::Error { .. } => "Error",
        };
        f.debug_struct("ResultSlot")
            .field("state", &state)
            .field("stage", &self.stage)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let slot = ResultSlot::new();
        assert!(slot.is_empty());
        assert!(!slot.has_result());
        assert!(!slot.has_error());
        assert!(matches!(slot.resolve::<u32>(), Ok(None)));
    }

    #[test]
    fn test_last_write_wins() {
        let mut slot = ResultSlot::new();
        slot.set_result(1u32);
        slot.set_error("boom");
        assert!(slot.has_error());
        assert!(!slot.has_result());

        slot.set_result(2u32);
        assert!(!slot.has_error());
        assert_eq!(slot.result::<u32>(), Some(&2));
    }

    #[test]
    fn test_clear_error_recovers() {
        let mut slot = ResultSlot::new();
        slot.set_error("boom");

        let cleared = slot.clear_error();
        assert_eq!(cleared.map(|e| e.to_string()), Some("boom".to_string()));
        assert!(slot.is_empty());
        assert!(matches!(slot.resolve::<u32>(), Ok(None)));
    }

    #[test]
    fn test_clear_error_keeps_result() {
        let mut slot = ResultSlot::new();
        slot.set_result("kept");
        assert!(slot.clear_error().is_none());
        assert_eq!(slot.result::<&str>(), Some(&"kept"));
    }

    #[test]
    fn test_error_tagged_with_stage() {
        let mut slot = ResultSlot::new();
        slot.enter(Stage::PreHandle("auth"));
        slot.set_error("denied");
        assert_eq!(slot.error_stage(), Some(Stage::PreHandle("auth")));

        match slot.resolve::<()>() {
            Err(BusError::Rejected { middleware, source }) => {
                assert_eq!(middleware, "auth");
                assert_eq!(source.to_string(), "denied");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_handler_and_post_handle_errors() {
        let mut slot = ResultSlot::new();
        slot.set_error("handler");
        assert!(matches!(slot.resolve::<()>(), Err(BusError::Handler(_))));

        let mut slot = ResultSlot::new();
        slot.enter(Stage::PostHandle("tx"));
        slot.set_error("commit");
        assert!(matches!(
            slot.resolve::<()>(),
            Err(BusError::Middleware { middleware: "tx", .. })
        ));
    }

    #[test]
    fn test_result_type_mismatch() {
        let mut slot = ResultSlot::new();
        slot.set_result("not a number");
        assert!(matches!(
            slot.resolve::<u64>(),
            Err(BusError::ResultTypeMismatch { expected: "u64" })
        ));
    }
}
