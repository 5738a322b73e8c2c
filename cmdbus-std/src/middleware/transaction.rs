//! Transaction demarcation around the handler.

use cmdbus_core::{
    BoxError, ContextContainer, Injectable, Injected, InjectionError, InjectionPoints, MessageRef,
    Middleware, ResultSlot,
};
use thiserror::Error;

/// Starts and finishes transactions for [`TransactionMiddleware`].
pub trait TransactionManager: Send + Sync + 'static {
    /// The transaction handle bound into the dispatch context.
    type Transaction: Send + Sync + 'static;

    /// Begin a transaction.
    fn begin(&self) -> Result<Self::Transaction, BoxError>;

    /// Commit a transaction whose dispatch succeeded.
    fn commit(&self, transaction: &Self::Transaction) -> Result<(), BoxError>;

    /// Roll back a transaction whose dispatch failed.
    fn rollback(&self, transaction: &Self::Transaction) -> Result<(), BoxError>;
}

/// Errors written to the slot by [`TransactionMiddleware`].
#[derive(Error, Debug)]
pub enum TransactionError {
    /// The transaction could not be started; the handler did not run.
    #[error("failed to begin transaction")]
    Begin(#[source] BoxError),

    /// The handler succeeded but the transaction could not be committed.
    #[error("failed to commit transaction")]
    Commit(#[source] BoxError),
}

/// A middleware that wraps the rest of the pipeline in a transaction.
///
/// The transaction is bound into the dispatch context as
/// `M::Transaction`, so the handler can inject it. It is committed when the
/// slot holds no error during post-handle and rolled back otherwise.
pub struct TransactionMiddleware<M: TransactionManager> {
    manager: M,
    container: Injected<ContextContainer>,
}

impl<M: TransactionManager> TransactionMiddleware<M> {
    /// Create a middleware around `manager`.
    pub fn new(manager: M) -> Self {
        Self {
            manager,
            container: Injected::new(),
        }
    }

    /// Borrow the transaction manager.
    pub fn manager(&self) -> &M {
        &self.manager
    }
}

impl<M: TransactionManager> Injectable for TransactionMiddleware<M> {
    fn injection_points<'a>(
        &'a self,
        points: &mut InjectionPoints<'a>,
    ) -> Result<(), InjectionError> {
        points.container(&self.container);
        Ok(())
    }
}

impl<M: TransactionManager> Middleware for TransactionMiddleware<M> {
    fn pre_handle(&self, _message: MessageRef<'_>, slot: &mut ResultSlot) -> Result<(), BoxError> {
        let container = self.container.get().ok_or("dispatch context not injected")?;
        match self.manager.begin() {
            Ok(transaction) => container.bind(transaction),
            Err(err) => slot.set_error(TransactionError::Begin(err)),
        }
        Ok(())
    }

    fn post_handle(&self, _message: MessageRef<'_>, slot: &mut ResultSlot) -> Result<(), BoxError> {
        let Some(transaction) = self
            .container
            .get()
            .and_then(|container| container.get::<M::Transaction>())
        else {
            return Ok(());
        };

        if slot.has_error() {
            #[cfg(feature = "tracing")]
            tracing::debug!("rolling back transaction");
            return self.manager.rollback(&transaction);
        }

        if let Err(err) = self.manager.commit(&transaction) {
            slot.set_error(TransactionError::Commit(err));
            self.manager.rollback(&transaction)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageBus;
    use crate::factory::HandlerRegistry;
    use cmdbus_core::{BusError, Handler, Message, handler_fn};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct Tx(u32);

    #[derive(Default)]
    struct FakeManager {
        next: AtomicU32,
        fail_begin: AtomicBool,
        fail_commit: AtomicBool,
        events: Mutex<Vec<String>>,
    }

    impl TransactionManager for Arc<FakeManager> {
        type Transaction = Tx;

        fn begin(&self) -> Result<Tx, BoxError> {
            if self.fail_begin.load(Ordering::SeqCst) {
                return Err("pool exhausted".into());
            }
            let id = self.next.fetch_add(1, Ordering::SeqCst);
            self.events.lock().unwrap().push(format!("begin {id}"));
            Ok(Tx(id))
        }

        fn commit(&self, tx: &Tx) -> Result<(), BoxError> {
            if self.fail_commit.load(Ordering::SeqCst) {
                return Err("serialization failure".into());
            }
            self.events.lock().unwrap().push(format!("commit {}", tx.0));
            Ok(())
        }

        fn rollback(&self, tx: &Tx) -> Result<(), BoxError> {
            self.events.lock().unwrap().push(format!("rollback {}", tx.0));
            Ok(())
        }
    }

    struct Save {
        fail: bool,
    }

    impl Message for Save {
        type Result = u32;
    }

    #[derive(Default)]
    struct SaveHandler {
        tx: Injected<Tx>,
    }

    impl Injectable for SaveHandler {
        fn injection_points<'a>(
            &'a self,
            points: &mut InjectionPoints<'a>,
        ) -> Result<(), InjectionError> {
            points.context(&self.tx);
            Ok(())
        }
    }

    impl Handler<Save> for SaveHandler {
        fn handle(&self, message: &Save) -> Result<u32, BoxError> {
            let tx = self.tx.get().ok_or("no transaction")?;
            if message.fail {
                return Err("constraint violated".into());
            }
            Ok(tx.0)
        }
    }

    fn setup() -> (Arc<FakeManager>, MessageBus) {
        let manager = Arc::new(FakeManager::default());
        let registry = HandlerRegistry::builder()
            .handler::<Save, _, _>(SaveHandler::default)
            .build()
            .unwrap();
        let bus = MessageBus::builder(registry)
            .middleware(TransactionMiddleware::new(manager.clone()))
            .build();
        (manager, bus)
    }

    #[test]
    fn test_commits_on_success() {
        let (manager, bus) = setup();
        assert_eq!(bus.dispatch(&Save { fail: false }).unwrap(), Some(0));
        assert_eq!(*manager.events.lock().unwrap(), ["begin 0", "commit 0"]);
    }

    #[test]
    fn test_rolls_back_on_handler_error() {
        let (manager, bus) = setup();
        assert!(matches!(
            bus.dispatch(&Save { fail: true }),
            Err(BusError::Handler(_))
        ));
        assert_eq!(*manager.events.lock().unwrap(), ["begin 0", "rollback 0"]);
    }

    #[test]
    fn test_rolls_back_on_handler_panic() {
        struct Crash;
        impl Message for Crash {
            type Result = u32;
        }

        let manager = Arc::new(FakeManager::default());
        let registry = HandlerRegistry::builder()
            .handler::<Crash, _, _>(|| {
                handler_fn(|_: &Crash| -> Result<u32, BoxError> { panic!("driver fault") })
            })
            .build()
            .unwrap();
        let bus = MessageBus::builder(registry)
            .middleware(TransactionMiddleware::new(manager.clone()))
            .build();

        assert!(matches!(bus.dispatch(&Crash), Err(BusError::Handler(_))));
        assert_eq!(*manager.events.lock().unwrap(), ["begin 0", "rollback 0"]);
    }

    #[test]
    fn test_begin_failure_short_circuits() {
        let (manager, bus) = setup();
        manager.fail_begin.store(true, Ordering::SeqCst);

        match bus.dispatch(&Save { fail: false }) {
            Err(BusError::Rejected { source, .. }) => {
                assert!(matches!(
                    source.downcast_ref::<TransactionError>(),
                    Some(TransactionError::Begin(_))
                ));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(manager.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_commit_failure_replaces_result() {
        let (manager, bus) = setup();
        manager.fail_commit.store(true, Ordering::SeqCst);

        assert!(matches!(
            bus.dispatch(&Save { fail: false }),
            Err(BusError::Middleware { .. })
        ));
        assert_eq!(*manager.events.lock().unwrap(), ["begin 0", "rollback 0"]);
    }
}
