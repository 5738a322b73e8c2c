//! Integration tests for handler factories.

mod common;

use cmdbus::{
    BoxError, DynHandler, HandlerRegistry, MessageBus, RegistryError, boxed, handler_fn,
    message_type_name,
};
use common::{Greet, Unrouted};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn test_duplicate_registration_fails_build() {
    let result = HandlerRegistry::builder()
        .handler::<Greet, _, _>(|| handler_fn(|_: &Greet| Ok::<_, BoxError>("a".to_string())))
        .handler::<Greet, _, _>(|| handler_fn(|_: &Greet| Ok::<_, BoxError>("b".to_string())))
        .build();

    assert!(matches!(result, Err(RegistryError::DuplicateHandler(_))));
}

#[test]
fn test_fresh_handler_per_dispatch() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let registry = HandlerRegistry::builder()
        .handler::<Greet, _, _>(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            handler_fn(|m: &Greet| Ok::<_, BoxError>(m.name.clone()))
        })
        .build()
        .unwrap();
    let bus = MessageBus::builder(registry).build();

    bus.dispatch(&Greet::new("a")).unwrap();
    bus.dispatch(&Greet::new("b")).unwrap();
    assert!(bus.dispatch(&Unrouted).is_err());

    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[test]
fn test_closure_factory() {
    let factory = |message_type: &str| -> Option<Box<dyn DynHandler>> {
        (message_type == message_type_name::<Greet>()).then(|| {
            boxed::<Greet, _>(handler_fn(|m: &Greet| Ok::<_, BoxError>(m.name.repeat(2))))
        })
    };
    let bus = MessageBus::builder(factory).build();

    assert_eq!(
        bus.dispatch(&Greet::new("ab")).unwrap().as_deref(),
        Some("abab")
    );
    assert!(bus.dispatch(&Unrouted).unwrap_err().is_no_handler_found());
}

#[test]
fn test_factory_keyed_by_concrete_type() {
    mod other {
        use cmdbus::Message;

        pub struct Greet;
        impl Message for Greet {
            type Result = String;
        }
    }

    let bus = MessageBus::builder(common::greet_registry()).build();
    assert!(bus.dispatch(&other::Greet).unwrap_err().is_no_handler_found());
    assert_ne!(
        message_type_name::<other::Greet>(),
        message_type_name::<Greet>()
    );
}
