#![allow(dead_code)]

use cmdbus::testing::{CallLog, RecordingMiddleware};
use cmdbus::{BoxError, HandlerRegistry, MessageBus, MessageBusBuilder, Message, handler_fn};

// ============================================================================
// Test Message Types
// ============================================================================

#[derive(Clone, Debug)]
pub struct Greet {
    pub name: String,
}

impl Greet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Message for Greet {
    type Result = String;
}

#[derive(Clone, Debug)]
pub struct Unrouted;

impl Message for Unrouted {
    type Result = ();
}

// ============================================================================
// Bus Helpers
// ============================================================================

pub fn greet_registry() -> HandlerRegistry {
    HandlerRegistry::builder()
        .handler::<Greet, _, _>(|| {
            handler_fn(|m: &Greet| Ok::<_, BoxError>(format!("hello {}", m.name)))
        })
        .build()
        .unwrap()
}

pub fn failing_registry(msg: &'static str) -> HandlerRegistry {
    HandlerRegistry::builder()
        .handler::<Greet, _, _>(move || handler_fn(move |_: &Greet| Err::<String, BoxError>(msg.into())))
        .build()
        .unwrap()
}

pub fn panicking_registry(msg: &'static str) -> HandlerRegistry {
    HandlerRegistry::builder()
        .handler::<Greet, _, _>(move || {
            handler_fn(move |_: &Greet| -> Result<String, BoxError> { panic!("{msg}") })
        })
        .build()
        .unwrap()
}

/// Adds one `RecordingMiddleware` per id, in order.
pub fn with_recorders(
    builder: MessageBusBuilder,
    log: &CallLog,
    ids: &[&'static str],
) -> MessageBusBuilder {
    ids.iter().fold(builder, |builder, &id| {
        builder.middleware(RecordingMiddleware::new(id, log.clone()))
    })
}

pub fn recording_bus(log: &CallLog, ids: &[&'static str]) -> MessageBus {
    with_recorders(MessageBus::builder(greet_registry()), log, ids).build()
}
