//! Testing utilities for cmdbus.
//!
//! This module provides utilities to make testing middleware pipelines and
//! handlers easier.
//!
//! # Features
//!
//! - [`CallLog`]: A shared, ordered log of pipeline stages
//! - [`RecordingMiddleware`]: A middleware that records its hooks and can be
//!   scripted to write the slot, fail or panic
//! - [`CountingHandler`]: A handler that counts invocations

use cmdbus_core::{
    BoxError, Handler, Injectable, Message, MessageRef, Middleware, ResultSlot,
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

// ============================================================================
// Call Log
// ============================================================================

/// A shared, ordered log of pipeline events.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    /// Get a copy of every entry, in order.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns `true` if nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

// ============================================================================
// Recording Middleware
// ============================================================================

type SlotAction = Arc<dyn Fn(&mut ResultSlot) + Send + Sync>;

#[derive(Clone)]
enum Misbehavior {
    Fail(String),
    Panic(String),
}

#[derive(Clone, Default)]
struct HookScript {
    action: Option<SlotAction>,
    misbehavior: Option<Misbehavior>,
}

impl HookScript {
    fn run(&self, slot: &mut ResultSlot) -> Result<(), BoxError> {
        if let Some(action) = &self.action {
            action(slot);
        }
        match &self.misbehavior {
            Some(Misbehavior::Fail(msg)) => Err(msg.clone().into()),
            Some(Misbehavior::Panic(msg)) => panic!("{msg}"),
            None => Ok(()),
        }
    }
}

/// A middleware that records each hook invocation in a [`CallLog`].
///
/// Entries are `pre:<id>` and `post:<id>`, written before any scripted
/// behavior runs. The middleware reports `id` as its name.
///
/// # Example
///
/// ```rust,ignore
/// let log = CallLog::new();
/// let bus = MessageBus::builder(registry)
///     .middleware(RecordingMiddleware::new("auth", log.clone())
///         .on_pre(|slot| slot.set_error("denied")))
///     .build();
///
/// bus.dispatch(&cmd).unwrap_err();
/// assert_eq!(log.entries(), ["pre:auth", "post:auth"]);
/// ```
#[derive(Clone)]
pub struct RecordingMiddleware {
    id: &'static str,
    log: CallLog,
    pre: HookScript,
    post: HookScript,
}

impl RecordingMiddleware {
    /// Create a recording middleware that leaves the slot untouched.
    pub fn new(id: &'static str, log: CallLog) -> Self {
        Self {
            id,
            log,
            pre: HookScript::default(),
            post: HookScript::default(),
        }
    }

    /// Run `action` on the slot during pre-handle.
    pub fn on_pre<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut ResultSlot) + Send + Sync + 'static,
    {
        self.pre.action = Some(Arc::new(action));
        self
    }

    /// Run `action` on the slot during post-handle.
    pub fn on_post<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut ResultSlot) + Send + Sync + 'static,
    {
        self.post.action = Some(Arc::new(action));
        self
    }

    /// Return an error from pre-handle.
    pub fn fail_pre(mut self, msg: impl Into<String>) -> Self {
        self.pre.misbehavior = Some(Misbehavior::Fail(msg.into()));
        self
    }

    /// Return an error from post-handle.
    pub fn fail_post(mut self, msg: impl Into<String>) -> Self {
        self.post.misbehavior = Some(Misbehavior::Fail(msg.into()));
        self
    }

    /// Panic in pre-handle.
    pub fn panic_pre(mut self, msg: impl Into<String>) -> Self {
        self.pre.misbehavior = Some(Misbehavior::Panic(msg.into()));
        self
    }

    /// Panic in post-handle.
    pub fn panic_post(mut self, msg: impl Into<String>) -> Self {
        self.post.misbehavior = Some(Misbehavior::Panic(msg.into()));
        self
    }
}

impl Injectable for RecordingMiddleware {
    fn target_name(&self) -> &'static str {
        self.id
    }
}

impl Middleware for RecordingMiddleware {
    fn pre_handle(&self, _message: MessageRef<'_>, slot: &mut ResultSlot) -> Result<(), BoxError> {
        self.log.push(format!("pre:{}", self.id));
        self.pre.run(slot)
    }

    fn post_handle(&self, _message: MessageRef<'_>, slot: &mut ResultSlot) -> Result<(), BoxError> {
        self.log.push(format!("post:{}", self.id));
        self.post.run(slot)
    }

    fn name(&self) -> &'static str {
        self.id
    }
}

// ============================================================================
// Counting Handler
// ============================================================================

/// A handler that counts invocations and returns a fixed result.
///
/// Clones share the same counter, so a registry constructor can hand out
/// clones while the test keeps one to inspect.
///
/// # Example
///
/// ```rust,ignore
/// let counter = CountingHandler::new(UserId(1));
/// let registry = HandlerRegistry::builder()
///     .handler::<CreateUser, _, _>({
///         let counter = counter.clone();
///         move || counter.clone()
///     })
///     .build()?;
///
/// // Dispatch...
///
/// assert_eq!(counter.count(), 1);
/// ```
#[derive(Clone)]
pub struct CountingHandler<R> {
    result: R,
    count: Arc<AtomicUsize>,
}

impl<R> CountingHandler<R> {
    /// Create a counting handler returning `result`.
    pub fn new(result: R) -> Self {
        Self {
            result,
            count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the current count.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Reset the counter.
    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}

impl<R> Injectable for CountingHandler<R> {}

impl<M, R> Handler<M> for CountingHandler<R>
where
    M: Message<Result = R>,
    R: Clone + Send + Sync + 'static,
{
    fn handle(&self, _message: &M) -> Result<R, BoxError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}
