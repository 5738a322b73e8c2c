//! # Dispatch Context
//!
//! Middleware publishes typed context objects (a transaction, the current
//! user, a clock) into a [`ContextContainer`] during pre-handle. Later
//! middleware and the handler receive those objects through [`Injected`]
//! cells without knowing who produced them.
//!
//! One container exists per dispatch. Entries are keyed by type, added in
//! pipeline order and never removed, and every value is shared as an
//! `Arc<T>` so it stays immutable once bound.

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Identity of a context type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl ContextKey {
    /// The key for context type `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` of the context type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The type name of the context type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

type Entry = Arc<dyn Any + Send + Sync>;

/// Per-dispatch mapping from context type to context value.
///
/// Shared between the bus, every middleware and the handler through an
/// `Arc<ContextContainer>`; binding goes through an internal lock so
/// middleware can bind from `&self`.
#[derive(Default)]
pub struct ContextContainer {
    entries: RwLock<HashMap<TypeId, (ContextKey, Entry)>>,
}

impl ContextContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` as the context for its type, replacing any previous value.
    pub fn bind<T: Send + Sync + 'static>(&self, value: T) {
        self.bind_arc(Arc::new(value));
    }

    /// Bind an already shared value.
    pub fn bind_arc<T: Send + Sync + 'static>(&self, value: Arc<T>) {
        let key = ContextKey::of::<T>();
        let value: Entry = value;
        self.entries.write().insert(key.type_id, (key, value));
    }

    /// Look up the context bound for `T`.
    ///
    /// Absence is a normal outcome: the middleware that binds `T` may not
    /// have run yet.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let entry = self.entries.read().get(&TypeId::of::<T>())?.1.clone();
        entry.downcast::<T>().ok()
    }

    /// Returns `true` if a value is bound for `T`.
    pub fn contains<T: 'static>(&self) -> bool {
        self.contains_key(&ContextKey::of::<T>())
    }

    /// Returns `true` if a value is bound for `key`.
    pub fn contains_key(&self, key: &ContextKey) -> bool {
        self.entries.read().contains_key(&key.type_id)
    }

    /// The keys currently bound.
    pub fn keys(&self) -> Vec<ContextKey> {
        self.entries.read().values().map(|(key, _)| *key).collect()
    }

    /// Number of bound context values.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for ContextContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

/// A field that receives a value from the dispatch context.
///
/// Injected cells start unset. The injector fills them before the owning
/// middleware or handler runs a stage; a cell whose context has not been
/// bound yet stays unset.
///
/// A dispatch runs start to finish on the calling thread, so values are kept
/// per thread: one middleware instance shared by dispatches running on
/// different threads sees the context of its own dispatch.
pub struct Injected<T: ?Sized> {
    values: RwLock<HashMap<ThreadId, Arc<T>>>,
}

impl<T: ?Sized> Injected<T> {
    /// Create an unset cell.
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    /// The value injected for the current dispatch, if any.
    pub fn get(&self) -> Option<Arc<T>> {
        self.values.read().get(&thread::current().id()).cloned()
    }

    /// Returns `true` if a value has been injected for the current dispatch.
    pub fn is_set(&self) -> bool {
        self.values.read().contains_key(&thread::current().id())
    }

    pub(crate) fn set(&self, value: Option<Arc<T>>) {
        let id = thread::current().id();
        let mut values = self.values.write();
        match value {
            Some(value) => {
                values.insert(id, value);
            }
            None => {
                values.remove(&id);
            }
        }
    }
}

impl<T: ?Sized> Default for Injected<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Injected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injected")
            .field("type", &std::any::type_name::<T>())
            .field("set", &self.is_set())
            .finish()
    }
}

/// A tuple of context types consumed together by a setup operation.
pub trait ContextArgs: 'static {
    /// The resolved values, one `Arc` per context type.
    type Values;

    /// The keys of every context type in the tuple.
    fn keys() -> Vec<ContextKey>;

    /// Resolve every value, or `None` if any is still unbound.
    fn resolve(container: &ContextContainer) -> Option<Self::Values>;
}

/// Macro to implement ContextArgs for tuples of context types.
macro_rules! impl_context_args_tuple {
    ($($T:ident),+) => {
        impl<$($T,)+> ContextArgs for ($($T,)+)
        where
            $($T: Send + Sync + 'static,)+
        {
            type Values = ($(Arc<$T>,)+);

            fn keys() -> Vec<ContextKey> {
                vec![$(ContextKey::of::<$T>(),)+]
            }

            #[allow(non_snake_case)]
            fn resolve(container: &ContextContainer) -> Option<Self::Values> {
                $(
                    let $T = container.get::<$T>()?;
                )+
                Some(($($T,)+))
            }
        }
    };
}

impl_context_args_tuple!(T1);
impl_context_args_tuple!(T1, T2);
impl_context_args_tuple!(T1, T2, T3);
impl_context_args_tuple!(T1, T2, T3, T4);
impl_context_args_tuple!(T1, T2, T3, T4, T5);
impl_context_args_tuple!(T1, T2, T3, T4, T5, T6);
impl_context_args_tuple!(T1, T2, T3, T4, T5, T6, T7);
impl_context_args_tuple!(T1, T2, T3, T4, T5, T6, T7, T8);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Tenant(&'static str);

    #[derive(Debug, PartialEq)]
    struct RequestId(u64);

    #[test]
    fn test_bind_and_get() {
        let container = ContextContainer::new();
        assert!(container.get::<Tenant>().is_none());

        container.bind(Tenant("acme"));
        assert_eq!(container.get::<Tenant>().as_deref(), Some(&Tenant("acme")));
        assert!(container.contains::<Tenant>());
        assert!(!container.contains::<RequestId>());
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_bind_replaces() {
        let container = ContextContainer::new();
        container.bind(RequestId(1));
        container.bind(RequestId(2));
        assert_eq!(container.get::<RequestId>().as_deref(), Some(&RequestId(2)));
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_bind_arc_shares_instance() {
        let container = ContextContainer::new();
        let tenant = Arc::new(Tenant("shared"));
        container.bind_arc(tenant.clone());

        let fetched = container.get::<Tenant>().unwrap();
        assert!(Arc::ptr_eq(&tenant, &fetched));
    }

    #[test]
    fn test_context_args_resolve_requires_all() {
        let container = ContextContainer::new();
        container.bind(Tenant("acme"));
        assert!(<(Tenant, RequestId)>::resolve(&container).is_none());

        container.bind(RequestId(7));
        let (tenant, id) = <(Tenant, RequestId)>::resolve(&container).unwrap();
        assert_eq!(*tenant, Tenant("acme"));
        assert_eq!(*id, RequestId(7));
        assert_eq!(
            <(Tenant, RequestId)>::keys(),
            vec![ContextKey::of::<Tenant>(), ContextKey::of::<RequestId>()]
        );
    }

    #[test]
    fn test_injected_starts_unset() {
        let cell: Injected<Tenant> = Injected::default();
        assert!(!cell.is_set());
        cell.set(Some(Arc::new(Tenant("x"))));
        assert_eq!(cell.get().as_deref(), Some(&Tenant("x")));

        cell.set(None);
        assert!(!cell.is_set());
    }

    #[test]
    fn test_injected_is_per_thread() {
        let cell: Arc<Injected<Tenant>> = Arc::new(Injected::new());
        cell.set(Some(Arc::new(Tenant("main"))));

        let other = cell.clone();
        std::thread::spawn(move || {
            assert!(!other.is_set());
            other.set(Some(Arc::new(Tenant("worker"))));
            assert_eq!(other.get().as_deref(), Some(&Tenant("worker")));
        })
        .join()
        .unwrap();

        assert_eq!(cell.get().as_deref(), Some(&Tenant("main")));
    }
}
