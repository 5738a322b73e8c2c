//! # Dependency Injection
//!
//! Middleware and handlers declare what they need from the dispatch context
//! by implementing [`Injectable`]. Each declaration is an [`InjectionPoint`]:
//!
//! - a **container** point receives the per-dispatch [`ContextContainer`]
//!   itself, so the owner can bind new context;
//! - a **context** point receives the current value for one context type;
//! - a **setup** point is an operation taking several context values, called
//!   once all of them are bound.
//!
//! The [`DependencyInjector`] resolves these points before every stage of the
//! owning target. Container points are set once per dispatch, before anything
//! else on the target runs. Context points are re-resolved on every stage, so
//! context bound by earlier middleware becomes visible to later middleware
//! without re-running anything. Setup points are re-attempted at every stage
//! boundary of their target until they fire, and then never again within the
//! same dispatch.
//!
//! Every container and context cell the injector fills is cleared again when
//! the injector is dropped, so nothing bound during a dispatch outlives it.
//!
//! # Example
//!
//! ```rust,ignore
//! struct Audit {
//!     container: Injected<ContextContainer>,
//!     user: Injected<CurrentUser>,
//! }
//!
//! impl Injectable for Audit {
//!     fn injection_points<'a>(
//!         &'a self,
//!         points: &mut InjectionPoints<'a>,
//!     ) -> Result<(), InjectionError> {
//!         points.container(&self.container).context(&self.user);
//!         Ok(())
//!     }
//! }
//! ```

use crate::context::{ContextArgs, ContextContainer, ContextKey, Injected};
use crate::error::InjectionError;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// An object that declares injection points.
///
/// The default implementation declares none, which suits middleware and
/// handlers that never touch the dispatch context.
pub trait Injectable {
    /// Register this object's injection points, in dependency order.
    ///
    /// Must return the same points every time it is called on the same
    /// object. Returning an error is a configuration failure and aborts the
    /// dispatch.
    fn injection_points<'a>(
        &'a self,
        points: &mut InjectionPoints<'a>,
    ) -> Result<(), InjectionError> {
        let _ = points;
        Ok(())
    }

    /// A human-readable name for diagnostics.
    fn target_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// What an injection point asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointKind {
    /// The dispatch's context container.
    Container,
    /// The current value of one context type.
    Context(ContextKey),
    /// A setup operation over several context types.
    Setup(Vec<ContextKey>),
}

type Apply<'a> = Box<dyn Fn(&Arc<ContextContainer>) -> bool + 'a>;
type Release<'a> = Box<dyn Fn() + 'a>;

/// A single declared dependency of a middleware or handler.
pub struct InjectionPoint<'a> {
    kind: PointKind,
    apply: Apply<'a>,
    release: Option<Release<'a>>,
}

impl InjectionPoint<'_> {
    /// What this point asks for.
    pub fn kind(&self) -> &PointKind {
        &self.kind
    }
}

impl fmt::Debug for InjectionPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InjectionPoint").field(&self.kind).finish()
    }
}

/// The ordered injection points of one target.
#[derive(Default)]
pub struct InjectionPoints<'a> {
    points: Vec<InjectionPoint<'a>>,
}

impl<'a> InjectionPoints<'a> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Declare a field receiving the dispatch's context container.
    pub fn container(&mut self, cell: &'a Injected<ContextContainer>) -> &mut Self {
        self.push(
            PointKind::Container,
            move |container| {
                cell.set(Some(Arc::clone(container)));
                true
            },
            Some(Box::new(move || cell.set(None))),
        )
    }

    /// Declare a field receiving the current value of context type `T`.
    pub fn context<T: Send + Sync + 'static>(&mut self, cell: &'a Injected<T>) -> &mut Self {
        self.push(
            PointKind::Context(ContextKey::of::<T>()),
            move |container| {
                let value = container.get::<T>();
                let found = value.is_some();
                cell.set(value);
                found
            },
            Some(Box::new(move || cell.set(None))),
        )
    }

    /// Declare a setup operation over the context types in `A`.
    ///
    /// `setup` is only called once every type in `A` is bound.
    ///
    /// ```rust,ignore
    /// points.setup::<(Tenant, Clock), _>(move |(tenant, clock)| self.configure(tenant, clock));
    /// ```
    pub fn setup<A, F>(&mut self, setup: F) -> &mut Self
    where
        A: ContextArgs,
        F: Fn(A::Values) + 'a,
    {
        self.push(
            PointKind::Setup(A::keys()),
            move |container| match A::resolve(container) {
                Some(values) => {
                    setup(values);
                    true
                }
                None => false,
            },
            None,
        )
    }

    /// Iterate over the declared points.
    pub fn iter(&self) -> impl Iterator<Item = &InjectionPoint<'a>> {
        self.points.iter()
    }

    /// Number of declared points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn push(
        &mut self,
        kind: PointKind,
        apply: impl Fn(&Arc<ContextContainer>) -> bool + 'a,
        release: Option<Release<'a>>,
    ) -> &mut Self {
        self.points.push(InjectionPoint {
            kind,
            apply: Box::new(apply),
            release,
        });
        self
    }
}

/// Identifies an injection target within one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The middleware at this position in the pipeline.
    Middleware(usize),
    /// The handler.
    Handler,
}

/// What a single injection pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionReport {
    /// Container points set in this pass.
    pub containers: usize,
    /// Context points that found a bound value.
    pub resolved: usize,
    /// Setup operations invoked in this pass.
    pub setups_fired: usize,
    /// Context types requested but not yet bound.
    pub pending: Vec<ContextKey>,
}

/// Resolves injection points against one dispatch's container.
///
/// Create one injector per dispatch; it remembers which targets already
/// received the container and which setup operations already fired.
///
/// The injector borrows every target it has served. Dropping it (or calling
/// [`release`](DependencyInjector::release)) clears the container and context
/// cells it filled on the current thread, which drops this dispatch's
/// references to the container and to every bound context value.
///
/// Setup bookkeeping is keyed by the position of a setup among its target's
/// setup points, so it relies on `injection_points` declaring the same points
/// in the same order on every call.
pub struct DependencyInjector<'a> {
    container: Arc<ContextContainer>,
    structured: HashSet<Target>,
    fired: HashSet<(Target, usize)>,
    held: Vec<Release<'a>>,
}

impl<'a> DependencyInjector<'a> {
    /// Create an injector over `container`.
    pub fn new(container: Arc<ContextContainer>) -> Self {
        Self {
            container,
            structured: HashSet::new(),
            fired: HashSet::new(),
            held: Vec::new(),
        }
    }

    /// The container this injector resolves from.
    pub fn container(&self) -> &Arc<ContextContainer> {
        &self.container
    }

    /// Inject dependencies into `object` ahead of one of its stages.
    pub fn inject<T>(
        &mut self,
        target: Target,
        object: &'a T,
    ) -> Result<InjectionReport, InjectionError>
    where
        T: Injectable + ?Sized,
    {
        let mut points = InjectionPoints::new();
        object.injection_points(&mut points)?;

        let mut report = InjectionReport::default();

        if self.structured.insert(target) {
            for point in points.iter().filter(|p| p.kind == PointKind::Container) {
                (point.apply)(&self.container);
                report.containers += 1;
            }
            self.held
                .extend(points.points.iter_mut().filter_map(|p| p.release.take()));
        }

        for point in points.iter() {
            if let PointKind::Context(key) = &point.kind {
                if (point.apply)(&self.container) {
                    report.resolved += 1;
                } else {
                    report.pending.push(*key);
                }
            }
        }

        // Indexed among setup points only; stable while the declaration is.
        let setups = points
            .iter()
            .filter(|p| matches!(p.kind, PointKind::Setup(_)))
            .enumerate();
        for (index, point) in setups {
            if self.fired.contains(&(target, index)) {
                continue;
            }
            if (point.apply)(&self.container) {
                self.fired.insert((target, index));
                report.setups_fired += 1;
            } else if let PointKind::Setup(keys) = &point.kind {
                report.pending.extend(
                    keys.iter()
                        .filter(|key| !self.container.contains_key(key))
                        .copied(),
                );
            }
        }

        Ok(report)
    }

    /// Clear every cell filled so far on the current thread.
    ///
    /// Runs automatically on drop. Targets injected afterwards are tracked
    /// again from scratch.
    pub fn release(&mut self) {
        for release in self.held.drain(..) {
            release();
        }
        self.structured.clear();
    }
}

impl Drop for DependencyInjector<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for DependencyInjector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyInjector")
            .field("container", &self.container)
            .field("structured", &self.structured)
            .field("fired", &self.fired)
            .field("held", &self.held.len())
            .finish()
    }
}
