//! Processor capabilities and the tagged handle the flow stores.

use crate::context::Context;
use crate::error::{FlowError, FlowResult};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Human-readable processor identifier.
///
/// Used for introspection only; the flow never looks processors up by name
/// and duplicate names are allowed.
///
/// # Examples
///
/// ```
/// use crinkle::ProcessorName;
///
/// let name = ProcessorName::new("Authenticate");
/// assert_eq!(name.as_str(), "Authenticate");
///
/// let name: ProcessorName = "Authorize".into();
/// assert_eq!(name, "Authorize");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ProcessorName(String);

impl ProcessorName {
    /// Creates a new ProcessorName
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a ProcessorName from a type's name (last path segment, without
    /// generic arguments)
    pub fn from_type_name<T: ?Sized>() -> Self {
        let full_name = std::any::type_name::<T>();
        let base = full_name.split('<').next().unwrap_or(full_name);
        let short_name = base.rsplit("::").next().unwrap_or("UnknownProcessor");
        Self::new(short_name)
    }

    /// Returns the processor name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the name is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ProcessorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProcessorName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ProcessorName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ProcessorName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ProcessorName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ProcessorName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ProcessorName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A processor that runs to completion on the calling thread.
///
/// Return `Ok(true)` to stop the flow at this processor, `Ok(false)` to hand
/// the context to the next one. `Err` is reserved for faults and is returned
/// from [`Flow::execute`](crate::Flow::execute) unchanged.
///
/// Processor instances are reused across executions, so they must not hold
/// on to the context after `process` returns.
///
/// # Examples
///
/// ```
/// use crinkle::{Context, FlowResult, SyncProcessor};
///
/// struct RejectEmpty;
///
/// impl SyncProcessor<String> for RejectEmpty {
///     fn process(&self, ctx: &mut Context<String>) -> FlowResult<bool> {
///         Ok(ctx.state.is_empty())
///     }
/// }
///
/// let mut ctx: Context<String> = Context::from_state(String::new());
/// assert!(RejectEmpty.process(&mut ctx).unwrap());
/// assert_eq!(RejectEmpty.name(), "RejectEmpty");
/// ```
pub trait SyncProcessor<S, D = ()>: Send + Sync {
    /// Runs the processor against the shared context.
    fn process(&self, ctx: &mut Context<S, D>) -> FlowResult<bool>;

    /// Returns the processor name.
    ///
    /// By default, uses the type name. Override to provide a custom name.
    fn name(&self) -> ProcessorName {
        ProcessorName::from_type_name::<Self>()
    }
}

/// A processor that may suspend (I/O, timers) before producing its result.
///
/// The outcome contract is the same as [`SyncProcessor`]. The flow awaits the
/// returned future to completion before touching the next processor.
///
/// # Examples
///
/// ```
/// use crinkle::{AsyncProcessor, Context, FlowResult};
/// use async_trait::async_trait;
/// use std::time::Duration;
///
/// struct Throttle;
///
/// #[async_trait]
/// impl AsyncProcessor<u32> for Throttle {
///     async fn process(&self, ctx: &mut Context<u32>) -> FlowResult<bool> {
///         tokio::time::sleep(Duration::from_millis(1)).await;
///         ctx.state += 1;
///         Ok(false)
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncProcessor<S, D = ()>: Send + Sync {
    /// Runs the processor against the shared context.
    async fn process(&self, ctx: &mut Context<S, D>) -> FlowResult<bool>;

    /// Returns the processor name.
    ///
    /// By default, uses the type name. Override to provide a custom name.
    fn name(&self) -> ProcessorName {
        ProcessorName::from_type_name::<Self>()
    }
}

/// Boxed future returned by functions registered as suspending processors.
pub type ProcessFuture<'a> = Pin<Box<dyn Future<Output = FlowResult<bool>> + Send + 'a>>;

/// A registered processor, tagged with how it has to be run.
///
/// The variant is fixed when the handle is built, so the flow never has to
/// inspect a processor at execution time. Cloning is cheap and shares the
/// underlying instance; use [`Processor::ptr_eq`] for identity comparison.
pub enum Processor<S, D = ()> {
    /// Runs to completion without suspending.
    Ordinary(Arc<dyn SyncProcessor<S, D>>),
    /// Must be awaited to obtain its result.
    Suspending(Arc<dyn AsyncProcessor<S, D>>),
}

impl<S, D> Processor<S, D> {
    /// Wraps a [`SyncProcessor`].
    pub fn ordinary<P: SyncProcessor<S, D> + 'static>(processor: P) -> Self {
        Processor::Ordinary(Arc::new(processor))
    }

    /// Wraps an [`AsyncProcessor`].
    pub fn suspending<P: AsyncProcessor<S, D> + 'static>(processor: P) -> Self {
        Processor::Suspending(Arc::new(processor))
    }

    /// Adapts a plain function into an ordinary processor.
    pub fn from_fn<F>(name: impl Into<ProcessorName>, func: F) -> Self
    where
        F: Fn(&mut Context<S, D>) -> FlowResult<bool> + Send + Sync + 'static,
    {
        Self::ordinary(FnProcessor::new(name, func))
    }

    /// Adapts a future-returning function into a suspending processor.
    pub fn from_async_fn<F>(name: impl Into<ProcessorName>, func: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context<S, D>) -> ProcessFuture<'a> + Send + Sync + 'static,
        S: Send,
        D: Send,
    {
        Self::suspending(AsyncFnProcessor::new(name, func))
    }

    /// Returns the processor name.
    pub fn name(&self) -> ProcessorName {
        match self {
            Processor::Ordinary(p) => p.name(),
            Processor::Suspending(p) => p.name(),
        }
    }

    /// Returns `true` for the suspending variant.
    pub fn is_suspending(&self) -> bool {
        matches!(self, Processor::Suspending(_))
    }

    /// Returns `true` if both handles point at the same processor instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Processor::Ordinary(a), Processor::Ordinary(b)) => Arc::ptr_eq(a, b),
            (Processor::Suspending(a), Processor::Suspending(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<S, D> Clone for Processor<S, D> {
    fn clone(&self) -> Self {
        match self {
            Processor::Ordinary(p) => Processor::Ordinary(Arc::clone(p)),
            Processor::Suspending(p) => Processor::Suspending(Arc::clone(p)),
        }
    }
}

impl<S, D> fmt::Debug for Processor<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_suspending() {
            "suspending"
        } else {
            "ordinary"
        };
        f.debug_struct("Processor")
            .field("name", &self.name())
            .field("kind", &kind)
            .finish()
    }
}

/// Ordinary processor backed by a function.
pub struct FnProcessor<F> {
    name: ProcessorName,
    func: F,
}

impl<F> FnProcessor<F> {
    /// Creates a new FnProcessor
    pub fn new(name: impl Into<ProcessorName>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<S, D, F> SyncProcessor<S, D> for FnProcessor<F>
where
    F: Fn(&mut Context<S, D>) -> FlowResult<bool> + Send + Sync,
{
    fn process(&self, ctx: &mut Context<S, D>) -> FlowResult<bool> {
        (self.func)(ctx)
    }

    fn name(&self) -> ProcessorName {
        self.name.clone()
    }
}

/// Suspending processor backed by a future-returning function.
pub struct AsyncFnProcessor<F> {
    name: ProcessorName,
    func: F,
}

impl<F> AsyncFnProcessor<F> {
    /// Creates a new AsyncFnProcessor
    pub fn new(name: impl Into<ProcessorName>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<S, D, F> AsyncProcessor<S, D> for AsyncFnProcessor<F>
where
    F: for<'a> Fn(&'a mut Context<S, D>) -> ProcessFuture<'a> + Send + Sync,
    S: Send,
    D: Send,
{
    async fn process(&self, ctx: &mut Context<S, D>) -> FlowResult<bool> {
        (self.func)(ctx).await
    }

    fn name(&self) -> ProcessorName {
        self.name.clone()
    }
}

/// Bounds a suspending processor by a deadline.
///
/// The flow has no cancellation of its own; wrap individual processors that
/// may hang. When the deadline passes the inner future is dropped and
/// [`FlowError::Timeout`] is returned under the inner processor's name.
///
/// # Examples
///
/// ```
/// use crinkle::{AsyncProcessor, Context, FlowResult, Processor, Timeout};
/// use async_trait::async_trait;
/// use std::time::Duration;
///
/// struct FetchQuota;
///
/// #[async_trait]
/// impl AsyncProcessor<u32> for FetchQuota {
///     async fn process(&self, ctx: &mut Context<u32>) -> FlowResult<bool> {
///         ctx.state = 10;
///         Ok(false)
///     }
/// }
///
/// let processor: Processor<u32> =
///     Processor::suspending(Timeout::new(FetchQuota, Duration::from_secs(2)));
/// assert_eq!(processor.name(), "FetchQuota");
/// ```
#[derive(Debug)]
pub struct Timeout<P> {
    inner: P,
    duration: Duration,
}

impl<P> Timeout<P> {
    /// Creates a new Timeout that fails `inner` after `duration`
    pub fn new(inner: P, duration: Duration) -> Self {
        Self { inner, duration }
    }

    /// Returns the deadline applied to each call
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[async_trait]
impl<S, D, P> AsyncProcessor<S, D> for Timeout<P>
where
    P: AsyncProcessor<S, D>,
    S: Send,
    D: Send,
{
    async fn process(&self, ctx: &mut Context<S, D>) -> FlowResult<bool> {
        match tokio::time::timeout(self.duration, self.inner.process(ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let processor_name = self.inner.name();
                warn!(
                    "Processor '{}' timed out after {:?}",
                    processor_name, self.duration
                );
                Err(FlowError::Timeout { processor_name })
            }
        }
    }

    fn name(&self) -> ProcessorName {
        self.inner.name()
    }
}
