//! Flow engine: an ordered list of processors run against one context until
//! a processor asks to stop.

use crate::context::Context;
use crate::driver::BlockingDriver;
use crate::error::{FlowError, FlowResult};
use crate::processor::{ProcessFuture, Processor, ProcessorName};
use std::any::Any;
use std::fmt;
use tracing::{debug, info, warn};

/// A type-erased value offered for registration.
///
/// Accepted by [`Flow::try_new`] and [`Flow::try_add_processor`], which check
/// that it really holds a [`Processor`] of the flow's context type.
pub type DynProcessor = Box<dyn Any + Send + Sync>;

/// A named chain of processors sharing one [`Context`].
///
/// Processors run strictly in registration order. The first one returning
/// `Ok(true)` ends the run; the first `Err` is returned to the caller as is.
/// The name of the processor that was started last is kept and can be read
/// with [`Flow::get_current_processor`].
///
/// `execute` takes `&mut self`, so one flow instance is never run by two
/// callers at once.
///
/// There is no deadline on a run: a suspending processor that never
/// completes blocks `execute` forever. Wrap such processors in
/// [`Timeout`](crate::Timeout).
pub struct Flow<S, D = ()> {
    name: String,
    processors: Vec<Processor<S, D>>,
    current_processor: ProcessorName,
    driver: BlockingDriver,
}

impl<S, D> fmt::Debug for Flow<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name)
            .field(
                "processors",
                &self.processors.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("current_processor", &self.current_processor)
            .finish()
    }
}

impl<S, D> Flow<S, D> {
    /// Creates an empty flow.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_processors(name, Vec::new())
    }

    /// Creates a flow with an initial list of processors.
    pub fn with_processors(
        name: impl Into<String>,
        processors: impl IntoIterator<Item = Processor<S, D>>,
    ) -> Self {
        Self {
            name: name.into(),
            processors: processors.into_iter().collect(),
            current_processor: ProcessorName::default(),
            driver: BlockingDriver::new(),
        }
    }

    /// Returns the flow name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a processor to the end of the chain.
    pub fn add_processor(&mut self, processor: Processor<S, D>) -> &mut Self {
        debug!(
            "Adding processor '{}' to flow '{}'",
            processor.name(),
            self.name
        );
        self.processors.push(processor);
        self
    }

    /// Starts registering a function under `name`.
    ///
    /// ```
    /// use crinkle::{Context, Flow};
    ///
    /// let mut flow: Flow<u32> = Flow::new("Counter");
    /// flow.processor("Increment").ordinary(|ctx| {
    ///     ctx.state += 1;
    ///     Ok(false)
    /// });
    /// flow.processor("Wait").suspending(|ctx| {
    ///     Box::pin(async move {
    ///         tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    ///         Ok(ctx.state > 0)
    ///     })
    /// });
    ///
    /// let mut ctx = Context::from_state(0);
    /// flow.execute(&mut ctx).unwrap();
    /// assert_eq!(ctx.state, 1);
    /// assert_eq!(flow.get_current_processor(), "Wait");
    /// ```
    pub fn processor(&mut self, name: impl Into<ProcessorName>) -> Registrar<'_, S, D> {
        Registrar {
            flow: self,
            name: name.into(),
        }
    }

    /// Returns the registered processors in execution order.
    pub fn get_processors(&self) -> &[Processor<S, D>] {
        &self.processors
    }

    /// Returns the name of the processor started last, or `""` if none ran.
    pub fn get_current_processor(&self) -> &str {
        self.current_processor.as_str()
    }

    /// Returns the number of registered processors.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Returns `true` if no processor is registered.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Runs the processors in order against `ctx`, blocking the calling
    /// thread until the chain stops or is exhausted.
    ///
    /// Suspending processors are driven to completion before the next
    /// processor starts. This holds from plain threads, from inside any
    /// tokio runtime, and from inside another flow's suspending processor.
    /// Async callers can avoid blocking with [`Flow::execute_async`].
    pub fn execute(&mut self, ctx: &mut Context<S, D>) -> FlowResult<()> {
        debug!(
            "Executing flow '{}' with {} processors",
            self.name,
            self.processors.len()
        );

        for processor in &self.processors {
            self.current_processor = processor.name();
            debug!("Running processor '{}'", self.current_processor);

            let outcome = match processor {
                Processor::Ordinary(p) => p.process(ctx),
                Processor::Suspending(p) => self.driver.block_on(p.process(ctx)).and_then(|o| o),
            };
            if self.settle(outcome)? {
                return Ok(());
            }
        }

        self.exhausted();
        Ok(())
    }

    /// Same algorithm as [`Flow::execute`] for callers already running on an
    /// async runtime: suspending processors are awaited in place.
    pub async fn execute_async(&mut self, ctx: &mut Context<S, D>) -> FlowResult<()> {
        debug!(
            "Executing flow '{}' with {} processors",
            self.name,
            self.processors.len()
        );

        for processor in &self.processors {
            self.current_processor = processor.name();
            debug!("Running processor '{}'", self.current_processor);

            let outcome = match processor {
                Processor::Ordinary(p) => p.process(ctx),
                Processor::Suspending(p) => p.process(ctx).await,
            };
            if self.settle(outcome)? {
                return Ok(());
            }
        }

        self.exhausted();
        Ok(())
    }

    fn settle(&self, outcome: FlowResult<bool>) -> FlowResult<bool> {
        match outcome {
            Ok(true) => {
                info!(
                    "Flow '{}' stopped at processor '{}'",
                    self.name, self.current_processor
                );
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                warn!(
                    "Processor '{}' failed in flow '{}': {}",
                    self.current_processor, self.name, e
                );
                Err(e)
            }
        }
    }

    fn exhausted(&self) {
        if !self.processors.is_empty() {
            info!(
                "Flow '{}' ran all {} processors",
                self.name,
                self.processors.len()
            );
        }
    }
}

impl<S: 'static, D: 'static> Flow<S, D> {
    /// Creates a flow from values whose type is only known at runtime.
    ///
    /// Every value must be a `Processor<S, D>`. If any is not, no flow is
    /// created and the position of the first offending value is reported.
    ///
    /// ```
    /// use crinkle::{DynProcessor, Flow, FlowError, Processor};
    ///
    /// let ok: Processor<String> = Processor::from_fn("Ok", |_| Ok(false));
    /// let candidates: Vec<DynProcessor> = vec![Box::new(ok), Box::new("not a processor")];
    ///
    /// let result = Flow::<String>::try_new("Plugins", candidates);
    /// assert!(matches!(result, Err(FlowError::InvalidProcessor { position: 1, .. })));
    /// ```
    pub fn try_new(name: impl Into<String>, candidates: Vec<DynProcessor>) -> FlowResult<Self> {
        let processors = candidates
            .into_iter()
            .enumerate()
            .map(|(position, candidate)| Self::downcast(position, candidate))
            .collect::<FlowResult<Vec<_>>>()?;
        Ok(Self::with_processors(name, processors))
    }

    /// Appends a value whose type is only known at runtime.
    ///
    /// Fails without touching the chain if the value is not a
    /// `Processor<S, D>`.
    pub fn try_add_processor(&mut self, candidate: DynProcessor) -> FlowResult<&mut Self> {
        let processor = Self::downcast(self.processors.len(), candidate)?;
        Ok(self.add_processor(processor))
    }

    fn downcast(position: usize, candidate: DynProcessor) -> FlowResult<Processor<S, D>> {
        candidate
            .downcast::<Processor<S, D>>()
            .map(|processor| *processor)
            .map_err(|_| FlowError::InvalidProcessor {
                position,
                expected: std::any::type_name::<Processor<S, D>>(),
            })
    }
}

/// Registers a function as a processor under a fixed name.
///
/// Returned by [`Flow::processor`]. The caller picks the variant: `ordinary`
/// for functions that return their outcome directly, `suspending` for
/// functions returning a [`ProcessFuture`].
#[must_use = "a registrar does nothing until `ordinary` or `suspending` is called"]
pub struct Registrar<'a, S, D = ()> {
    flow: &'a mut Flow<S, D>,
    name: ProcessorName,
}

impl<'a, S, D> Registrar<'a, S, D> {
    /// Registers `func` as an ordinary processor under the pending name
    pub fn ordinary<F>(self, func: F) -> &'a mut Flow<S, D>
    where
        F: Fn(&mut Context<S, D>) -> FlowResult<bool> + Send + Sync + 'static,
    {
        let flow = self.flow;
        flow.add_processor(Processor::from_fn(self.name, func))
    }

    /// Registers `func` as a suspending processor under the pending name
    pub fn suspending<F>(self, func: F) -> &'a mut Flow<S, D>
    where
        F: for<'c> Fn(&'c mut Context<S, D>) -> ProcessFuture<'c> + Send + Sync + 'static,
        S: Send,
        D: Send,
    {
        let flow = self.flow;
        flow.add_processor(Processor::from_async_fn(self.name, func))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    type Trail = Context<Vec<String>, String>;

    fn trail() -> Trail {
        Context::new(Vec::new(), Some("dummy additional data".to_string()))
    }

    fn step(flow: &mut Flow<Vec<String>, String>, name: &'static str, stop: bool) {
        flow.processor(name).ordinary(move |ctx| {
            ctx.state.push(name.to_string());
            Ok(stop)
        });
    }

    fn suspending_step(flow: &mut Flow<Vec<String>, String>, name: &'static str, stop: bool) {
        flow.processor(name).suspending(move |ctx| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                ctx.state.push(name.to_string());
                Ok(stop)
            })
        });
    }

    #[test]
    fn test_new_flow_is_empty() {
        let flow: Flow<Vec<String>, String> = Flow::new("Dummy");

        assert_eq!(flow.name(), "Dummy");
        assert!(flow.is_empty());
        assert!(flow.get_processors().is_empty());
        assert_eq!(flow.get_current_processor(), "");
    }

    #[test]
    fn test_execute_empty_flow_is_noop() {
        let mut flow = Flow::with_processors("F", Vec::new());
        let mut ctx = trail();

        flow.execute(&mut ctx).unwrap();

        assert_eq!(flow.get_current_processor(), "");
        assert!(ctx.state.is_empty());
    }

    #[test]
    fn test_execute_runs_all_when_none_stops() {
        let mut flow = Flow::new("Dummy");
        step(&mut flow, "Dummy Processor 1", false);
        step(&mut flow, "Dummy Processor 2", false);
        step(&mut flow, "Dummy Processor 3", false);
        let mut ctx = trail();

        flow.execute(&mut ctx).unwrap();

        assert_eq!(flow.get_current_processor(), "Dummy Processor 3");
        assert_eq!(
            ctx.state,
            vec![
                "Dummy Processor 1",
                "Dummy Processor 2",
                "Dummy Processor 3"
            ]
        );
    }

    #[test]
    fn test_execute_stops_at_first_true() {
        let mut flow = Flow::new("F");
        step(&mut flow, "P1", false);
        step(&mut flow, "P2", true);
        step(&mut flow, "P3", false);
        let mut ctx = trail();

        flow.execute(&mut ctx).unwrap();

        assert_eq!(flow.get_current_processor(), "P2");
        assert_eq!(ctx.state, vec!["P1", "P2"]);
    }

    #[test]
    fn test_execute_drives_suspending_processor() {
        let mut flow = Flow::new("Dummy");
        step(&mut flow, "Dummy Processor 1", false);
        suspending_step(&mut flow, "Dummy Async Processor 2", true);
        step(&mut flow, "Dummy Processor 3", false);
        let mut ctx = trail();

        flow.execute(&mut ctx).unwrap();

        assert_eq!(flow.get_current_processor(), "Dummy Async Processor 2");
        assert_eq!(
            ctx.state,
            vec!["Dummy Processor 1", "Dummy Async Processor 2"]
        );
    }

    #[test]
    fn test_execute_consecutive_suspending_processors() {
        let mut flow = Flow::new("Dummy");
        step(&mut flow, "Dummy Processor 1", false);
        suspending_step(&mut flow, "Dummy Async Processor 2", false);
        suspending_step(&mut flow, "Dummy Async Processor 3", true);
        let mut ctx = trail();

        flow.execute(&mut ctx).unwrap();

        assert_eq!(flow.get_current_processor(), "Dummy Async Processor 3");
        assert_eq!(ctx.state.len(), 3);
    }

    #[test]
    fn test_execute_propagates_processor_error() {
        let mut flow = Flow::new("F");
        step(&mut flow, "P1", false);
        flow.processor("P2")
            .ordinary(|_ctx| Err(FlowError::processor("P2", "bad input")));
        step(&mut flow, "P3", false);
        let mut ctx = trail();

        let result = flow.execute(&mut ctx);

        match result {
            Err(FlowError::ProcessorError {
                processor_name,
                details,
            }) => {
                assert_eq!(processor_name, "P2");
                assert_eq!(details, "bad input");
            }
            other => panic!("Unexpected result: {:?}", other),
        }
        assert_eq!(flow.get_current_processor(), "P2");
        assert_eq!(ctx.state, vec!["P1"]);
    }

    #[test]
    fn test_execute_reuses_processors_across_runs() {
        let mut flow = Flow::new("F");
        flow.processor("Stop on second").ordinary(|ctx: &mut Trail| {
            ctx.state.push("seen".to_string());
            Ok(ctx.state.len() > 1)
        });
        step(&mut flow, "Tail", false);

        let mut first = trail();
        flow.execute(&mut first).unwrap();
        assert_eq!(flow.get_current_processor(), "Tail");

        let mut second = Context::new(vec!["preloaded".to_string()], None);
        flow.execute(&mut second).unwrap();
        assert_eq!(flow.get_current_processor(), "Stop on second");
        assert_eq!(second.state, vec!["preloaded", "seen"]);
    }

    #[test]
    fn test_get_processors_preserves_identity_and_order() {
        let p1: Processor<Vec<String>, String> = Processor::from_fn("P1", |_| Ok(false));
        let p2: Processor<Vec<String>, String> = Processor::from_fn("P2", |_| Ok(false));
        let p3: Processor<Vec<String>, String> = Processor::from_fn("P3", |_| Ok(true));

        let mut flow = Flow::new("F");
        flow.add_processor(p1.clone())
            .add_processor(p2.clone())
            .add_processor(p3.clone());

        let registered = flow.get_processors();
        assert_eq!(registered.len(), 3);
        assert!(registered[0].ptr_eq(&p1));
        assert!(registered[1].ptr_eq(&p2));
        assert!(registered[2].ptr_eq(&p3));
    }

    #[test]
    fn test_registrar_names_processors() {
        let mut flow: Flow<Vec<String>, String> = Flow::new("Dummy");
        step(&mut flow, "Dummy Processor", true);
        suspending_step(&mut flow, "Dummy Async Processor", true);

        let processors = flow.get_processors();
        assert_eq!(processors[0].name(), "Dummy Processor");
        assert!(!processors[0].is_suspending());
        assert_eq!(processors[1].name(), "Dummy Async Processor");
        assert!(processors[1].is_suspending());
    }

    #[test]
    fn test_try_new_rejects_non_processors() {
        let valid: Processor<Vec<String>, String> = Processor::from_fn("P1", |_| Ok(true));
        let candidates: Vec<DynProcessor> =
            vec![Box::new(valid), Box::new(1u32), Box::new("not_a_processor")];

        let result = Flow::<Vec<String>, String>::try_new("Invalid Processors Flow", candidates);

        match result {
            Err(FlowError::InvalidProcessor { position, expected }) => {
                assert_eq!(position, 1);
                assert!(expected.contains("Processor"));
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_try_new_accepts_processors() {
        let candidates: Vec<DynProcessor> = vec![
            Box::new(Processor::<Vec<String>, String>::from_fn("P1", |_| Ok(false))),
            Box::new(Processor::<Vec<String>, String>::from_fn("P2", |_| Ok(true))),
        ];

        let mut flow = Flow::try_new("Plugins", candidates).unwrap();
        let mut ctx = trail();
        flow.execute(&mut ctx).unwrap();

        assert_eq!(flow.len(), 2);
        assert_eq!(flow.get_current_processor(), "P2");
    }

    #[test]
    fn test_try_add_processor_leaves_chain_untouched_on_error() {
        let mut flow: Flow<Vec<String>, String> = Flow::new("F");
        step(&mut flow, "P1", false);

        // Right processor shape, wrong context type.
        let foreign: Processor<u32> = Processor::from_fn("Foreign", |_| Ok(true));
        let result = flow.try_add_processor(Box::new(foreign));

        assert!(matches!(
            result,
            Err(FlowError::InvalidProcessor { position: 1, .. })
        ));
        assert_eq!(flow.len(), 1);

        let own: Processor<Vec<String>, String> = Processor::from_fn("P2", |_| Ok(true));
        flow.try_add_processor(Box::new(own)).unwrap();
        assert_eq!(flow.len(), 2);
    }

    #[test]
    fn test_debug_lists_processor_names() {
        let mut flow: Flow<Vec<String>, String> = Flow::new("F");
        step(&mut flow, "P1", false);

        let debug = format!("{:?}", flow);
        assert!(debug.contains("\"F\""));
        assert!(debug.contains("P1"));
    }

    #[tokio::test]
    async fn test_execute_async_mixed_processors() {
        let mut flow = Flow::new("F");
        step(&mut flow, "P1", false);
        suspending_step(&mut flow, "P2", true);
        step(&mut flow, "P3", false);
        let mut ctx = trail();

        flow.execute_async(&mut ctx).await.unwrap();

        assert_eq!(flow.get_current_processor(), "P2");
        assert_eq!(ctx.state, vec!["P1", "P2"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_execute_inside_multi_thread_runtime() {
        let mut flow = Flow::new("F");
        suspending_step(&mut flow, "P1", false);
        step(&mut flow, "P2", true);
        let mut ctx = trail();

        flow.execute(&mut ctx).unwrap();

        assert_eq!(flow.get_current_processor(), "P2");
    }

    #[tokio::test]
    async fn test_blocking_execute_inside_current_thread_runtime() {
        let mut ordinary_only = Flow::new("Ordinary");
        step(&mut ordinary_only, "P1", true);
        let mut ctx = trail();
        ordinary_only.execute(&mut ctx).unwrap();
        assert_eq!(ctx.state, vec!["P1"]);

        let mut flow = Flow::new("Mixed");
        suspending_step(&mut flow, "P1", false);
        step(&mut flow, "P2", true);
        let mut ctx = trail();
        flow.execute(&mut ctx).unwrap();

        assert_eq!(flow.get_current_processor(), "P2");
        assert_eq!(ctx.state, vec!["P1", "P2"]);
    }

    #[test]
    fn test_nested_flow_inside_suspending_processor() {
        let mut outer: Flow<Vec<String>, String> = Flow::new("Outer");
        outer.processor("Delegate").suspending(|ctx| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                let mut inner: Flow<Vec<String>, String> = Flow::new("Inner");
                step(&mut inner, "I1", false);
                suspending_step(&mut inner, "I2", true);
                let outcome = inner.execute(ctx);
                ctx.state.push(format!("inner stopped at {}", inner.get_current_processor()));
                outcome.map(|()| false)
            })
        });
        step(&mut outer, "After", true);

        let mut ctx = trail();
        outer.execute(&mut ctx).unwrap();

        assert_eq!(ctx.state, vec!["I1", "I2", "inner stopped at I2", "After"]);
        assert_eq!(outer.get_current_processor(), "After");
    }
}
