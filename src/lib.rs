//! # Crinkle
//!
//! A small chain-of-responsibility pipeline for Rust.
//!
//! A [`Flow`] is a named, ordered list of processors sharing one mutable
//! [`Context`]. Processors run one at a time in registration order until one
//! returns `true` ("handled, stop here") or the list is exhausted.
//!
//! ## Features
//!
//! - **Ordinary and suspending processors**: [`SyncProcessor`] runs to
//!   completion, [`AsyncProcessor`] may await I/O or timers; both mix freely
//!   in one flow and keep their order.
//! - **Blocking entry point**: [`Flow::execute`] drives suspending processors
//!   itself, so callers do not need an async runtime.
//!   [`Flow::execute_async`] serves callers that already have one.
//! - **Introspection**: [`Flow::get_current_processor`] names the processor
//!   that ran last, even when it failed.
//! - **Error Handling**: structured errors with `thiserror`, passed through
//!   the flow unchanged.
//!
//! ## Quick Start
//!
//! ```rust
//! use crinkle::prelude::*;
//!
//! let mut flow: Flow<String> = Flow::new("Greeting");
//!
//! flow.processor("Trim").ordinary(|ctx| {
//!     ctx.state = ctx.state.trim().to_string();
//!     Ok(false)
//! });
//! flow.processor("Reject empty").ordinary(|ctx| Ok(ctx.state.is_empty()));
//! flow.processor("Greet").ordinary(|ctx| {
//!     ctx.state = format!("Hello, {}!", ctx.state);
//!     Ok(true)
//! });
//!
//! let mut ctx = Context::from_state("  Crinkle ".to_string());
//! flow.execute(&mut ctx).expect("flow failed");
//!
//! assert_eq!(ctx.state, "Hello, Crinkle!");
//! assert_eq!(flow.get_current_processor(), "Greet");
//! ```
//!
//! ## Processor Types
//!
//! ```rust
//! use crinkle::prelude::*;
//! use async_trait::async_trait;
//!
//! define_processor!(LoadProfile);
//! define_processor!(CheckQuota);
//!
//! #[async_trait]
//! impl AsyncProcessor<u32, String> for LoadProfile {
//!     async fn process(&self, ctx: &mut Context<u32, String>) -> FlowResult<bool> {
//!         tokio::time::sleep(std::time::Duration::from_millis(1)).await;
//!         ctx.state = 3;
//!         Ok(false)
//!     }
//! }
//!
//! impl SyncProcessor<u32, String> for CheckQuota {
//!     fn process(&self, ctx: &mut Context<u32, String>) -> FlowResult<bool> {
//!         Ok(ctx.state == 0)
//!     }
//! }
//!
//! let mut flow: Flow<u32, String> = Flow::with_processors(
//!     "Quota",
//!     [Processor::suspending(LoadProfile), Processor::ordinary(CheckQuota)],
//! );
//!
//! let mut ctx = Context::new(0u32, Some("user-42".to_string()));
//! flow.execute(&mut ctx).expect("flow failed");
//! assert_eq!(flow.get_current_processor(), CheckQuota::NAME);
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use crinkle::prelude::*;
//!
//! let mut flow: Flow<u32> = Flow::new("Parse");
//! flow.processor("Validate").ordinary(|ctx| {
//!     if ctx.state > 100 {
//!         return Err(FlowError::processor("Validate", "value out of range"));
//!     }
//!     Ok(false)
//! });
//!
//! let mut ctx = Context::from_state(500);
//! match flow.execute(&mut ctx) {
//!     Err(FlowError::ProcessorError { processor_name, details }) => {
//!         eprintln!("Processor {} failed: {}", processor_name, details);
//!     }
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```

mod context;
mod driver;
mod error;
mod flow;
mod processor;

pub mod prelude;

pub use context::Context;
pub use error::{FlowError, FlowResult};
pub use flow::{DynProcessor, Flow, Registrar};
pub use processor::{
    AsyncFnProcessor, AsyncProcessor, FnProcessor, ProcessFuture, Processor, ProcessorName,
    SyncProcessor, Timeout,
};

/// Macro to define a processor with minimal boilerplate
///
/// This macro creates a processor struct with:
/// - `const NAME: &'static str` - compile-time processor name
/// - `Debug` derive
/// - `Default` implementation
///
/// The default [`SyncProcessor::name`] / [`AsyncProcessor::name`] of such a
/// struct returns the same string as `NAME`.
///
/// # Example
///
/// ```rust
/// use crinkle::define_processor;
///
/// define_processor!(MyProcessor);
/// assert_eq!(MyProcessor::NAME, "MyProcessor");
/// ```
#[macro_export]
macro_rules! define_processor {
    ($name:ident) => {
        #[derive(Debug)]
        pub struct $name;

        impl $name {
            /// Processor name as a compile-time constant
            #[allow(dead_code)]
            pub const NAME: &'static str = stringify!($name);
        }

        impl Default for $name {
            fn default() -> Self {
                Self
            }
        }
    };
}
