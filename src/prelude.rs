//! Commonly used types and traits

pub use crate::context::Context;
pub use crate::define_processor;
pub use crate::error::{FlowError, FlowResult};
pub use crate::flow::Flow;
pub use crate::processor::{AsyncProcessor, Processor, ProcessorName, SyncProcessor, Timeout};
