use crate::processor::ProcessorName;
use thiserror::Error;

/// Convenience alias used by processors and the flow engine.
pub type FlowResult<T> = Result<T, FlowError>;

/// Errors raised while registering or running processors.
///
/// The flow never recovers from or rewraps a processor's error: whatever a
/// processor returns from `process` comes back out of
/// [`Flow::execute`](crate::Flow::execute) as is.
///
/// # Non-Exhaustive
///
/// New variants may be added, so always include a wildcard arm:
///
/// ```
/// use crinkle::FlowError;
///
/// fn report(error: FlowError) {
///     match error {
///         FlowError::ProcessorError { processor_name, details } => {
///             eprintln!("Processor {} failed: {}", processor_name, details);
///         }
///         FlowError::Timeout { processor_name } => {
///             eprintln!("Processor {} timed out", processor_name);
///         }
///         FlowError::InvalidProcessor { position, expected } => {
///             eprintln!("Value at {} is not a {}", position, expected);
///         }
///         _ => eprintln!("Flow error: {}", error),
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FlowError {
    /// A value handed to dynamic registration is not a processor.
    ///
    /// Returned by [`Flow::try_new`](crate::Flow::try_new) and
    /// [`Flow::try_add_processor`](crate::Flow::try_add_processor).
    #[error("Invalid processor at position {position}: expected {expected}")]
    InvalidProcessor {
        /// Index the value had (or would have had) in the processor list
        position: usize,
        /// Type name of the processor handle the flow accepts
        expected: &'static str,
    },

    /// A processor reported a failure.
    #[error("Processor failed: {processor_name}, details: {details}")]
    ProcessorError {
        /// The name of the processor that failed
        processor_name: ProcessorName,
        /// Details about the failure
        details: String,
    },

    /// A processor wrapped in [`Timeout`](crate::Timeout) ran past its deadline.
    #[error("Timeout occurred in processor: {processor_name}")]
    Timeout {
        /// The name of the processor that timed out
        processor_name: ProcessorName,
    },

    /// The blocking driver had no runtime to drive a suspending processor on.
    #[error("Cannot drive suspending processor: {0}")]
    Runtime(String),

    /// The private runtime used for suspending processors failed to start.
    #[error("Failed to start runtime: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error produced by processor logic.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl FlowError {
    /// Shorthand for [`FlowError::ProcessorError`].
    pub fn processor(processor_name: impl Into<ProcessorName>, details: impl Into<String>) -> Self {
        FlowError::ProcessorError {
            processor_name: processor_name.into(),
            details: details.into(),
        }
    }
}
