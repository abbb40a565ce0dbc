//! Runs a suspending processor's future to completion for the blocking
//! [`Flow::execute`](crate::Flow::execute).

use crate::error::{FlowError, FlowResult};
use std::fmt;
use std::future::Future;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};
use tracing::debug;

/// Blocks the calling thread on a future.
///
/// Outside of any tokio runtime a private current-thread runtime is built on
/// first use and reused for every later call. Inside a multi-thread runtime
/// the worker is moved out of the scheduler with `block_in_place` and the
/// ambient handle drives the future. A current-thread runtime cannot be
/// blocked on from its own thread, so the future is moved to a scoped helper
/// thread with its own current-thread runtime and the caller waits for it.
/// This also covers a flow executed from inside another flow's processor.
#[derive(Default)]
pub(crate) struct BlockingDriver {
    runtime: Option<Runtime>,
}

impl fmt::Debug for BlockingDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingDriver")
            .field("owns_runtime", &self.runtime.is_some())
            .finish()
    }
}

impl BlockingDriver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn block_on<F>(&mut self, future: F) -> FlowResult<F::Output>
    where
        F: Future + Send,
        F::Output: Send,
    {
        match Handle::try_current() {
            Ok(handle) => match handle.runtime_flavor() {
                RuntimeFlavor::MultiThread => {
                    Ok(tokio::task::block_in_place(|| handle.block_on(future)))
                }
                flavor => {
                    debug!(
                        "Driving suspending processor on a helper thread ({:?} runtime)",
                        flavor
                    );
                    block_on_helper_thread(future)
                }
            },
            Err(_) => Ok(self.runtime()?.block_on(future)),
        }
    }

    fn runtime(&mut self) -> FlowResult<&Runtime> {
        if self.runtime.is_none() {
            debug!("Starting private runtime for suspending processors");
            self.runtime = Some(Builder::new_current_thread().enable_all().build()?);
        }
        self.runtime
            .as_ref()
            .ok_or_else(|| FlowError::Runtime("runtime was not initialized".to_string()))
    }
}

fn block_on_helper_thread<F>(future: F) -> FlowResult<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    let joined = std::thread::scope(|scope| {
        scope
            .spawn(move || -> FlowResult<F::Output> {
                let runtime = Builder::new_current_thread().enable_all().build()?;
                Ok(runtime.block_on(future))
            })
            .join()
    });
    // A panicking processor unwinds through `execute` as if it ran inline.
    joined.unwrap_or_else(|payload| std::panic::resume_unwind(payload))
}

impl Drop for BlockingDriver {
    fn drop(&mut self) {
        // A flow may be dropped from async code; a blocking shutdown would panic there.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_block_on_outside_runtime() {
        let mut driver = BlockingDriver::new();

        let value = driver
            .block_on(async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                7
            })
            .unwrap();
        assert_eq!(value, 7);

        // The runtime is kept for later calls.
        assert!(driver.runtime.is_some());
        assert_eq!(driver.block_on(async { 8 }).unwrap(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_block_on_inside_multi_thread_runtime() {
        let mut driver = BlockingDriver::new();

        let value = driver.block_on(async { "done" }).unwrap();
        assert_eq!(value, "done");
        assert!(driver.runtime.is_none());
    }

    #[tokio::test]
    async fn test_block_on_inside_current_thread_runtime() {
        let mut driver = BlockingDriver::new();

        let value = driver
            .block_on(async {
                tokio::time::sleep(Duration::from_millis(1)).await;
                1
            })
            .unwrap();
        assert_eq!(value, 1);
        assert!(driver.runtime.is_none());
    }

    #[test]
    fn test_block_on_nested_in_private_runtime() {
        let mut outer = BlockingDriver::new();

        let value = outer
            .block_on(async {
                let mut inner = BlockingDriver::new();
                inner.block_on(async { 2 }).unwrap() * 2
            })
            .unwrap();
        assert_eq!(value, 4);
    }

    #[test]
    fn test_block_on_resumes_helper_thread_panic() {
        let caught = std::panic::catch_unwind(|| {
            let runtime = Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let mut driver = BlockingDriver::new();
                let _ = driver.block_on(async { panic!("processor blew up") });
            })
        });
        assert!(caught.is_err());
    }
}
