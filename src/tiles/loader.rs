//! Load scheduling: a FIFO-fair concurrency limit and the retry wrapper.

use futures::future::LocalBoxFuture;
use std::future::Future;
use std::rc::Rc;
use tokio::sync::Semaphore;

use crate::runtime::async_utils::yield_now;
use crate::{Error, LoadError, Result};

/// Bounds the number of loads in flight. Waiting loads start in the order they
/// queued.
#[derive(Debug, Clone)]
pub struct WorkPool {
    permits: Rc<Semaphore>,
    concurrency: usize,
}

impl WorkPool {
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(Error::InvalidArgument(
                "work pool concurrency must be positive".into(),
            ));
        }
        Ok(Self {
            permits: Rc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Number of loads that could start right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` once a slot is free. The job is not created until then, and
    /// dropping the returned future gives up its place in the queue.
    pub async fn run<T, F, Fut>(&self, job: F) -> std::result::Result<T, LoadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, LoadError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| LoadError::Backend("work pool closed".into()))?;
        job().await
    }
}

/// Re-run `attempt` until it succeeds or fails with an error that is not
/// retryable. The executor gets a turn between attempts.
pub async fn retry<T, F>(mut attempt: F) -> std::result::Result<T, LoadError>
where
    F: FnMut() -> LocalBoxFuture<'static, std::result::Result<T, LoadError>>,
{
    let mut attempts = 1u32;
    loop {
        match attempt().await {
            Err(error) if error.is_retryable() => {
                log::trace!("attempt {attempts} failed, retrying: {error}");
                attempts += 1;
                yield_now().await;
            }
            result => return result,
        }
    }
}
