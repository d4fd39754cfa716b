//! Runtime abstraction layer for async operations
//!
//! Every asynchronous operation in the viewer runs on a single-threaded
//! executor. This module provides the spawner interface the texture store uses
//! to start loads and the sources use to wait, plus cancellable task handles
//! and a cooperative yield, so the library works with either a `futures` local
//! pool or a tokio `LocalSet`.

use futures::future::{AbortHandle, Abortable, LocalBoxFuture};
use futures::FutureExt;
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::Result;

/// A trait for spawning non-`Send` tasks onto a single-threaded executor
pub trait Spawner {
    /// Spawn a boxed future; it runs when the executor next polls.
    fn spawn_boxed(&self, future: LocalBoxFuture<'static, ()>) -> Result<()>;

    /// A future completing after `duration` on this executor's clock.
    ///
    /// The default runs on the `futures-timer` thread and needs no reactor.
    fn delay(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        if duration.is_zero() {
            return futures::future::ready(()).boxed_local();
        }
        futures_timer::Delay::new(duration).boxed_local()
    }
}

/// Handle to a spawned task that can be cancelled
///
/// Cancelling is idempotent and has no effect once the task completed.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    abort: AbortHandle,
    finished: Rc<Cell<bool>>,
}

impl TaskHandle {
    /// Check if the task ran to completion
    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }

    /// Check if the task was cancelled before it completed
    pub fn is_cancelled(&self) -> bool {
        self.abort.is_aborted() && !self.finished.get()
    }

    /// Cancel the task; the future is dropped at its next poll
    pub fn cancel(&self) {
        if !self.finished.get() {
            self.abort.abort();
        }
    }
}

/// Spawn a future that can later be cancelled through the returned handle
pub fn spawn_cancellable<F>(spawner: &dyn Spawner, future: F) -> Result<TaskHandle>
where
    F: Future<Output = ()> + 'static,
{
    let (abort, registration) = AbortHandle::new_pair();
    let finished = Rc::new(Cell::new(false));
    let finished_flag = finished.clone();
    let task = Abortable::new(
        async move {
            future.await;
            finished_flag.set(true);
        },
        registration,
    );
    spawner.spawn_boxed(task.map(|_| ()).boxed_local())?;
    Ok(TaskHandle { abort, finished })
}

/// Default spawner implementations
pub mod spawners {
    use super::*;
    use futures::task::LocalSpawnExt;

    /// Spawner backed by a `futures::executor::LocalPool`
    impl Spawner for futures::executor::LocalSpawner {
        fn spawn_boxed(&self, future: LocalBoxFuture<'static, ()>) -> Result<()> {
            self.spawn_local(future)?;
            Ok(())
        }
    }

    #[cfg(feature = "tokio-runtime")]
    pub mod tokio_impl {
        use super::*;

        /// Tokio-based spawner; must be used from within a `tokio::task::LocalSet`
        #[derive(Debug, Default, Clone, Copy)]
        pub struct TokioLocalSpawner;

        impl Spawner for TokioLocalSpawner {
            fn spawn_boxed(&self, future: LocalBoxFuture<'static, ()>) -> Result<()> {
                ::tokio::task::spawn_local(future);
                Ok(())
            }

            fn delay(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
                ::tokio::time::sleep(duration).boxed_local()
            }
        }
    }
}

/// Cooperative helpers shared by the loaders
pub mod async_utils {
    use super::*;

    /// Yield once to the executor so other tasks get a chance to run
    pub fn yield_now() -> YieldNow {
        YieldNow { yielded: false }
    }

    #[derive(Debug)]
    #[must_use = "futures do nothing unless polled"]
    pub struct YieldNow {
        yielded: bool,
    }

    impl Future for YieldNow {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.yielded {
                return Poll::Ready(());
            }
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
