//! Runtime abstraction layer for async operations
//!
//! This module provides runtime-agnostic interfaces for spawning the
//! background work of the core (tile grid loads, the alert scheduler) and for
//! pushing blocking disk I/O off the async executor.

use std::future::Future;
use std::pin::Pin;

/// A trait for spawning async tasks (object-safe version)
pub trait AsyncSpawner: Send + Sync + 'static {
    /// Spawn a future and return a handle to it
    fn spawn_boxed(
        &self,
        future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
    ) -> Box<dyn AsyncHandle>;
}

/// Handle to a spawned async task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task
    fn cancel(&self);
}

/// Convenience function for spawning with type safety
#[cfg(feature = "tokio-runtime")]
pub fn spawn<F>(future: F) -> Box<dyn AsyncHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    log::trace!("runtime::spawn - spawning new async task");
    runtime().spawn_boxed(Box::pin(future))
}

/// Default spawner implementations
pub mod spawners {
    use super::*;

    #[cfg(feature = "tokio-runtime")]
    pub mod tokio_impl {
        use super::*;
        use ::tokio::task::JoinHandle;

        /// Tokio-based async spawner
        pub struct TokioSpawner;

        impl AsyncSpawner for TokioSpawner {
            fn spawn_boxed(
                &self,
                future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
            ) -> Box<dyn AsyncHandle> {
                let handle = ::tokio::spawn(future);
                Box::new(TokioHandle(handle))
            }
        }

        struct TokioHandle(JoinHandle<()>);

        impl AsyncHandle for TokioHandle {
            fn is_finished(&self) -> bool {
                self.0.is_finished()
            }

            fn cancel(&self) {
                self.0.abort();
            }
        }
    }
}

/// Shared async helpers
pub mod async_utils {
    use std::time::Duration;

    /// Async delay that works across runtimes
    pub async fn async_delay(duration: Duration) {
        if duration.is_zero() {
            return;
        }

        #[cfg(feature = "tokio-runtime")]
        {
            tokio::time::sleep(duration).await;
        }

        #[cfg(not(feature = "tokio-runtime"))]
        {
            std::thread::sleep(duration);
        }
    }

    /// Run blocking work (disk I/O, compression) off the async executor
    pub async fn run_blocking<F, T>(work: F) -> crate::Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        #[cfg(feature = "tokio-runtime")]
        {
            joined(tokio::task::spawn_blocking(work)).await
        }

        #[cfg(not(feature = "tokio-runtime"))]
        {
            Ok(work())
        }
    }

    /// Await a task, re-raising its panic. A cancelled task is an error.
    #[cfg(feature = "tokio-runtime")]
    pub(crate) async fn joined<T>(handle: tokio::task::JoinHandle<T>) -> crate::Result<T> {
        match handle.await {
            Ok(value) => Ok(value),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(crate::MapError::Cancelled(e.to_string())),
        }
    }
}

/// The spawner behind [`spawn`]
#[cfg(feature = "tokio-runtime")]
pub fn runtime() -> &'static dyn AsyncSpawner {
    &spawners::tokio_impl::TokioSpawner
}
