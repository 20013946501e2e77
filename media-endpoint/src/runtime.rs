//! Worker pool and the shared call context
//!
//! Every remote catalog call runs as a task on the worker pool, never on the
//! logical thread. [`Context`] bundles what those tasks need: the client,
//! the logical thread to marshal results back onto, and the call policy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use watchable::WatchableThread;

use crate::client::CatalogClient;
use crate::config::SupervisorConfig;
use crate::error::{CatalogError, EndpointError, Result};
use crate::tasks::{Pending, TaskGuard};

/// Multi-threaded runtime owned by a supervisor
pub struct WorkerPool {
    runtime: Option<Runtime>,
}

impl WorkerPool {
    pub fn new(config: &SupervisorConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name(config.worker_thread_name.clone())
            .enable_all()
            .build()
            .map_err(|e| EndpointError::Runtime(e.to_string()))?;

        tracing::debug!(workers = config.worker_threads, "worker pool started");
        Ok(Self {
            runtime: Some(runtime),
        })
    }

    pub fn handle(&self) -> Option<Handle> {
        self.runtime.as_ref().map(|rt| rt.handle().clone())
    }

    /// Stop the pool without waiting for tasks still running
    pub fn shutdown(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            tracing::debug!("worker pool stopped");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("running", &self.runtime.is_some())
            .finish()
    }
}

/// Everything a background task needs, shared down the object tree
pub(crate) struct Context<C> {
    pub client: Arc<C>,
    pub thread: WatchableThread,
    pub handle: Handle,
    pub call_timeout: Option<Duration>,
}

impl<C: CatalogClient> Context<C> {
    /// Run one catalog request under `cancel` and the call timeout
    ///
    /// The token is checked before the request, raced against it, and
    /// checked again once it returns.
    pub async fn call<T, F>(
        &self,
        cancel: &CancellationToken,
        request: F,
    ) -> std::result::Result<T, CatalogError>
    where
        F: Future<Output = std::result::Result<T, CatalogError>>,
    {
        if cancel.is_cancelled() {
            return Err(CatalogError::Canceled);
        }

        let bounded = async {
            match self.call_timeout {
                Some(limit) => tokio::time::timeout(limit, request)
                    .await
                    .unwrap_or(Err(CatalogError::Canceled)),
                None => request.await,
            }
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CatalogError::Canceled),
            result = bounded => result,
        };

        if cancel.is_cancelled() {
            return Err(CatalogError::Canceled);
        }
        result
    }

    /// Run `work` on the pool, holding `guard` until it finishes
    pub fn spawn<T, F>(&self, guard: TaskGuard, work: F) -> Pending<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        self.handle.spawn(async move {
            let result = work.await;
            drop(guard);
            let _ = sender.send(result);
        });
        Pending::new(receiver)
    }
}
