//! Task tracking, completion and disposal plumbing
//!
//! - [`TaskSet`]: the set of in-flight operations an object must drain
//!   before it is fully disposed
//! - [`Pending`]: the completion of one asynchronous operation
//! - [`DisposeState`]: the live/disposed flag guarding new work

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::{Condvar, Mutex, RwLock};
use tokio::sync::oneshot;

use crate::error::{EndpointError, Result};

// ============================================================================
// TaskSet
// ============================================================================

#[derive(Default)]
struct TaskTable {
    next: u64,
    active: HashMap<u64, &'static str>,
}

struct TaskSetInner {
    table: Mutex<TaskTable>,
    idle: Condvar,
}

/// Tracked set of in-flight tasks
///
/// A task is registered with [`track`](Self::track) and leaves the set when
/// its [`TaskGuard`] drops, whatever the outcome.
#[derive(Clone)]
pub struct TaskSet {
    inner: Arc<TaskSetInner>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TaskSetInner {
                table: Mutex::new(TaskTable::default()),
                idle: Condvar::new(),
            }),
        }
    }

    /// Register a task labelled `kind`
    pub fn track(&self, kind: &'static str) -> TaskGuard {
        let mut table = self.inner.table.lock();
        let id = table.next;
        table.next += 1;
        table.active.insert(id, kind);
        TaskGuard {
            id,
            set: self.inner.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.table.lock().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until every tracked task has finished
    pub fn wait_idle(&self) {
        let mut table = self.inner.table.lock();
        if !table.active.is_empty() {
            tracing::trace!(outstanding = ?table.active.values().collect::<Vec<_>>(), "waiting for tasks");
        }
        while !table.active.is_empty() {
            self.inner.idle.wait(&mut table);
        }
    }
}

impl Default for TaskSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSet").field("active", &self.len()).finish()
    }
}

/// Membership of one task in a [`TaskSet`]
pub struct TaskGuard {
    id: u64,
    set: Arc<TaskSetInner>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let mut table = self.set.table.lock();
        table.active.remove(&self.id);
        if table.active.is_empty() {
            self.set.idle.notify_all();
        }
    }
}

// ============================================================================
// Pending
// ============================================================================

/// Completion of an asynchronous endpoint operation
///
/// Await it from async code, or call [`wait`](Self::wait) from a plain
/// thread. An operation whose task went away without answering resolves as
/// [`EndpointError::Canceled`].
#[must_use = "dropping a pending operation discards its result"]
pub struct Pending<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> Pending<T> {
    pub(crate) fn new(receiver: oneshot::Receiver<Result<T>>) -> Self {
        Self { receiver }
    }

    /// An operation that has already finished with `result`
    pub fn ready(result: Result<T>) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(result);
        Self { receiver }
    }

    /// An operation that failed before it started
    pub fn canceled() -> Self {
        Self::ready(Err(EndpointError::Canceled))
    }

    /// Block the current thread until the operation completes
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait(self) -> Result<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(EndpointError::Canceled))
    }

    /// Take the result if the operation has finished
    pub fn try_result(&mut self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(EndpointError::Canceled)),
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(EndpointError::Canceled)))
    }
}

impl<T> std::fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}

// ============================================================================
// DisposeState
// ============================================================================

/// Live/disposed flag shared by every endpoint object
#[derive(Debug, Default)]
pub struct DisposeState {
    disposed: RwLock<bool>,
}

impl DisposeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_disposed(&self) -> bool {
        *self.disposed.read()
    }

    #[track_caller]
    pub fn assert_live(&self) {
        assert!(!self.is_disposed(), "object used after dispose");
    }

    /// Run `f` only while not disposed
    ///
    /// Disposal cannot begin while `f` is running.
    pub fn when_live<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let disposed = self.disposed.read();
        if *disposed {
            None
        } else {
            Some(f())
        }
    }

    /// Mark disposed; disposing twice is fatal
    #[track_caller]
    pub fn dispose(&self) {
        let mut disposed = self.disposed.write();
        assert!(!*disposed, "already disposed");
        *disposed = true;
    }
}
