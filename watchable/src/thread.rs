//! The logical thread
//!
//! All shared endpoint state is owned by one dedicated OS thread that drains
//! an ordered job queue. Worker tasks never touch that state directly; they
//! `schedule` a job and the thread runs it in submission order.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;

use crate::error::{Result, WatchableError};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

// ============================================================================
// WatchableThread - serialized job queue on a dedicated thread
// ============================================================================

/// Handle to the logical thread
///
/// Cloning is cheap; every clone refers to the same thread. The thread stops
/// when [`shutdown`](Self::shutdown) is called or the last handle is dropped.
#[derive(Clone)]
pub struct WatchableThread {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    thread_id: ThreadId,
    sender: Mutex<Option<mpsc::Sender<Message>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WatchableThread {
    /// Start a new logical thread with the given OS thread name
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Message>();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_jobs(receiver))
            .map_err(|e| WatchableError::Spawn(e.to_string()))?;

        tracing::debug!(thread = %name, "watchable thread started");

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                thread_id: handle.thread().id(),
                sender: Mutex::new(Some(sender)),
                handle: Mutex::new(Some(handle)),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the caller is running on this logical thread
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    /// Fatal unless called on this logical thread
    #[track_caller]
    pub fn assert(&self) {
        assert!(
            self.is_current(),
            "must be called on the watchable thread '{}'",
            self.inner.name
        );
    }

    /// Queue a job without waiting for it
    ///
    /// Jobs submitted after shutdown are dropped.
    pub fn schedule<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.send(Box::new(job)).is_err() {
            tracing::debug!(thread = %self.inner.name, "job dropped after shutdown");
        }
    }

    /// Run a job on the logical thread and wait for its result
    ///
    /// Runs inline when already on the thread. A panic inside the job is
    /// re-raised on the caller.
    pub fn execute<F, R>(&self, job: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Ok(job());
        }

        let (tx, rx) = mpsc::sync_channel(1);
        self.send(Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job));
            let _ = tx.send(outcome);
        }))?;

        match rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => Err(WatchableError::ShutDown),
        }
    }

    /// Stop the thread once already-queued jobs have run
    pub fn shutdown(&self) {
        if let Some(sender) = self.inner.sender.lock().take() {
            let _ = sender.send(Message::Stop);
        }

        if self.is_current() {
            return;
        }

        if let Some(handle) = self.inner.handle.lock().take() {
            if handle.join().is_err() {
                tracing::warn!(thread = %self.inner.name, "watchable thread panicked");
            }
        }
        tracing::debug!(thread = %self.inner.name, "watchable thread stopped");
    }

    fn send(&self, job: Job) -> Result<()> {
        let guard = self.inner.sender.lock();
        let sender = guard.as_ref().ok_or(WatchableError::ShutDown)?;
        sender
            .send(Message::Run(job))
            .map_err(|_| WatchableError::ShutDown)
    }
}

impl std::fmt::Debug for WatchableThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchableThread")
            .field("name", &self.inner.name)
            .finish()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // The last handle may be dropped by a job on the thread itself, so
        // only signal here and let the thread exit on its own.
        if let Some(sender) = self.sender.get_mut().take() {
            let _ = sender.send(Message::Stop);
        }
    }
}

fn run_jobs(receiver: mpsc::Receiver<Message>) {
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Run(job) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                    tracing::error!(
                        panic = %panic_message(payload.as_ref()),
                        "scheduled job panicked on watchable thread"
                    );
                }
            }
            Message::Stop => break,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_execute_runs_on_thread() {
        let thread = WatchableThread::new("test-exec").unwrap();
        assert!(!thread.is_current());

        let inner = thread.clone();
        let on_thread = thread.execute(move || inner.is_current()).unwrap();
        assert!(on_thread);

        thread.shutdown();
    }

    #[test]
    fn test_schedule_preserves_order() {
        let thread = WatchableThread::new("test-order").unwrap();
        let (tx, rx) = mpsc::channel();

        for i in 0..10 {
            let tx = tx.clone();
            thread.schedule(move || tx.send(i).unwrap());
        }

        let received: Vec<i32> = (0..10)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        assert_eq!(received, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_execute_inline_when_nested() {
        let thread = WatchableThread::new("test-nested").unwrap();
        let inner = thread.clone();
        let value = thread
            .execute(move || inner.execute(|| 7).unwrap() + 1)
            .unwrap();
        assert_eq!(value, 8);
    }

    #[test]
    #[should_panic(expected = "must be called on the watchable thread")]
    fn test_assert_off_thread_panics() {
        let thread = WatchableThread::new("test-assert").unwrap();
        thread.assert();
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn test_execute_propagates_panic() {
        let thread = WatchableThread::new("test-panic").unwrap();
        let _: () = thread.execute(|| panic!("boom")).unwrap();
    }

    #[test]
    fn test_scheduled_panic_does_not_stop_thread() {
        let thread = WatchableThread::new("test-survive").unwrap();
        thread.schedule(|| panic!("ignored"));

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        thread.execute(move || c.fetch_add(1, Ordering::SeqCst)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_execute_after_shutdown_fails() {
        let thread = WatchableThread::new("test-shutdown").unwrap();
        thread.shutdown();
        assert_eq!(thread.execute(|| ()), Err(WatchableError::ShutDown));
    }
}
