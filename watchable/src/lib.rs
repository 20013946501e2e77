//! Logical Thread and Reactive Cells
//!
//! The substrate the media endpoint core runs on: one serialized logical
//! thread that owns all shared state, and owned reactive cells that publish
//! changes from it.
//!
//! # Features
//!
//! - **Ordered Job Queue**: `schedule` and `execute` run jobs in FIFO order
//! - **Thread Assertions**: `assert()` makes off-thread access a fatal error
//! - **Owned Cells**: `Watchable<T>` with callback watchers and watch receivers
//! - **Deterministic Release**: `close()` unregisters every observer
//!
//! # Quick Start
//!
//! ```rust
//! use watchable::{Watchable, WatchableThread};
//!
//! let thread = WatchableThread::new("example").unwrap();
//! let t = thread.clone();
//!
//! let value = thread
//!     .execute(move || {
//!         let cell = Watchable::new(t, "volume", 10u32);
//!         cell.update(20);
//!         let value = cell.value();
//!         cell.close();
//!         value
//!     })
//!     .unwrap();
//!
//! assert_eq!(value, 20);
//! thread.shutdown();
//! ```
//!
//! # Architecture
//!
//! ```text
//! WatchableThread
//!     │
//!     ├── job queue: mpsc::Sender<Job>  ──►  dedicated OS thread
//!     │
//!     └── Watchable<T>
//!             ├── value (owned by the thread)
//!             ├── watchers: Vec<Arc<dyn Watcher<T>>>
//!             └── watch::Sender<T>  ──►  watch::Receiver<T>
//! ```

mod error;
mod thread;
mod watchable;

pub use error::{Result, WatchableError};
pub use thread::WatchableThread;
pub use watchable::{Watchable, Watcher, WatcherId};
