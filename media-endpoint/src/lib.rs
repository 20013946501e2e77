//! Media Endpoint Supervisor
//!
//! Browse a remote media catalog as a paged, cancellable tree. A minimal
//! request-per-call [`CatalogClient`] is turned into sessions, containers and
//! snapshots that are safe to drive from a single logical thread while all
//! remote I/O runs on a worker pool.
//!
//! # Features
//!
//! - **Supersession**: only the most recently started query on a session
//!   ever becomes visible
//! - **In-place Refresh**: containers re-run their query and swap snapshots
//!   without disturbing readers of the old one
//! - **Tracked Work**: every background operation is tracked until it
//!   finishes, so teardown never leaves a task behind
//! - **Staged Shutdown**: `close`, dispose sessions, then `dispose`, with
//!   out-of-order teardown caught as a fatal error
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use media_endpoint::prelude::*;
//! use watchable::WatchableThread;
//!
//! let thread = WatchableThread::new("media")?;
//! let supervisor = Arc::new(Supervisor::new(Arc::new(client), thread.clone())?);
//!
//! let s = supervisor.clone();
//! let session = thread.execute(move || s.create_session())?.wait()?;
//!
//! let browsing = session.clone();
//! let container = thread.execute(move || browsing.browse(None))?.wait()?;
//!
//! let c = container.clone();
//! let page = thread.execute(move || c.snapshot().read(0, 10))?.wait()?;
//! println!("{} items from index {}", page.len(), page.index());
//!
//! // Shutdown, in order
//! let s = supervisor.clone();
//! thread.execute(move || {
//!     s.close();
//!     session.dispose();
//!     s.dispose();
//! })?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! Supervisor ── sessions: Mutex<HashMap<id, Session>>, creates/destroys: TaskSet
//!     │
//!     └── Session ── sequence, query token, tasks: TaskSet
//!             │
//!             └── Container ── Watchable<Snapshot>, generation, refreshes: TaskSet
//!                     │
//!                     └── Snapshot ── descriptor, reads: TaskSet
//!
//! CancellationToken: Supervisor ─► query ─► Container ─► Snapshot
//! ```

pub mod client;
pub mod config;
pub mod container;
pub mod error;
pub mod logging;
pub mod media;
pub mod runtime;
pub mod session;
pub mod snapshot;
pub mod supervisor;
pub mod tag;
pub mod tasks;

pub use client::{Capabilities, CatalogClient, CatalogSnapshot, Query, SnapshotDescriptor};
pub use config::SupervisorConfig;
pub use container::Container;
pub use error::{CatalogError, EndpointError, Result};
pub use media::{Fragment, MediaDatum, MediaDatumBuilder, MediaValue};
pub use runtime::WorkerPool;
pub use session::Session;
pub use snapshot::Snapshot;
pub use supervisor::{Supervisor, SupervisorBuilder};
pub use tag::{AudioTags, ContainerTags, Tag, TagRegistry};
pub use tasks::{DisposeState, Pending, TaskGuard, TaskSet};

pub use tokio_util::sync::CancellationToken;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Capabilities, CatalogClient, CatalogError, CatalogSnapshot, Container, EndpointError,
        Fragment, MediaDatum, MediaValue, Pending, Session, Snapshot, SnapshotDescriptor,
        Supervisor, SupervisorConfig, Tag, TagRegistry,
    };
}
