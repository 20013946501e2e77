//! Session: one remote browsing cursor
//!
//! Every query replaces the session's container. Queries are numbered; only
//! the most recently started one may install its container, so a slow,
//! superseded query can never overwrite the result of a newer one.
//!
//! ```text
//! browse/list/link/search  (logical thread)
//!     │  sequence += 1, cancel previous query
//!     │  wait for tracked tasks, dispose current container
//!     ▼
//! worker task ── Container::open ──► park outcome, schedule settle
//!                                          │
//!                 sequence still current? ─┴─ yes: install, Ok(container)
//!                                             no:  dispose it, Canceled
//! ```
//!
//! The query task keeps its task guard until the outcome is parked, so
//! once a wait for tracked tasks returns, every finished query can be
//! settled inline. Dispose and a new query both do so before going on.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::client::{CatalogClient, Query};
use crate::container::Container;
use crate::error::{EndpointError, Result};
use crate::media::MediaDatum;
use crate::runtime::Context;
use crate::tag::Tag;
use crate::tasks::{DisposeState, Pending, TaskSet};

type RemovalCallback = Box<dyn FnOnce(&str) + Send>;

/// A finished query waiting to be installed or discarded
struct Outcome<C: CatalogClient> {
    sequence: u64,
    token: CancellationToken,
    opened: Result<Container<C>>,
    sender: oneshot::Sender<Result<Container<C>>>,
}

/// A remote browsing session
pub struct Session<C: CatalogClient> {
    inner: Arc<SessionInner<C>>,
}

struct SessionInner<C: CatalogClient> {
    id: String,
    ctx: Arc<Context<C>>,
    cancel: CancellationToken,
    cursor: Mutex<Cursor<C>>,
    tasks: TaskSet,
    outcome: Mutex<Option<Outcome<C>>>,
    state: DisposeState,
    on_dispose: Mutex<Option<RemovalCallback>>,
}

struct Cursor<C: CatalogClient> {
    sequence: u64,
    container: Option<Container<C>>,
    query_cancel: Option<CancellationToken>,
}

impl<C: CatalogClient> Clone for Session<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: CatalogClient> Session<C> {
    pub(crate) fn new(
        ctx: Arc<Context<C>>,
        id: String,
        cancel: CancellationToken,
        on_dispose: RemovalCallback,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id,
                ctx,
                cancel,
                cursor: Mutex::new(Cursor {
                    sequence: 0,
                    container: None,
                    query_cancel: None,
                }),
                tasks: TaskSet::new(),
                outcome: Mutex::new(None),
                state: DisposeState::new(),
                on_dispose: Mutex::new(Some(on_dispose)),
            }),
        }
    }

    /// Remote session id
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Browse into `item`, or back to the catalog root with `None`
    pub fn browse(&self, item: Option<&MediaDatum>) -> Pending<Container<C>> {
        self.update_container(Query::Browse(item.cloned()))
    }

    pub fn list(&self, tag: &Tag) -> Pending<Container<C>> {
        self.update_container(Query::List(tag.clone()))
    }

    pub fn link(&self, tag: &Tag, value: impl Into<String>) -> Pending<Container<C>> {
        self.update_container(Query::Link(tag.clone(), value.into()))
    }

    pub fn search(&self, text: impl Into<String>) -> Pending<Container<C>> {
        self.update_container(Query::Search(text.into()))
    }

    /// The installed container, if the last query succeeded
    pub fn container(&self) -> Option<Container<C>> {
        self.inner.cursor.lock().container.clone()
    }

    /// Number of the most recently started query
    pub fn sequence(&self) -> u64 {
        self.inner.cursor.lock().sequence
    }

    pub fn pending_tasks(&self) -> usize {
        self.inner.tasks.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.is_disposed()
    }

    /// Tear the session down and release its remote id
    ///
    /// Cancels the outstanding query, waits for tracked tasks, disposes the
    /// container, then removes the session from its supervisor.
    pub fn dispose(&self) {
        self.inner.ctx.thread.assert();
        self.inner.state.assert_live();

        let superseded = {
            let mut cursor = self.inner.cursor.lock();
            cursor.sequence += 1;
            cursor.query_cancel.take()
        };
        if let Some(token) = superseded {
            token.cancel();
        }

        self.inner.tasks.wait_idle();
        self.inner.settle();
        self.inner.state.dispose();

        let container = self.inner.cursor.lock().container.take();
        if let Some(container) = container {
            container.dispose();
        }

        let on_dispose = self.inner.on_dispose.lock().take();
        if let Some(on_dispose) = on_dispose {
            on_dispose(&self.inner.id);
        }
        tracing::debug!(session = %self.inner.id, "session disposed");
    }

    /// Refresh the installed container, if any
    pub(crate) fn refresh(&self) {
        self.inner.ctx.thread.assert();
        if let Some(container) = self.container() {
            container.refresh();
        }
    }

    fn update_container(&self, query: Query) -> Pending<Container<C>> {
        self.inner.ctx.thread.assert();

        if self.inner.state.is_disposed() {
            return Pending::canceled();
        }

        let (sequence, superseded) = {
            let mut cursor = self.inner.cursor.lock();
            cursor.sequence += 1;
            (cursor.sequence, cursor.query_cancel.take())
        };
        if let Some(token) = superseded {
            token.cancel();
        }

        self.inner.tasks.wait_idle();
        self.inner.settle();

        let previous = self.inner.cursor.lock().container.take();
        if let Some(container) = previous {
            container.dispose();
        }

        let token = self.inner.cancel.child_token();
        self.inner.cursor.lock().query_cancel = Some(token.clone());

        tracing::debug!(session = %self.inner.id, sequence, ?query, "query started");

        let guard = self.inner.tasks.track("query");
        let (sender, receiver) = oneshot::channel();
        let inner = self.inner.clone();
        self.inner.ctx.handle.spawn(async move {
            let opened = Container::open(
                inner.ctx.clone(),
                inner.id.clone(),
                query,
                token.child_token(),
            )
            .await;

            *inner.outcome.lock() = Some(Outcome {
                sequence,
                token,
                opened,
                sender,
            });
            drop(guard);

            let thread = inner.ctx.thread.clone();
            thread.schedule(move || inner.settle());
        });

        Pending::new(receiver)
    }
}

impl<C: CatalogClient> SessionInner<C> {
    /// Install or discard the parked query outcome, if any
    fn settle(&self) {
        let Some(Outcome {
            sequence,
            token,
            opened,
            sender,
        }) = self.outcome.lock().take()
        else {
            return;
        };

        let container = match opened {
            Ok(container) => container,
            Err(e) => {
                tracing::debug!(session = %self.id, sequence, error = %e, "query failed");
                let _ = sender.send(Err(e));
                return;
            }
        };

        let installed = {
            let mut cursor = self.cursor.lock();
            let current = cursor.sequence == sequence
                && !token.is_cancelled()
                && !self.state.is_disposed();
            if current {
                cursor.container = Some(container.clone());
            }
            current
        };

        if installed {
            tracing::debug!(session = %self.id, sequence, "container installed");
            let _ = sender.send(Ok(container));
        } else {
            tracing::debug!(session = %self.id, sequence, "superseded container discarded");
            container.dispose();
            let _ = sender.send(Err(EndpointError::Canceled));
        }
    }
}

/// Identity comparison: two handles are equal when they refer to the same session
impl<C: CatalogClient> PartialEq for Session<C> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<C: CatalogClient> Eq for Session<C> {}

impl<C: CatalogClient> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("sequence", &self.sequence())
            .finish()
    }
}
