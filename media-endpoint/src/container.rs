//! Container: the live result of one query
//!
//! A container publishes exactly one current [`Snapshot`] through a
//! [`Watchable`]. Refreshing re-runs the container's [`Query`] on the worker
//! pool and swaps the new snapshot in on the logical thread.
//!
//! Each refresh takes a generation number. A completed refresh only swaps
//! if its generation is still the latest, so an older refresh finishing
//! after a newer one is dropped.
//!
//! A finished refresh stays counted by [`Container::pending_refreshes`]
//! until its swap has run on the logical thread. Dispose only waits for
//! the remote calls; a swap still queued behind it finds the container
//! disposed and does nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use watchable::Watchable;

use crate::client::{CatalogClient, Query};
use crate::error::Result;
use crate::runtime::Context;
use crate::snapshot::Snapshot;
use crate::tasks::{DisposeState, TaskSet};

/// Live result of a query on a session
pub struct Container<C: CatalogClient> {
    inner: Arc<ContainerInner<C>>,
}

struct ContainerInner<C: CatalogClient> {
    ctx: Arc<Context<C>>,
    session: String,
    query: Query,
    cancel: CancellationToken,
    snapshot: Watchable<Snapshot<C>>,
    generation: AtomicU64,
    refreshes: TaskSet,
    swaps: TaskSet,
    state: DisposeState,
}

impl<C: CatalogClient> Clone for Container<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: CatalogClient> Container<C> {
    /// Run `query` once and wrap the result
    pub(crate) async fn open(
        ctx: Arc<Context<C>>,
        session: String,
        query: Query,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let descriptor = ctx
            .call(&cancel, query.run(ctx.client.as_ref(), &cancel, &session))
            .await?;

        let snapshot = Snapshot::new(
            ctx.clone(),
            session.clone(),
            descriptor,
            cancel.child_token(),
        );
        let watchable = Watchable::new(
            ctx.thread.clone(),
            format!("container({session})"),
            snapshot,
        );

        Ok(Self {
            inner: Arc::new(ContainerInner {
                ctx,
                session,
                query,
                cancel,
                snapshot: watchable,
                generation: AtomicU64::new(0),
                refreshes: TaskSet::new(),
                swaps: TaskSet::new(),
                state: DisposeState::new(),
            }),
        })
    }

    /// Reactive view of the current snapshot
    pub fn current_snapshot(&self) -> &Watchable<Snapshot<C>> {
        &self.inner.snapshot
    }

    /// The snapshot published right now
    pub fn snapshot(&self) -> Snapshot<C> {
        self.inner.snapshot.value()
    }

    pub fn query(&self) -> &Query {
        &self.inner.query
    }

    /// Re-run the query and swap in the new snapshot when it arrives
    ///
    /// Readers of the current snapshot are left to finish; the old snapshot
    /// is retired only after its in-flight reads drain.
    pub fn refresh(&self) {
        self.inner.ctx.thread.assert();

        let inner = self.inner.clone();
        self.inner.state.when_live(move || {
            let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let guard = inner.refreshes.track("refresh");
            tracing::debug!(session = %inner.session, generation, "container refresh started");

            let handle = inner.ctx.handle.clone();
            handle.spawn(async move {
                let request = inner
                    .query
                    .run(inner.ctx.client.as_ref(), &inner.cancel, &inner.session);
                let result = inner.ctx.call(&inner.cancel, request).await;

                match result {
                    Ok(descriptor) => {
                        let queued = inner.swaps.track("swap");
                        drop(guard);
                        let thread = inner.ctx.thread.clone();
                        thread.schedule(move || {
                            inner.swap(generation, descriptor);
                            drop(queued);
                        });
                    }
                    Err(e) => {
                        drop(guard);
                        tracing::debug!(
                            session = %inner.session,
                            generation,
                            error = %e,
                            "container refresh abandoned"
                        );
                    }
                }
            });
        });
    }

    /// Refreshes started but not yet swapped in or abandoned
    pub fn pending_refreshes(&self) -> usize {
        self.inner.refreshes.len() + self.inner.swaps.len()
    }

    /// Generation of the most recently started refresh
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.is_disposed()
    }

    /// Cancel refreshes, wait for them, then release the snapshot
    pub(crate) fn dispose(&self) {
        self.inner.ctx.thread.assert();

        self.inner.cancel.cancel();
        self.inner.state.dispose();
        self.inner.refreshes.wait_idle();

        let snapshot = self.inner.snapshot.value();
        self.inner.snapshot.close();
        snapshot.dispose();
        tracing::trace!(session = %self.inner.session, "container disposed");
    }
}

impl<C: CatalogClient> ContainerInner<C> {
    fn swap(&self, generation: u64, descriptor: C::Snapshot) {
        if self.state.is_disposed() {
            return;
        }
        if generation != self.generation.load(Ordering::SeqCst) {
            tracing::debug!(session = %self.session, generation, "stale refresh dropped");
            return;
        }

        let fresh = Snapshot::new(
            self.ctx.clone(),
            self.session.clone(),
            descriptor,
            self.cancel.child_token(),
        );
        let previous = self.snapshot.value();
        self.snapshot.update(fresh);
        previous.retire();
        tracing::debug!(session = %self.session, generation, "container refreshed");
    }
}

/// Identity comparison: two handles are equal when they refer to the same container
impl<C: CatalogClient> PartialEq for Container<C> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<C: CatalogClient> Eq for Container<C> {}

impl<C: CatalogClient> std::fmt::Debug for Container<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("session", &self.inner.session)
            .field("query", &self.inner.query)
            .field("generation", &self.generation())
            .finish()
    }
}
