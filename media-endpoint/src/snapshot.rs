//! Snapshot: one completed query's result set
//!
//! A snapshot is immutable: item count, optional alpha index, and whatever
//! per-query state the client needs to page. Reads run on the worker pool and
//! are tracked so that teardown can wait for them.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::client::{CatalogClient, CatalogSnapshot};
use crate::error::EndpointError;
use crate::media::{Fragment, MediaDatum};
use crate::runtime::Context;
use crate::tasks::{DisposeState, Pending, TaskSet};

/// Pageable result set of one query
pub struct Snapshot<C: CatalogClient> {
    inner: Arc<SnapshotInner<C>>,
}

struct SnapshotInner<C: CatalogClient> {
    ctx: Arc<Context<C>>,
    session: String,
    descriptor: C::Snapshot,
    cancel: CancellationToken,
    reads: TaskSet,
    state: DisposeState,
}

impl<C: CatalogClient> Clone for Snapshot<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: CatalogClient> Snapshot<C> {
    pub(crate) fn new(
        ctx: Arc<Context<C>>,
        session: String,
        descriptor: C::Snapshot,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(SnapshotInner {
                ctx,
                session,
                descriptor,
                cancel,
                reads: TaskSet::new(),
                state: DisposeState::new(),
            }),
        }
    }

    pub fn total(&self) -> u32 {
        self.inner.descriptor.total()
    }

    pub fn alpha(&self) -> Option<&[u32]> {
        self.inner.descriptor.alpha()
    }

    /// The client's description of this result set
    pub fn descriptor(&self) -> &C::Snapshot {
        &self.inner.descriptor
    }

    /// Fetch `count` items starting at `index`
    ///
    /// Must be called on the logical thread with `index + count <= total`;
    /// anything else is a fatal contract violation. Any failure, including
    /// cancellation, resolves as [`EndpointError::Canceled`].
    pub fn read(&self, index: u32, count: u32) -> Pending<Fragment<MediaDatum>> {
        self.inner.ctx.thread.assert();
        assert!(
            u64::from(index) + u64::from(count) <= u64::from(self.total()),
            "read out of range: index {} + count {} exceeds total {}",
            index,
            count,
            self.total()
        );

        let inner = self.inner.clone();
        self.inner
            .state
            .when_live(move || {
                let guard = inner.reads.track("read");
                tracing::trace!(session = %inner.session, index, count, "snapshot read started");
                let ctx = inner.ctx.clone();
                ctx.spawn(guard, async move {
                    let request = inner.ctx.client.read_page(
                        &inner.cancel,
                        &inner.session,
                        &inner.descriptor,
                        index,
                        count,
                    );
                    let items = inner
                        .ctx
                        .call(&inner.cancel, request)
                        .await
                        .map_err(|_| EndpointError::Canceled)?;
                    Ok(Fragment::new(index, items))
                })
            })
            .unwrap_or_else(Pending::canceled)
    }

    /// Reads started and not yet finished
    pub fn pending_reads(&self) -> usize {
        self.inner.reads.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.is_disposed()
    }

    /// Stop accepting reads and wait for in-flight ones to finish normally
    pub(crate) fn retire(&self) {
        self.inner.state.dispose();
        self.inner.reads.wait_idle();
    }

    /// Cancel in-flight reads and wait for them to drain
    pub(crate) fn dispose(&self) {
        self.inner.cancel.cancel();
        self.inner.state.dispose();
        self.inner.reads.wait_idle();
    }
}

/// Identity comparison: two handles are equal when they refer to the same snapshot
impl<C: CatalogClient> PartialEq for Snapshot<C> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<C: CatalogClient> Eq for Snapshot<C> {}

impl<C: CatalogClient> std::fmt::Debug for Snapshot<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("session", &self.inner.session)
            .field("total", &self.total())
            .field("alpha", &self.alpha())
            .finish()
    }
}
