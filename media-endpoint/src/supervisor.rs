//! Supervisor: owner of all sessions on one catalog
//!
//! Shutdown is two-phase and the order is enforced:
//!
//! 1. [`Supervisor::close`] cancels the shared scope; no remote call
//!    completes successfully afterwards.
//! 2. The application disposes every [`Session`], which disposes its
//!    containers and snapshots, each waiting for its own tracked work.
//! 3. [`Supervisor::dispose`] waits for session creation to drain, asserts
//!    that no sessions remain, and waits for remote releases to finish.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use watchable::WatchableThread;

use crate::client::{Capabilities, CatalogClient};
use crate::config::SupervisorConfig;
use crate::error::{EndpointError, Result};
use crate::runtime::{Context, WorkerPool};
use crate::session::Session;
use crate::tasks::{DisposeState, Pending, TaskSet};

/// Owns the live sessions for one catalog client
pub struct Supervisor<C: CatalogClient> {
    shared: Arc<Shared<C>>,
    pool: Mutex<Option<WorkerPool>>,
    state: DisposeState,
}

struct Shared<C: CatalogClient> {
    ctx: Arc<Context<C>>,
    cancel: CancellationToken,
    sessions: Mutex<HashMap<String, Session<C>>>,
    creates: TaskSet,
    destroys: TaskSet,
}

impl<C: CatalogClient> Supervisor<C> {
    /// Supervisor with default configuration and its own worker pool
    pub fn new(client: Arc<C>, thread: WatchableThread) -> Result<Self> {
        Self::builder(client, thread).build()
    }

    pub fn builder(client: Arc<C>, thread: WatchableThread) -> SupervisorBuilder<C> {
        SupervisorBuilder {
            client,
            thread,
            config: SupervisorConfig::default(),
            handle: None,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.shared.ctx.client.capabilities()
    }

    pub fn client(&self) -> &Arc<C> {
        &self.shared.ctx.client
    }

    /// Ask the catalog for a new session
    pub fn create_session(&self) -> Pending<Session<C>> {
        self.shared.ctx.thread.assert();
        self.state.assert_live();

        let guard = self.shared.creates.track("create");
        let shared = self.shared.clone();
        self.shared.ctx.spawn(guard, async move {
            let id = shared
                .ctx
                .call(&shared.cancel, shared.ctx.client.create_session(&shared.cancel))
                .await?;

            let mut sessions = shared.sessions.lock();
            if shared.cancel.is_cancelled() {
                tracing::warn!(session = %id, "supervisor closed while session was being created");
                return Err(EndpointError::Canceled);
            }

            let owner = Arc::downgrade(&shared);
            let session = Session::new(
                shared.ctx.clone(),
                id.clone(),
                shared.cancel.clone(),
                Box::new(move |id: &str| Shared::release(&owner, id)),
            );
            sessions.insert(id.clone(), session.clone());
            tracing::debug!(session = %id, "session created");
            Ok(session)
        })
    }

    /// Refresh every live session
    pub fn refresh(&self) {
        self.shared.ctx.thread.assert();
        let sessions: Vec<Session<C>> = self.shared.sessions.lock().values().cloned().collect();
        for session in sessions {
            session.refresh();
        }
    }

    /// Refresh one session; unknown ids are ignored
    pub fn refresh_session(&self, id: &str) {
        self.shared.ctx.thread.assert();
        let session = self.shared.sessions.lock().get(id).cloned();
        match session {
            Some(session) => session.refresh(),
            None => tracing::trace!(session = %id, "refresh for unknown session ignored"),
        }
    }

    /// First shutdown phase: cancel every outstanding and future remote call
    pub fn close(&self) {
        self.shared.ctx.thread.assert();
        tracing::info!(sessions = self.session_count(), "supervisor closing");
        self.shared.cancel.cancel();
    }

    /// Final shutdown phase
    ///
    /// Fatal unless [`close`](Self::close) was called and every session has
    /// been disposed.
    pub fn dispose(&self) {
        self.shared.ctx.thread.assert();
        assert!(
            self.shared.cancel.is_cancelled(),
            "supervisor disposed but not closed"
        );
        self.state.dispose();

        self.shared.creates.wait_idle();
        assert!(
            self.shared.sessions.lock().is_empty(),
            "sessions remain at supervisor dispose"
        );
        self.shared.destroys.wait_idle();

        if let Some(mut pool) = self.pool.lock().take() {
            pool.shutdown();
        }
        tracing::info!("supervisor disposed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    pub fn session(&self, id: &str) -> Option<Session<C>> {
        self.shared.sessions.lock().get(id).cloned()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.shared.sessions.lock().keys().cloned().collect()
    }

    pub fn session_count(&self) -> usize {
        self.shared.sessions.lock().len()
    }

    /// Session creations still in flight
    pub fn pending_creates(&self) -> usize {
        self.shared.creates.len()
    }

    /// Remote session releases still in flight
    pub fn pending_destroys(&self) -> usize {
        self.shared.destroys.len()
    }
}

impl<C: CatalogClient> Shared<C> {
    /// Drop `id` from the map now and release it remotely in the background
    fn release(owner: &Weak<Self>, id: &str) {
        let Some(shared) = owner.upgrade() else {
            return;
        };

        shared.sessions.lock().remove(id);

        let guard = shared.destroys.track("destroy");
        let id = id.to_string();
        let task = shared.clone();
        shared.ctx.handle.spawn(async move {
            let request = task.ctx.client.destroy_session(&task.cancel, &id);
            if let Err(e) = task.ctx.call(&task.cancel, request).await {
                tracing::debug!(session = %id, error = %e, "remote session release failed");
            }
            drop(guard);
        });
    }
}

impl<C: CatalogClient> Drop for Supervisor<C> {
    fn drop(&mut self) {
        if !self.state.is_disposed() {
            tracing::warn!(
                sessions = self.session_count(),
                "supervisor dropped without dispose"
            );
        }
    }
}

impl<C: CatalogClient> std::fmt::Debug for Supervisor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("sessions", &self.session_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// SupervisorBuilder
// ============================================================================

/// Builder for [`Supervisor`]
pub struct SupervisorBuilder<C: CatalogClient> {
    client: Arc<C>,
    thread: WatchableThread,
    config: SupervisorConfig,
    handle: Option<Handle>,
}

impl<C: CatalogClient> SupervisorBuilder<C> {
    pub fn config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run background work on an existing runtime instead of a private pool
    ///
    /// The runtime must have the time driver enabled.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn build(self) -> Result<Supervisor<C>> {
        self.config.validate()?;

        let (pool, handle) = match self.handle {
            Some(handle) => (None, handle),
            None => {
                let pool = WorkerPool::new(&self.config)?;
                let handle = pool
                    .handle()
                    .ok_or_else(|| EndpointError::Runtime("worker pool not running".into()))?;
                (Some(pool), handle)
            }
        };

        let ctx = Arc::new(Context {
            client: self.client,
            thread: self.thread,
            handle,
            call_timeout: self.config.call_timeout,
        });

        Ok(Supervisor {
            shared: Arc::new(Shared {
                ctx,
                cancel: CancellationToken::new(),
                sessions: Mutex::new(HashMap::new()),
                creates: TaskSet::new(),
                destroys: TaskSet::new(),
            }),
            pool: Mutex::new(pool),
            state: DisposeState::new(),
        })
    }
}
