//! Shared fixtures for media endpoint integration tests
//!
//! `FakeCatalog` serves a root of 26 letter-bucket artists. Every query and
//! page read can be delayed, and every snapshot carries the catalog version
//! it was taken at so refreshes are observable.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use media_endpoint::prelude::*;
use media_endpoint::CancellationToken;
use parking_lot::Mutex;
use watchable::WatchableThread;

pub const ROOT_TOTAL: u32 = 26;

// ============================================================================
// FakeCatalog
// ============================================================================

#[derive(Debug, Clone)]
pub struct FakeSnapshot {
    pub descriptor: SnapshotDescriptor,
    pub version: u32,
    pub label: String,
}

impl CatalogSnapshot for FakeSnapshot {
    fn total(&self) -> u32 {
        self.descriptor.total
    }

    fn alpha(&self) -> Option<&[u32]> {
        self.descriptor.alpha.as_deref()
    }
}

pub struct FakeCatalog {
    pub tags: TagRegistry,
    capabilities: Capabilities,
    version: AtomicU32,
    query_delays: Mutex<VecDeque<Duration>>,
    read_delay: Mutex<Duration>,
    fail_reads: Mutex<bool>,
    queries_started: AtomicUsize,
    next_session: AtomicU32,
    created: Mutex<Vec<String>>,
    destroyed: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::new(["Browse", "Link", "Search"]))
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            tags: TagRegistry::new(),
            capabilities,
            version: AtomicU32::new(0),
            query_delays: Mutex::new(VecDeque::new()),
            read_delay: Mutex::new(Duration::ZERO),
            fail_reads: Mutex::new(false),
            queries_started: AtomicUsize::new(0),
            next_session: AtomicU32::new(1),
            created: Mutex::new(Vec::new()),
            destroyed: Mutex::new(Vec::new()),
        }
    }

    /// Delay for the next query not yet started, in call order
    pub fn push_query_delay(&self, delay: Duration) {
        self.query_delays.lock().push_back(delay);
    }

    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock() = delay;
    }

    pub fn fail_reads(&self, fail: bool) {
        *self.fail_reads.lock() = fail;
    }

    /// Change the catalog contents
    pub fn bump_version(&self) -> u32 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn queries_started(&self) -> usize {
        self.queries_started.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().clone()
    }

    pub fn artist_name(index: u32, version: u32) -> String {
        let letter = char::from(b'A' + index as u8);
        format!("{letter} Artist v{version}")
    }

    async fn query(&self, label: String, total: u32, alpha: Option<Vec<u32>>) -> FakeSnapshot {
        let version = self.version.load(Ordering::SeqCst);
        let delay = self.query_delays.lock().pop_front().unwrap_or_default();
        self.queries_started.fetch_add(1, Ordering::SeqCst);

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        FakeSnapshot {
            descriptor: SnapshotDescriptor::new(total, alpha),
            version,
            label,
        }
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    type Snapshot = FakeSnapshot;

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn create_session(&self, _cancel: &CancellationToken) -> Result<String, CatalogError> {
        let id = format!("session-{}", self.next_session.fetch_add(1, Ordering::SeqCst));
        self.created.lock().push(id.clone());
        Ok(id)
    }

    async fn destroy_session(
        &self,
        _cancel: &CancellationToken,
        session: &str,
    ) -> Result<(), CatalogError> {
        self.destroyed.lock().push(session.to_string());
        Ok(())
    }

    async fn browse(
        &self,
        _cancel: &CancellationToken,
        _session: &str,
        item: Option<&MediaDatum>,
    ) -> Result<FakeSnapshot, CatalogError> {
        match item.and_then(MediaDatum::id) {
            None => {
                let alpha = (1..=ROOT_TOTAL).collect();
                Ok(self.query("root".into(), ROOT_TOTAL, Some(alpha)).await)
            }
            Some(id) => Ok(self.query(format!("browse:{id}"), 3, None).await),
        }
    }

    async fn list(
        &self,
        _cancel: &CancellationToken,
        _session: &str,
        tag: &Tag,
    ) -> Result<FakeSnapshot, CatalogError> {
        if !self.capabilities.supports_list() {
            return Err(CatalogError::Unsupported("List".into()));
        }
        Ok(self.query(format!("list:{}", tag.full_name()), ROOT_TOTAL, None).await)
    }

    async fn link(
        &self,
        _cancel: &CancellationToken,
        _session: &str,
        tag: &Tag,
        value: &str,
    ) -> Result<FakeSnapshot, CatalogError> {
        Ok(self.query(format!("link:{}={value}", tag.full_name()), 3, None).await)
    }

    async fn search(
        &self,
        _cancel: &CancellationToken,
        _session: &str,
        text: &str,
    ) -> Result<FakeSnapshot, CatalogError> {
        let needle = text.to_ascii_uppercase();
        let hits = (0..ROOT_TOTAL)
            .filter(|i| Self::artist_name(*i, 0).to_ascii_uppercase().contains(&needle))
            .count() as u32;
        Ok(self.query(format!("search:{text}"), hits, None).await)
    }

    async fn read_page(
        &self,
        _cancel: &CancellationToken,
        _session: &str,
        snapshot: &FakeSnapshot,
        index: u32,
        count: u32,
    ) -> Result<Vec<MediaDatum>, CatalogError> {
        let delay = *self.read_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_reads.lock() {
            return Err(CatalogError::Transport("connection reset".into()));
        }

        let items = (index..index + count)
            .map(|i| {
                let (id, title) = if snapshot.label == "root" {
                    (format!("artist-{i}"), Self::artist_name(i, snapshot.version))
                } else {
                    (format!("{}-{i}", snapshot.label), format!("{} #{i}", snapshot.label))
                };
                let mut builder =
                    MediaDatum::builder(Some(id), vec![self.tags.audio.artist.clone()]);
                builder.add(&self.tags.container.title, MediaValue::new(title));
                builder.build()
            })
            .collect();
        Ok(items)
    }
}

// ============================================================================
// Fixture
// ============================================================================

pub struct Fixture {
    pub thread: WatchableThread,
    pub catalog: Arc<FakeCatalog>,
    pub supervisor: Arc<Supervisor<FakeCatalog>>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(FakeCatalog::new(), SupervisorConfig::new().with_worker_threads(2))
    }

    pub fn build(catalog: FakeCatalog, config: SupervisorConfig) -> Self {
        let thread = WatchableThread::new("test-watchable").expect("thread starts");
        let catalog = Arc::new(catalog);
        let supervisor = Supervisor::builder(catalog.clone(), thread.clone())
            .config(config)
            .build()
            .expect("supervisor builds");

        Self {
            thread,
            catalog,
            supervisor: Arc::new(supervisor),
        }
    }

    /// Run `job` on the logical thread and return its result
    pub fn run<R, F>(&self, job: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.thread.execute(job).expect("watchable thread running")
    }

    pub fn create_session(&self) -> Session<FakeCatalog> {
        let supervisor = self.supervisor.clone();
        self.run(move || supervisor.create_session())
            .wait()
            .expect("session created")
    }

    pub fn browse_root(&self, session: &Session<FakeCatalog>) -> Container<FakeCatalog> {
        let session = session.clone();
        self.run(move || session.browse(None))
            .wait()
            .expect("root browsed")
    }

    pub fn read(
        &self,
        snapshot: &Snapshot<FakeCatalog>,
        index: u32,
        count: u32,
    ) -> Pending<Fragment<MediaDatum>> {
        let snapshot = snapshot.clone();
        self.run(move || snapshot.read(index, count))
    }

    /// Close, dispose `sessions`, then dispose the supervisor
    pub fn shutdown(&self, sessions: Vec<Session<FakeCatalog>>) {
        let supervisor = self.supervisor.clone();
        self.run(move || {
            supervisor.close();
            for session in sessions {
                session.dispose();
            }
            supervisor.dispose();
        });
    }
}

/// Poll `predicate` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

pub fn title(datum: &MediaDatum, tags: &TagRegistry) -> String {
    datum
        .value(&tags.container.title)
        .unwrap_or_default()
        .to_string()
}
