//! The catalog client contract
//!
//! A [`CatalogClient`] is the thin, request-per-call view of a remote media
//! catalog. The core never special-cases a particular server; everything it
//! needs goes through this trait.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::CatalogError;
use crate::media::MediaDatum;
use crate::tag::Tag;

/// Result-set description returned by a query
pub trait CatalogSnapshot: Send + Sync + 'static {
    /// Number of items in the result set
    fn total(&self) -> u32;

    /// Cumulative item counts per alphabetic bucket, when the server
    /// indexes this result set
    fn alpha(&self) -> Option<&[u32]>;
}

/// Plain snapshot for clients that keep no per-query state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDescriptor {
    pub total: u32,
    pub alpha: Option<Vec<u32>>,
}

impl SnapshotDescriptor {
    pub fn new(total: u32, alpha: Option<Vec<u32>>) -> Self {
        Self { total, alpha }
    }
}

impl CatalogSnapshot for SnapshotDescriptor {
    fn total(&self) -> u32 {
        self.total
    }

    fn alpha(&self) -> Option<&[u32]> {
        self.alpha.as_deref()
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Attribute set advertised by a catalog
///
/// Callers check these before invoking the matching session operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    attributes: Vec<String>,
}

impl Capabilities {
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }

    pub fn supports_browse(&self) -> bool {
        self.contains("Browse")
    }

    pub fn supports_list(&self) -> bool {
        self.contains("List")
    }

    pub fn supports_link(&self) -> bool {
        self.contains("Link")
    }

    /// Whether `Link` is offered for this particular tag
    pub fn supports_link_tag(&self, tag: &Tag) -> bool {
        self.contains(&format!("Link:{}", tag.full_name()))
    }

    pub fn supports_search(&self) -> bool {
        self.contains("Search")
    }

    pub fn supports_query(&self) -> bool {
        self.contains("Query")
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(String::as_str)
    }
}

// ============================================================================
// CatalogClient
// ============================================================================

/// Request-per-call access to a remote catalog
///
/// Every method must stop promptly and report [`CatalogError::Canceled`]
/// when its token fires, and must be safe to call concurrently for
/// different sessions.
#[async_trait]
pub trait CatalogClient: Send + Sync + 'static {
    type Snapshot: CatalogSnapshot;

    fn capabilities(&self) -> &Capabilities;

    /// Allocate an opaque remote session id
    async fn create_session(&self, cancel: &CancellationToken) -> Result<String, CatalogError>;

    /// Release a session id; failures are treated as already released
    async fn destroy_session(
        &self,
        cancel: &CancellationToken,
        session: &str,
    ) -> Result<(), CatalogError>;

    /// Browse into `item`, or the catalog root when `None`
    async fn browse(
        &self,
        cancel: &CancellationToken,
        session: &str,
        item: Option<&MediaDatum>,
    ) -> Result<Self::Snapshot, CatalogError>;

    /// Distinct values of a tag
    async fn list(
        &self,
        _cancel: &CancellationToken,
        _session: &str,
        _tag: &Tag,
    ) -> Result<Self::Snapshot, CatalogError> {
        Err(CatalogError::Unsupported("List".into()))
    }

    /// Items matching a tag/value pair
    async fn link(
        &self,
        _cancel: &CancellationToken,
        _session: &str,
        _tag: &Tag,
        _value: &str,
    ) -> Result<Self::Snapshot, CatalogError> {
        Err(CatalogError::Unsupported("Link".into()))
    }

    /// Free-text search
    async fn search(
        &self,
        _cancel: &CancellationToken,
        _session: &str,
        _text: &str,
    ) -> Result<Self::Snapshot, CatalogError> {
        Err(CatalogError::Unsupported("Search".into()))
    }

    /// Fetch `count` items starting at `index`
    async fn read_page(
        &self,
        cancel: &CancellationToken,
        session: &str,
        snapshot: &Self::Snapshot,
        index: u32,
        count: u32,
    ) -> Result<Vec<MediaDatum>, CatalogError>;
}

/// A re-issuable catalog request
///
/// Containers keep the query that produced them so that a refresh repeats
/// exactly the same request.
#[derive(Debug, Clone)]
pub enum Query {
    Browse(Option<MediaDatum>),
    List(Tag),
    Link(Tag, String),
    Search(String),
}

impl Query {
    pub async fn run<C: CatalogClient>(
        &self,
        client: &C,
        cancel: &CancellationToken,
        session: &str,
    ) -> Result<C::Snapshot, CatalogError> {
        match self {
            Query::Browse(item) => client.browse(cancel, session, item.as_ref()).await,
            Query::List(tag) => client.list(cancel, session, tag).await,
            Query::Link(tag, value) => client.link(cancel, session, tag, value).await,
            Query::Search(text) => client.search(cancel, session, text).await,
        }
    }
}
