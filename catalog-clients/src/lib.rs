//! # Catalog clients
//!
//! Concrete [`CatalogClient`](media_endpoint::CatalogClient) implementations
//! for the two kinds of media endpoint found on a home network:
//!
//! - [`ContentDirectoryClient`]: any UPnP MediaServer's ContentDirectory:1
//!   service, over SOAP. Browse only.
//! - [`JsonCatalogClient`]: vendor endpoints with a session-oriented
//!   HTTP/JSON API offering browse, list, link and search.
//!
//! Both honour the cancellation token handed to every call and report
//! transport trouble as [`CatalogError::Transport`](media_endpoint::CatalogError)
//! and malformed answers as `Protocol`.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use catalog_clients::JsonCatalogClient;
//! use media_endpoint::{Supervisor, TagRegistry};
//! use watchable::WatchableThread;
//!
//! let tags = TagRegistry::new();
//! let client = JsonCatalogClient::new("http://192.168.1.30:4000/ma", ["Browse", "Search"], tags);
//! let thread = WatchableThread::new("ui")?;
//! let supervisor = Supervisor::new(Arc::new(client), thread)?;
//! ```

mod error;

pub mod content_directory;
pub mod didl;
pub mod json;

pub use content_directory::{ContentDirectoryClient, DirectorySnapshot};
pub use json::JsonCatalogClient;
