//! UPnP ContentDirectory catalog
//!
//! A stateless SOAP service: sessions are allocated locally and only
//! `Browse` is offered. Each blocking SOAP call runs on tokio's blocking
//! pool and is abandoned as soon as the cancellation token fires.

use async_trait::async_trait;
use media_endpoint::{
    CancellationToken, Capabilities, CatalogClient, CatalogError, CatalogSnapshot, MediaDatum,
    TagRegistry,
};
use soap_client::{child_text, xml_escape, SoapClient};
use uuid::Uuid;
use xmltree::Element;

use crate::didl;
use crate::error::{from_soap, until_cancelled};

const SERVICE_URI: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";
const ROOT_OBJECT: &str = "0";

/// Result set of one `Browse`: the browsed object and its child count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySnapshot {
    object_id: String,
    total: u32,
}

impl DirectorySnapshot {
    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

impl CatalogSnapshot for DirectorySnapshot {
    fn total(&self) -> u32 {
        self.total
    }

    fn alpha(&self) -> Option<&[u32]> {
        None
    }
}

/// Catalog client for a ContentDirectory:1 control URL
pub struct ContentDirectoryClient {
    control_url: String,
    soap: SoapClient,
    tags: TagRegistry,
    capabilities: Capabilities,
}

impl ContentDirectoryClient {
    pub fn new(control_url: impl Into<String>, tags: TagRegistry) -> Self {
        Self::with_soap_client(control_url, tags, SoapClient::new())
    }

    pub fn with_soap_client(
        control_url: impl Into<String>,
        tags: TagRegistry,
        soap: SoapClient,
    ) -> Self {
        Self {
            control_url: control_url.into(),
            soap,
            tags,
            capabilities: Capabilities::new(["Browse"]),
        }
    }

    pub fn control_url(&self) -> &str {
        &self.control_url
    }

    async fn browse_children(
        &self,
        cancel: &CancellationToken,
        object_id: &str,
        starting_index: u32,
        requested_count: u32,
    ) -> Result<Element, CatalogError> {
        let payload = format!(
            "<ObjectID>{}</ObjectID>\
             <BrowseFlag>BrowseDirectChildren</BrowseFlag>\
             <Filter></Filter>\
             <StartingIndex>{}</StartingIndex>\
             <RequestedCount>{}</RequestedCount>\
             <SortCriteria></SortCriteria>",
            xml_escape(object_id),
            starting_index,
            requested_count
        );
        let soap = self.soap.clone();
        let control_url = self.control_url.clone();

        until_cancelled(cancel, async move {
            tokio::task::spawn_blocking(move || {
                soap.call(&control_url, SERVICE_URI, "Browse", &payload)
            })
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?
            .map_err(from_soap)
        })
        .await
    }
}

#[async_trait]
impl CatalogClient for ContentDirectoryClient {
    type Snapshot = DirectorySnapshot;

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn create_session(&self, cancel: &CancellationToken) -> Result<String, CatalogError> {
        if cancel.is_cancelled() {
            return Err(CatalogError::Canceled);
        }
        Ok(Uuid::new_v4().to_string())
    }

    async fn destroy_session(
        &self,
        _cancel: &CancellationToken,
        _session: &str,
    ) -> Result<(), CatalogError> {
        Ok(())
    }

    async fn browse(
        &self,
        cancel: &CancellationToken,
        _session: &str,
        item: Option<&MediaDatum>,
    ) -> Result<DirectorySnapshot, CatalogError> {
        let object_id = match item {
            None => ROOT_OBJECT,
            Some(item) => item
                .id()
                .ok_or_else(|| CatalogError::Protocol("cannot browse an item without id".into()))?,
        };

        let response = self.browse_children(cancel, object_id, 0, 1).await?;
        let total = child_text(&response, "TotalMatches")
            .trim()
            .parse::<u32>()
            .map_err(|e| CatalogError::Protocol(format!("TotalMatches: {e}")))?;

        tracing::debug!(object_id, total, "browsed content directory");
        Ok(DirectorySnapshot {
            object_id: object_id.to_string(),
            total,
        })
    }

    async fn read_page(
        &self,
        cancel: &CancellationToken,
        _session: &str,
        snapshot: &DirectorySnapshot,
        index: u32,
        count: u32,
    ) -> Result<Vec<MediaDatum>, CatalogError> {
        let response = self
            .browse_children(cancel, &snapshot.object_id, index, count)
            .await?;
        Ok(didl::parse(&child_text(&response, "Result"), &self.tags))
    }
}

impl std::fmt::Debug for ContentDirectoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentDirectoryClient")
            .field("control_url", &self.control_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sessions_are_local() {
        let client = ContentDirectoryClient::new("http://127.0.0.1:1/cd", TagRegistry::new());
        let cancel = CancellationToken::new();

        let first = client.create_session(&cancel).await.unwrap();
        let second = client.create_session(&cancel).await.unwrap();
        assert_ne!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
        assert_eq!(client.destroy_session(&cancel, &first).await, Ok(()));
    }

    #[tokio::test]
    async fn test_only_browse_is_offered() {
        let tags = TagRegistry::new();
        let client = ContentDirectoryClient::new("http://127.0.0.1:1/cd", tags.clone());
        let cancel = CancellationToken::new();

        assert!(client.capabilities().supports_browse());
        assert!(!client.capabilities().supports_search());
        assert!(matches!(
            client.list(&cancel, "s", &tags.audio.artist).await,
            Err(CatalogError::Unsupported(_))
        ));
        assert!(matches!(
            client.search(&cancel, "s", "jazz").await,
            Err(CatalogError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_canceled_token_skips_request() {
        let client = ContentDirectoryClient::new("http://127.0.0.1:1/cd", TagRegistry::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(client.create_session(&cancel).await, Err(CatalogError::Canceled));
        assert_eq!(
            client.browse(&cancel, "s", None).await,
            Err(CatalogError::Canceled)
        );
    }
}
