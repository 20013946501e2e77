//! Vendor HTTP/JSON catalog
//!
//! The server keeps per-session query state: every query replaces the
//! session's result set and `read` pages through whatever was queried last.
//! Values are passed base64-encoded; artwork and stream locations may come
//! back relative to the server's `/res` root.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use media_endpoint::{
    CancellationToken, Capabilities, CatalogClient, CatalogError, MediaDatum, MediaValue,
    SnapshotDescriptor, Tag, TagRegistry,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{from_http, from_json, until_cancelled};

const ROOT_ID: &str = "0";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SnapshotBody {
    total: u32,
    #[serde(default)]
    alpha: Option<Vec<u32>>,
}

#[derive(Debug, Deserialize)]
struct DatumBody {
    #[serde(rename = "Id", default)]
    id: Option<String>,
    #[serde(rename = "Type", default)]
    types: Vec<String>,
    #[serde(rename = "Metadata", default)]
    metadata: Vec<Vec<String>>,
}

/// Catalog client for a vendor media endpoint speaking HTTP/JSON
pub struct JsonCatalogClient {
    base_url: String,
    http: reqwest::Client,
    tags: TagRegistry,
    capabilities: Capabilities,
}

impl JsonCatalogClient {
    /// `attributes` is the capability list the endpoint advertised
    pub fn new<I, S>(base_url: impl Into<String>, attributes: I, tags: TagRegistry) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_http_client(base_url, attributes, tags, reqwest::Client::new())
    }

    pub fn with_http_client<I, S>(
        base_url: impl Into<String>,
        attributes: I,
        tags: TagRegistry,
        http: reqwest::Client,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http,
            tags,
            capabilities: Capabilities::new(attributes),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a server-relative resource against the endpoint's `/res` root
    ///
    /// Absolute URLs pass through unchanged, except `file:` URLs which the
    /// caller could not fetch.
    pub fn resolve(&self, value: &str) -> String {
        match url::Url::parse(value) {
            Ok(url) if url.scheme() != "file" => value.to_string(),
            _ => format!("{}/res{}", self.base_url, value),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let request = self
            .http
            .get(format!("{}/{}", self.base_url, path))
            .query(query);

        let body = until_cancelled(cancel, async move {
            let response = request
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(from_http)?;
            response.text().await.map_err(from_http)
        })
        .await?;

        serde_json::from_str(&body).map_err(from_json)
    }

    async fn snapshot(
        &self,
        cancel: &CancellationToken,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<SnapshotDescriptor, CatalogError> {
        let body: SnapshotBody = self.get(cancel, path, query).await?;
        tracing::debug!(path, total = body.total, "catalog query answered");
        Ok(SnapshotDescriptor::new(body.total, body.alpha))
    }

    fn datum(&self, body: DatumBody) -> MediaDatum {
        let types = body
            .types
            .iter()
            .filter_map(|id| self.tag(id))
            .cloned()
            .collect();
        let mut builder = MediaDatum::builder(body.id, types);

        for entry in body.metadata {
            let mut values = entry.into_iter();
            let Some(tag) = values.next().and_then(|id| self.tag(&id).cloned()) else {
                continue;
            };
            let values: Vec<String> = if self.is_resource(&tag) {
                values.map(|value| self.resolve(&value)).collect()
            } else {
                values.collect()
            };
            if let Some(value) = MediaValue::from_values(values) {
                builder.add(&tag, value);
            }
        }

        builder.build()
    }

    fn tag(&self, id: &str) -> Option<&Tag> {
        let id = id.trim().parse::<u32>().ok()?;
        let tag = self.tags.by_id(id);
        if tag.is_none() {
            tracing::trace!(tag_id = id, "skipping unknown tag");
        }
        tag
    }

    fn is_resource(&self, tag: &Tag) -> bool {
        *tag == self.tags.audio.artwork
            || *tag == self.tags.container.artwork
            || *tag == self.tags.audio.uri
    }
}

fn encode(value: &str) -> String {
    BASE64.encode(value.as_bytes())
}

#[async_trait]
impl CatalogClient for JsonCatalogClient {
    type Snapshot = SnapshotDescriptor;

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn create_session(&self, cancel: &CancellationToken) -> Result<String, CatalogError> {
        self.get(cancel, "create", &[]).await
    }

    async fn destroy_session(
        &self,
        cancel: &CancellationToken,
        session: &str,
    ) -> Result<(), CatalogError> {
        let request = self
            .http
            .get(format!("{}/destroy", self.base_url))
            .query(&[("session", session)]);

        until_cancelled(cancel, async move {
            request
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(from_http)?;
            Ok(())
        })
        .await
    }

    async fn browse(
        &self,
        cancel: &CancellationToken,
        session: &str,
        item: Option<&MediaDatum>,
    ) -> Result<SnapshotDescriptor, CatalogError> {
        let id = item.and_then(MediaDatum::id).unwrap_or(ROOT_ID);
        self.snapshot(
            cancel,
            "browse",
            &[("session", session.to_string()), ("id", id.to_string())],
        )
        .await
    }

    async fn list(
        &self,
        cancel: &CancellationToken,
        session: &str,
        tag: &Tag,
    ) -> Result<SnapshotDescriptor, CatalogError> {
        self.snapshot(
            cancel,
            "list",
            &[("session", session.to_string()), ("tag", tag.id().to_string())],
        )
        .await
    }

    async fn link(
        &self,
        cancel: &CancellationToken,
        session: &str,
        tag: &Tag,
        value: &str,
    ) -> Result<SnapshotDescriptor, CatalogError> {
        self.snapshot(
            cancel,
            "link",
            &[
                ("session", session.to_string()),
                ("tag", tag.id().to_string()),
                ("val", encode(value)),
            ],
        )
        .await
    }

    async fn search(
        &self,
        cancel: &CancellationToken,
        session: &str,
        text: &str,
    ) -> Result<SnapshotDescriptor, CatalogError> {
        self.snapshot(
            cancel,
            "search",
            &[("session", session.to_string()), ("val", encode(text))],
        )
        .await
    }

    async fn read_page(
        &self,
        cancel: &CancellationToken,
        session: &str,
        _snapshot: &SnapshotDescriptor,
        index: u32,
        count: u32,
    ) -> Result<Vec<MediaDatum>, CatalogError> {
        let bodies: Vec<DatumBody> = self
            .get(
                cancel,
                "read",
                &[
                    ("session", session.to_string()),
                    ("index", index.to_string()),
                    ("count", count.to_string()),
                ],
            )
            .await?;
        Ok(bodies.into_iter().map(|body| self.datum(body)).collect())
    }
}

impl std::fmt::Debug for JsonCatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonCatalogClient")
            .field("base_url", &self.base_url)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
