//! Object-store mode: read objects from a blob container.
//!
//! Production deployments point this at an Azure Blob Storage container and
//! authenticate with a managed identity. Tests use an in-memory store.

use std::sync::Arc;

use bytes::Bytes;
use cdproxy_core::{ObjectKey, ProxyError, ProxyResult};
use http::header::{self, HeaderMap, HeaderValue};
use object_store::ObjectStore;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::path::Path;
use tracing::{debug, info};

use crate::fetcher::{FetchError, FetchedObject, ObjectBody, ObjectFetcher};

/// `Last-Modified` rendering (RFC 7231 IMF-fixdate).
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Fetches objects from a blob container, buffering each object in full.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use cdproxy_backend::{BlobStoreBackend, FetchError, ObjectFetcher};
/// use object_store::memory::InMemory;
///
/// # tokio_test::block_on(async {
/// let backend = BlobStoreBackend::new(Arc::new(InMemory::new()), "bulk-data-fp-mdw");
/// let err = backend.fetch("/bulk-data-fp-mdw/").await.unwrap_err();
/// assert!(matches!(err, FetchError::MalformedPath(_)));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct BlobStoreBackend {
    store: Arc<dyn ObjectStore>,
    ingress_prefix: String,
}

impl BlobStoreBackend {
    /// Wrap an existing store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, ingress_prefix: impl Into<String>) -> Self {
        Self {
            store,
            ingress_prefix: ingress_prefix.into(),
        }
    }

    /// Connect to an Azure Blob Storage container.
    ///
    /// Credentials are taken from the environment (`AZURE_*` variables), with
    /// `client_id` selecting a user-assigned managed identity.
    pub fn azure(
        endpoint: &str,
        container: &str,
        client_id: Option<&str>,
        ingress_prefix: impl Into<String>,
    ) -> ProxyResult<Self> {
        let mut builder = MicrosoftAzureBuilder::from_env()
            .with_url(endpoint)
            .with_container_name(container);
        if let Some(client_id) = client_id {
            builder = builder.with_client_id(client_id);
        }
        let store = builder.build().map_err(|e| {
            ProxyError::Config(format!("invalid blob storage configuration: {e}"))
        })?;

        info!(endpoint, container, "configured blob storage backend");
        Ok(Self::new(Arc::new(store), ingress_prefix))
    }
}

#[async_trait::async_trait]
impl ObjectFetcher for BlobStoreBackend {
    async fn fetch(&self, path: &str) -> Result<FetchedObject, FetchError> {
        let key = ObjectKey::resolve(path, &self.ingress_prefix)?;
        let location =
            Path::parse(key.as_str()).map_err(|e| FetchError::MalformedPath(e.to_string()))?;
        debug!(key = %key, "fetching from blob storage");

        let meta = self
            .store
            .head(&location)
            .await
            .map_err(|e| store_error(&key, e))?;

        let bytes: Bytes = self
            .store
            .get(&location)
            .await
            .map_err(|e| store_error(&key, e))?
            .bytes()
            .await
            .map_err(|e| store_error(&key, e))?;

        let mut headers = HeaderMap::new();
        let content_type = mime_guess::from_path(key.as_str())
            .first()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
        if let Ok(value) = HeaderValue::from_str(content_type.essence_str()) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        if let Ok(value) =
            HeaderValue::from_str(&meta.last_modified.format(HTTP_DATE_FORMAT).to_string())
        {
            headers.insert(header::LAST_MODIFIED, value);
        }
        if let Some(value) = meta
            .e_tag
            .as_deref()
            .and_then(|etag| HeaderValue::from_str(etag).ok())
        {
            headers.insert(header::ETAG, value);
        }

        Ok(FetchedObject {
            status: http::StatusCode::OK,
            body: ObjectBody::Buffered(bytes),
            headers,
        })
    }

    fn name(&self) -> &'static str {
        "object-store"
    }
}

fn store_error(key: &ObjectKey, err: object_store::Error) -> FetchError {
    match err {
        object_store::Error::NotFound { .. } => FetchError::NotFound(key.to_string()),
        other => FetchError::Upstream(anyhow::Error::new(other).context(format!("reading {key}"))),
    }
}
