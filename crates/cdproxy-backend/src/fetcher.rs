//! The backend capability shared by all fetch strategies.

use std::fmt;

use bytes::Bytes;
use cdproxy_core::ProxyError;
use futures::stream::BoxStream;

/// A once-readable stream of body chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// The bytes of a fetched object.
pub enum ObjectBody {
    /// The whole object, already in memory.
    Buffered(Bytes),
    /// A stream relayed from the backend as it arrives.
    Stream(ByteStream),
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[cfg(test)]
impl ObjectBody {
    /// Collect the body into memory.
    pub(crate) async fn into_bytes(self) -> Result<Bytes, std::io::Error> {
        use futures::TryStreamExt;

        match self {
            Self::Buffered(bytes) => Ok(bytes),
            Self::Stream(stream) => {
                let chunks: Vec<Bytes> = stream.try_collect().await?;
                Ok(chunks.concat().into())
            }
        }
    }
}

/// A successfully fetched object.
///
/// Owned by the request handler until the response body has been written out.
#[derive(Debug)]
pub struct FetchedObject {
    /// Success status to answer with; `200` unless the backend reported
    /// another 2xx (e.g. `206` for a partial body).
    pub status: http::StatusCode,
    /// The object bytes.
    pub body: ObjectBody,
    /// Headers to relay to the caller.
    pub headers: http::HeaderMap,
}

impl FetchedObject {
    /// An in-memory object without relayed headers.
    #[must_use]
    pub fn buffered(bytes: impl Into<Bytes>) -> Self {
        Self {
            status: http::StatusCode::OK,
            body: ObjectBody::Buffered(bytes.into()),
            headers: http::HeaderMap::new(),
        }
    }
}

/// Why a fetch did not produce an object.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The path does not address a single object.
    #[error("malformed object path: {0}")]
    MalformedPath(String),

    /// The object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Connectivity, authentication, or transport failure. Never retried.
    #[error("upstream error: {0:#}")]
    Upstream(#[source] anyhow::Error),
}

impl From<FetchError> for ProxyError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::MalformedPath(msg) => Self::MalformedPath(msg),
            FetchError::NotFound(key) => Self::NotFound(key),
            FetchError::Upstream(source) => Self::Upstream(source),
        }
    }
}

impl From<ProxyError> for FetchError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::MalformedPath(msg) => Self::MalformedPath(msg),
            ProxyError::NotFound(key) => Self::NotFound(key),
            ProxyError::Upstream(source) => Self::Upstream(source),
            other => Self::Upstream(anyhow::Error::new(other)),
        }
    }
}

/// Fetch an object addressed by a public request path.
///
/// # Object Safety
///
/// Uses `async-trait` boxing so implementations can be shared as
/// `Arc<dyn ObjectFetcher>`.
#[async_trait::async_trait]
pub trait ObjectFetcher: Send + Sync + 'static {
    /// Fetch the object addressed by `path` (the raw request path, starting
    /// with `/`).
    async fn fetch(&self, path: &str) -> Result<FetchedObject, FetchError>;

    /// Short name of the backend, used in logs.
    fn name(&self) -> &'static str;
}
