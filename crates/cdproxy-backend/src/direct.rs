//! Direct-backend mode: relay a `GET` against a fixed upstream base URL.

use cdproxy_core::{ProxyError, ProxyResult, check_relative_path};
use futures::{StreamExt, TryStreamExt};
use http::HeaderMap;
use http::header::{self, HeaderName};
use tracing::debug;

use crate::USER_AGENT;
use crate::fetcher::{FetchError, FetchedObject, ObjectBody, ObjectFetcher};

/// Headers that only apply to a single transport hop, or that the proxy's own
/// HTTP stack re-frames, and so must never be relayed.
pub static HOP_BY_HOP_HEADERS: [HeaderName; 11] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    HeaderName::from_static("trailers"),
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_ENCODING,
    header::CONTENT_LENGTH,
];

/// Fetches objects from an HTTP upstream by appending the request path to a
/// base URL.
///
/// The upstream response body is streamed through without buffering. Paths
/// with `.` or `..` segments are refused before any request is made, so a
/// caller can never reach upstream resources outside the base URL.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a backend for the given base URL.
    pub fn new(base_url: impl Into<String>) -> ProxyResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProxyError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a backend around an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    /// The base URL, without a trailing separator.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

#[async_trait::async_trait]
impl ObjectFetcher for HttpBackend {
    async fn fetch(&self, path: &str) -> Result<FetchedObject, FetchError> {
        check_relative_path(path)?;
        let url = self.url_for(path);
        debug!(%url, "fetching from upstream");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                FetchError::Upstream(anyhow::Error::new(e).context(format!("GET {url}")))
            })?;

        let status = response.status();
        if status == http::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(path.to_owned()));
        }
        if !status.is_success() {
            return Err(FetchError::Upstream(anyhow::anyhow!(
                "GET {url} responded with {status}"
            )));
        }

        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);

        let stream = response.bytes_stream().map_err(std::io::Error::other).boxed();

        Ok(FetchedObject {
            status,
            body: ObjectBody::Stream(stream),
            headers,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Remove hop-by-hop headers, including any extra names listed in the
/// `Connection` header.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP_HEADERS.iter().chain(listed.iter()) {
        headers.remove(name);
    }
}
