//! Proxy response body supporting buffered, streaming, and empty modes.
//!
//! - **Buffered**: objects downloaded in full and small JSON payloads.
//! - **Streaming**: upstream bodies relayed chunk by chunk in direct mode.
//! - **Empty**: error responses without a body and CORS preflights.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use cdproxy_backend::{ByteStream, ObjectBody};
use futures::StreamExt;
use http_body_util::Full;

/// Response body type of the proxy service.
///
/// Implements [`http_body::Body`] so it can be used directly with hyper responses.
#[derive(Default)]
pub enum ProxyResponseBody {
    /// Fully buffered bytes.
    Buffered(Full<Bytes>),
    /// Chunks relayed from a backend stream.
    Streaming(ByteStream),
    /// No body.
    #[default]
    Empty,
}

impl fmt::Debug for ProxyResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered(full) => f.debug_tuple("Buffered").field(full).finish(),
            Self::Streaming(_) => f.write_str("Streaming(..)"),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

impl ProxyResponseBody {
    /// Create a buffered body from bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// Create an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Create a buffered body from a UTF-8 string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self::Buffered(Full::new(Bytes::from(s.into())))
    }
}

impl From<ObjectBody> for ProxyResponseBody {
    fn from(body: ObjectBody) -> Self {
        match body {
            ObjectBody::Buffered(bytes) => Self::from_bytes(bytes),
            ObjectBody::Stream(stream) => Self::Streaming(stream),
        }
    }
}

impl http_body::Body for ProxyResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Streaming(stream) => stream
                .poll_next_unpin(cx)
                .map(|chunk| chunk.map(|result| result.map(http_body::Frame::data))),
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Streaming(_) => false,
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Streaming(_) => http_body::SizeHint::default(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}
