//! Object fetch backends for the confidential data proxy.
//!
//! Every backend implements one capability, [`ObjectFetcher::fetch`]: given the
//! public request path, return the object's bytes and the headers to relay, or
//! a [`FetchError`]. Two implementations are provided and selected at startup:
//!
//! - [`HttpBackend`]: direct-backend mode, a `GET` against a fixed base URL
//!   whose response is streamed through with hop-by-hop headers removed.
//! - [`BlobStoreBackend`]: object-store mode, resolving the path to a key in a
//!   single container and downloading the whole object.
//!
//! Backends carry no per-request state and are shared across requests behind
//! an `Arc<dyn ObjectFetcher>`.

pub mod blob;
pub mod direct;
pub mod fetcher;

pub use blob::BlobStoreBackend;
pub use direct::HttpBackend;
pub use fetcher::{ByteStream, FetchError, FetchedObject, ObjectBody, ObjectFetcher};

/// `User-Agent` sent on outbound requests.
pub const USER_AGENT: &str = concat!("confidential-data-proxy/", env!("CARGO_PKG_VERSION"));
