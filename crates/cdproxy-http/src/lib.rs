//! HTTP layer of the confidential data proxy.
//!
//! - **Service** ([`service`]): [`ProxyHttpService`](service::ProxyHttpService),
//!   the hyper `Service` that authorizes the caller, fetches the object and
//!   maps the outcome to a response.
//! - **Response** ([`response`]): error bodies, the liveness response, and the
//!   `Content-Disposition` download response.
//! - **Server** ([`server`]): the accept loop with graceful shutdown.
//! - **Body** ([`body`]): [`ProxyResponseBody`](body::ProxyResponseBody),
//!   supporting buffered, streaming, and empty modes.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> ProxyHttpService (hyper Service)
//!     -> CORS preflight / status interception
//!     -> Method check (GET only)
//!     -> ClaimsResolver + authorize (audit event)
//!     -> ObjectFetcher::fetch
//!     -> Common response headers (x-request-id, server, CORS)
//!   <- HTTP Response
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use cdproxy_auth::ForwardedTokenResolver;
//! use cdproxy_backend::HttpBackend;
//! use cdproxy_http::{ProxyHttpConfig, ProxyHttpService};
//!
//! let fetcher = HttpBackend::new("https://api.data.example.nl/bulk").unwrap();
//! let service = ProxyHttpService::new(
//!     Arc::new(fetcher),
//!     Arc::new(ForwardedTokenResolver::new()),
//!     ProxyHttpConfig::default(),
//! );
//! // Hand `service` to `cdproxy_http::serve`.
//! ```

pub mod body;
pub mod response;
pub mod server;
pub mod service;

pub use body::ProxyResponseBody;
pub use server::serve;
pub use service::{AUDIT_TARGET, ProxyHttpConfig, ProxyHttpService, SERVER_NAME};
