//! The proxy HTTP service implementing hyper's `Service` trait.
//!
//! [`ProxyHttpService`] handles every request in a fixed order:
//!
//! 1. CORS preflight (`OPTIONS`)
//! 2. Liveness check (`GET /status/`)
//! 3. Method check (`GET` only)
//! 4. Claims resolution and scope authorization
//! 5. Backend fetch
//! 6. Common response headers (`x-request-id`, `server`, CORS origin)

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use cdproxy_auth::{ClaimsResolver, TokenClaims};
use cdproxy_backend::ObjectFetcher;
use cdproxy_core::{ProxyConfig, ProxyError, ScopeSet, attachment_filename, authorize};
use http::header::{self, HeaderValue};
use hyper::service::Service;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::body::ProxyResponseBody;
use crate::response::{attachment_response, error_to_response, status_response};

/// Tracing target for authorization audit events.
pub const AUDIT_TARGET: &str = "cdproxy::audit";

/// Value of the `server` response header.
pub const SERVER_NAME: &str = "confidential-data-proxy";

const CORS_ALLOW_METHODS: &str = "GET, OPTIONS";
const CORS_ALLOW_HEADERS: &str =
    "authorization, content-type, x-user, x-correlation-id, x-task-description";
const CORS_MAX_AGE: &str = "86400";

/// Configuration for the proxy HTTP service.
#[derive(Debug, Clone)]
pub struct ProxyHttpConfig {
    /// Scopes a caller must hold to download anything.
    pub required_scopes: ScopeSet,
    /// Reflect any `Origin` in CORS responses.
    pub cors_allow_all_origins: bool,
    /// Origins reflected in CORS responses.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ProxyHttpConfig {
    fn default() -> Self {
        Self::from(&ProxyConfig::default())
    }
}

impl From<&ProxyConfig> for ProxyHttpConfig {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            required_scopes: config.required_scopes.clone(),
            cors_allow_all_origins: config.cors_allow_all_origins,
            cors_allowed_origins: config.cors_allowed_origins.clone(),
        }
    }
}

impl ProxyHttpConfig {
    /// Whether CORS responses may name `origin`.
    #[must_use]
    pub fn allows_origin(&self, origin: &str) -> bool {
        self.cors_allow_all_origins || self.cors_allowed_origins.iter().any(|o| o == origin)
    }
}

/// The proxy HTTP service.
///
/// Cheap to clone; all state is immutable and shared.
#[derive(Clone)]
pub struct ProxyHttpService {
    fetcher: Arc<dyn ObjectFetcher>,
    resolver: Arc<dyn ClaimsResolver>,
    config: Arc<ProxyHttpConfig>,
}

impl std::fmt::Debug for ProxyHttpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyHttpService")
            .field("fetcher", &self.fetcher.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProxyHttpService {
    /// Create a new service.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn ObjectFetcher>,
        resolver: Arc<dyn ClaimsResolver>,
        config: ProxyHttpConfig,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            config: Arc::new(config),
        }
    }
}

impl<B> Service<http::Request<B>> for ProxyHttpService
where
    B: Send + 'static,
{
    type Response = http::Response<ProxyResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        let service = self.clone();

        Box::pin(async move {
            let request_id = Uuid::new_v4().to_string();
            // The request body is never read; only `GET` is served.
            let (parts, _body) = req.into_parts();
            let origin = parts
                .headers
                .get(header::ORIGIN)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned);

            let response = service.process_request(&parts, &request_id).await;
            let response =
                add_common_headers(response, &request_id, &service.config, origin.as_deref());

            Ok(response)
        })
    }
}

impl ProxyHttpService {
    async fn process_request(
        &self,
        parts: &http::request::Parts,
        request_id: &str,
    ) -> http::Response<ProxyResponseBody> {
        let method = &parts.method;
        let path = parts.uri.path();
        debug!(%method, path, request_id, "processing request");

        if method == http::Method::OPTIONS {
            return cors_preflight_response();
        }

        if is_status_check(method, path) {
            return status_response();
        }

        if method != http::Method::GET {
            let err = ProxyError::MethodNotAllowed(method.to_string());
            warn!(%method, path, request_id, "method not allowed");
            return error_to_response(&err);
        }

        let claims = match self.resolver.resolve(parts) {
            Ok(claims) => claims.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, path, request_id, "could not read token claims");
                return error_to_response(&ProxyError::Unauthorized(err.to_string()));
            }
        };

        let granted = authorize(&self.config.required_scopes, &claims.scopes);
        audit(&claims, path, granted, request_id);
        if !granted {
            return error_to_response(&ProxyError::Forbidden);
        }

        match self.fetcher.fetch(path).await {
            Ok(object) => {
                info!(
                    path,
                    backend = self.fetcher.name(),
                    request_id,
                    "serving object"
                );
                attachment_response(object, &attachment_filename(path))
            }
            Err(err) => {
                let err = ProxyError::from(err);
                if err.is_caller_error() {
                    warn!(error = %err, path, request_id, "fetch rejected");
                } else {
                    error!(
                        error = %err,
                        path,
                        backend = self.fetcher.name(),
                        request_id,
                        "backend fault"
                    );
                }
                error_to_response(&err)
            }
        }
    }
}

/// Emit an authorization audit event.
fn audit(claims: &TokenClaims, path: &str, granted: bool, request_id: &str) {
    let decision = if granted { "granted" } else { "denied" };
    info!(
        target: AUDIT_TARGET,
        audit = true,
        principal = claims.principal(),
        subject = claims.subject.as_deref(),
        email = claims.email.as_deref(),
        path,
        decision,
        request_id,
        "download {decision}"
    );
}

/// Check if the request is a liveness check.
fn is_status_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && (path == "/status/" || path == "/status")
}

/// Produce a CORS preflight response.
fn cors_preflight_response() -> http::Response<ProxyResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header(header::ACCESS_CONTROL_ALLOW_METHODS, CORS_ALLOW_METHODS)
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, CORS_ALLOW_HEADERS)
        .header(header::ACCESS_CONTROL_MAX_AGE, CORS_MAX_AGE)
        .body(ProxyResponseBody::empty())
        .expect("static CORS response should be valid")
}

/// Add common response headers to every response.
fn add_common_headers(
    mut response: http::Response<ProxyResponseBody>,
    request_id: &str,
    config: &ProxyHttpConfig,
    origin: Option<&str>,
) -> http::Response<ProxyResponseBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = HeaderValue::from_str(request_id) {
        headers.insert("x-request-id", hv);
    }
    headers.insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));

    if let Some(origin) = origin.filter(|o| config.allows_origin(o)) {
        if let Ok(hv) = HeaderValue::from_str(origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, hv);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.append(header::VARY, HeaderValue::from_static("origin"));
        }
    }

    response
}
