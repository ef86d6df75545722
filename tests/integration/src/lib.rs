//! Integration tests for the confidential data proxy.
//!
//! Each test starts the real [`ProxyHttpService`] on an ephemeral port and
//! drives it over HTTP with `reqwest`. Object-store mode runs against an
//! in-memory store; direct mode runs against a small hyper upstream started
//! alongside the proxy. Callers present HS256 tokens that the proxy verifies
//! against [`signing_key_set`].
//!
//! ```text
//! cargo test -p cdproxy-integration
//! ```

use std::convert::Infallible;
use std::sync::{Arc, Once};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use cdproxy_auth::JwksTokenResolver;
use cdproxy_backend::{BlobStoreBackend, HttpBackend, ObjectFetcher};
use cdproxy_http::{ProxyHttpConfig, ProxyHttpService};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Scope required by the default proxy configuration.
pub const REQUIRED_SCOPE: &str = "FP/MDW";

/// Key id of the identity provider key trusted by test proxies.
pub const SIGNING_KID: &str = "integration";

/// HMAC secret of the identity provider key trusted by test proxies.
pub const SIGNING_SECRET: &[u8] = b"integration-signing-secret-0123456789";

/// The key set test proxies verify tokens against.
#[must_use]
pub fn signing_key_set() -> JwkSet {
    serde_json::from_value(serde_json::json!({
        "keys": [{
            "kty": "oct",
            "kid": SIGNING_KID,
            "k": URL_SAFE_NO_PAD.encode(SIGNING_SECRET),
        }]
    }))
    .expect("valid key set")
}

/// Start the proxy with the given fetcher and return its base URL.
pub async fn spawn_proxy(fetcher: Arc<dyn ObjectFetcher>, config: ProxyHttpConfig) -> String {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind proxy listener");
    let addr = listener.local_addr().expect("proxy address");
    let resolver = JwksTokenResolver::new(&signing_key_set()).expect("usable key set");
    let service = ProxyHttpService::new(fetcher, Arc::new(resolver), config);

    tokio::spawn(cdproxy_http::serve(
        listener,
        service,
        std::future::pending(),
    ));

    format!("http://{addr}")
}

/// Start the proxy in object-store mode over an in-memory container holding
/// `objects`.
pub async fn spawn_blob_proxy(objects: &[(&str, &'static [u8])]) -> String {
    let store = InMemory::new();
    for (key, bytes) in objects {
        store
            .put(
                &Path::parse(*key).expect("valid object key"),
                PutPayload::from_static(bytes),
            )
            .await
            .unwrap_or_else(|e| panic!("failed to store {key}: {e}"));
    }
    let fetcher = BlobStoreBackend::new(Arc::new(store), "bulk-data-fp-mdw");
    spawn_proxy(Arc::new(fetcher), ProxyHttpConfig::default()).await
}

/// Start the proxy in direct mode in front of [`spawn_upstream`].
pub async fn spawn_direct_proxy() -> String {
    let upstream = spawn_upstream().await;
    let fetcher = HttpBackend::new(upstream).expect("build HTTP backend");
    spawn_proxy(Arc::new(fetcher), ProxyHttpConfig::default()).await
}

/// Start a fake upstream API and return its base URL.
///
/// - `/file.zip`: `200` with body `0000` and a handful of hop-by-hop headers.
/// - `/partial.zip`: `206` with body `00`.
/// - `/broken.zip`: `502`.
/// - `/secret`: `200`; must never be reached through the proxy.
/// - anything else: `404`.
pub async fn spawn_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream listener");
    let addr = listener.local_addr().expect("upstream address");

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let http = HttpConnBuilder::new(TokioExecutor::new());
                let _ = http
                    .serve_connection(TokioIo::new(stream), service_fn(upstream_response))
                    .await;
            });
        }
    });

    format!("http://{addr}")
}

async fn upstream_response(
    req: hyper::Request<Incoming>,
) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
    let builder = hyper::Response::builder();
    let response = match req.uri().path() {
        "/file.zip" => builder
            .header("content-type", "application/zip")
            .header("keep-alive", "timeout=5")
            .header("proxy-authenticate", "Basic")
            .header("x-upstream", "dso")
            .body(Full::new(Bytes::from_static(b"0000"))),
        "/partial.zip" => builder
            .status(206)
            .header("content-range", "bytes 0-1/4")
            .body(Full::new(Bytes::from_static(b"00"))),
        "/broken.zip" => builder.status(502).body(Full::new(Bytes::new())),
        "/secret" => builder.body(Full::new(Bytes::from_static(b"secret"))),
        _ => builder.status(404).body(Full::new(Bytes::new())),
    };
    Ok(response.expect("valid upstream response"))
}

/// `Authorization` header value carrying a signed token with the given
/// scopes.
#[must_use]
pub fn bearer(scopes: &[&str]) -> String {
    bearer_signed_with(scopes, SIGNING_SECRET)
}

/// Like [`bearer`], but signed with an arbitrary HMAC secret.
#[must_use]
pub fn bearer_signed_with(scopes: &[&str], secret: &[u8]) -> String {
    let claims = serde_json::json!({
        "sub": "integration-user",
        "email": "integration@example.nl",
        "scopes": scopes,
        "exp": 4_102_444_800_u64,
    });
    let header = Header {
        kid: Some(SIGNING_KID.to_owned()),
        ..Header::new(Algorithm::HS256)
    };
    let token = jsonwebtoken::encode(&header, &claims, &EncodingKey::from_secret(secret))
        .expect("sign token");
    format!("Bearer {token}")
}

/// `Authorization` header value carrying an unsigned (`alg: none`) token.
#[must_use]
pub fn bearer_unsigned(scopes: &[&str]) -> String {
    let claims = serde_json::json!({ "scopes": scopes, "exp": 4_102_444_800_u64 });
    format!(
        "Bearer {}.{}.forged",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// `GET {base}{path}` as a caller holding `scopes`.
pub async fn get_with_scopes(base: &str, path: &str, scopes: &[&str]) -> reqwest::Response {
    reqwest::Client::new()
        .get(format!("{base}{path}"))
        .header("authorization", bearer(scopes))
        .send()
        .await
        .unwrap_or_else(|e| panic!("GET {path} failed: {e}"))
}

/// Send `GET {path}` without client-side path normalization and return the
/// raw response head and body.
///
/// `reqwest` resolves `..` and `%2e%2e` segments before sending, so paths
/// that must reach the proxy verbatim go through a plain socket.
pub async fn raw_get(base: &str, path: &str, authorization: &str) -> String {
    let addr = base.trim_start_matches("http://");
    let mut stream = TcpStream::connect(addr).await.expect("connect to proxy");
    let request = format!(
        "GET {path} HTTP/1.1\r\nHost: {addr}\r\nAuthorization: {authorization}\r\n\
         Connection: close\r\n\r\n"
    );
    stream
        .write_all(request.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    response
}

mod test_auth;
mod test_cors;
mod test_download;
