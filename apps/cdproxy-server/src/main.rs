//! Confidential data proxy server.
//!
//! Serves downloads of confidential bulk-data files to callers holding the
//! required scopes, fetching objects either from an Azure Blob Storage
//! container or from an upstream HTTP API.
//!
//! # Usage
//!
//! ```text
//! AZURE_STORAGE_CONTAINER_ENDPOINT=https://account.blob.core.windows.net cdproxy-server
//! DSO_API_BASE_URL=https://api.data.example.nl/bulk cdproxy-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:8000` | Bind address |
//! | `PROXY_BACKEND` | *(auto)* | `object-store` or `http` |
//! | `AZURE_STORAGE_CONTAINER_ENDPOINT` | *(unset)* | Storage account URL |
//! | `AZURE_STORAGE_CONTAINER` | `bulk-data-fp-mdw` | Container name |
//! | `AZURE_CLIENT_ID` | *(unset)* | Managed identity client id |
//! | `DSO_API_BASE_URL` | *(unset)* | Upstream base URL for direct mode |
//! | `REQUIRED_SCOPES` | `FP/MDW` | Scopes required to download |
//! | `INGRESS_PREFIX` | `bulk-data-fp-mdw` | Routing prefix stripped from keys |
//! | `PUB_JWKS` | *(unset)* | Inline JSON Web Key Set for token verification |
//! | `OAUTH_JWKS_URL` | *(unset)* | JSON Web Key Set URL for token verification |
//! | `OAUTH_CHECK_CLAIMS` | *(empty)* | `claim=value` pairs every token must carry |
//! | `JWKS_REFRESH_SECS` | `1800` | Refresh interval for `OAUTH_JWKS_URL` keys |
//! | `TRUST_FORWARDED_TOKEN` | `false` | Skip verification behind a verifying gateway |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `LOG_FORMAT` | `text` | `text` or `json` |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cdproxy_auth::{ClaimsResolver, ForwardedTokenResolver, JwksTokenResolver, KeySetSource};
use cdproxy_backend::{BlobStoreBackend, HttpBackend, ObjectFetcher};
use cdproxy_core::{BackendConfig, LogFormat, ProxyConfig};
use cdproxy_http::{ProxyHttpConfig, ProxyHttpService};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str, format: LogFormat) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }

    Ok(())
}

/// Build the object fetcher selected by the configuration.
fn build_fetcher(config: &ProxyConfig) -> Result<Arc<dyn ObjectFetcher>> {
    let fetcher: Arc<dyn ObjectFetcher> = match config.backend()? {
        BackendConfig::ObjectStore {
            endpoint,
            container,
            client_id,
        } => Arc::new(BlobStoreBackend::azure(
            &endpoint,
            &container,
            client_id.as_deref(),
            config.ingress_prefix.clone(),
        )?),
        BackendConfig::Http { base_url } => Arc::new(HttpBackend::new(base_url)?),
    };
    Ok(fetcher)
}

/// Build the claims resolver selected by the configuration.
///
/// Tokens are verified against the configured key set unless
/// `TRUST_FORWARDED_TOKEN` is set. Keys fetched from `OAUTH_JWKS_URL` are
/// refreshed in the background.
async fn build_resolver(config: &ProxyConfig) -> Result<Arc<dyn ClaimsResolver>> {
    if config.trust_forwarded_token {
        warn!("TRUST_FORWARDED_TOKEN is set: token signatures are not verified");
        return Ok(Arc::new(ForwardedTokenResolver::new()));
    }

    let source = KeySetSource::new(config.pub_jwks.clone(), config.oauth_jwks_url.clone());
    if source.is_empty() {
        anyhow::bail!(
            "PUB_JWKS or OAUTH_JWKS_URL is required to verify tokens \
             (set TRUST_FORWARDED_TOKEN=true behind a verifying gateway)"
        );
    }

    let key_set = source.load().await.context("failed to load token keys")?;
    let resolver = Arc::new(
        JwksTokenResolver::new(&key_set)
            .context("failed to load token keys")?
            .with_check_claims(config.oauth_check_claims.clone()),
    );
    info!(keys = resolver.key_count(), "token verification enabled");

    if source.url().is_some() {
        let period = Duration::from_secs(config.jwks_refresh_secs.max(1));
        tokio::spawn(refresh_keys(Arc::clone(&resolver), source, period));
    }

    Ok(resolver)
}

/// Reload the key set every `period`; failures keep the current keys.
async fn refresh_keys(resolver: Arc<JwksTokenResolver>, source: KeySetSource, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // The first tick completes immediately; keys were just loaded.
    interval.tick().await;
    loop {
        interval.tick().await;
        match source.load().await {
            Ok(key_set) => match resolver.replace_keys(&key_set) {
                Ok(keys) => info!(keys, "refreshed token keys"),
                Err(e) => warn!(error = %e, "keeping current token keys"),
            },
            Err(e) => warn!(error = %e, "keeping current token keys"),
        }
    }
}

/// Perform a health check by connecting to the listener and requesting `/status/`.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /status/ HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"online\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let config = ProxyConfig::from_env();
        let addr = config.gateway_listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    let config = ProxyConfig::from_env();

    init_tracing(&config.log_level, config.log_format)?;

    let fetcher = build_fetcher(&config)?;
    let resolver = build_resolver(&config).await?;

    info!(
        gateway_listen = %config.gateway_listen,
        backend = fetcher.name(),
        required_scopes = %config.required_scopes,
        ingress_prefix = %config.ingress_prefix,
        version = VERSION,
        "starting confidential data proxy",
    );

    let service = ProxyHttpService::new(fetcher, resolver, ProxyHttpConfig::from(&config));

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    cdproxy_http::serve(listener, service, async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    })
    .await;

    Ok(())
}
