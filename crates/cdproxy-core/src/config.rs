//! Proxy configuration.
//!
//! Provides [`ProxyConfig`], loaded once at startup from environment variables
//! and immutable afterwards, and [`BackendConfig`], the validated choice of
//! backend derived from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{ProxyError, ProxyResult};
use crate::key::DEFAULT_INGRESS_PREFIX;
use crate::scope::ScopeSet;

/// Default container holding the confidential objects.
pub const DEFAULT_CONTAINER: &str = "bulk-data-fp-mdw";

/// Default scope required to download objects.
pub const DEFAULT_REQUIRED_SCOPE: &str = "FP/MDW";

/// Default interval between key set refreshes, in seconds.
pub const DEFAULT_JWKS_REFRESH_SECS: u64 = 30 * 60;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Proxy configuration.
///
/// # Examples
///
/// ```
/// use cdproxy_core::config::ProxyConfig;
///
/// let config = ProxyConfig::default();
/// assert_eq!(config.gateway_listen, "0.0.0.0:8000");
/// assert!(config.required_scopes.contains("FP/MDW"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Bind address (e.g. `"0.0.0.0:8000"`).
    #[builder(default = String::from("0.0.0.0:8000"))]
    pub gateway_listen: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Log output format.
    #[builder(default)]
    pub log_format: LogFormat,

    /// Explicit backend selection (`"object-store"` or `"http"`).
    #[builder(default, setter(strip_option))]
    pub backend_mode: Option<String>,

    /// Storage account endpoint for object-store mode.
    #[builder(default, setter(strip_option))]
    pub storage_endpoint: Option<String>,

    /// Container holding the objects.
    #[builder(default = String::from(DEFAULT_CONTAINER))]
    pub storage_container: String,

    /// Managed identity client id; ambient credentials are used when unset.
    #[builder(default, setter(strip_option))]
    pub managed_identity_client_id: Option<String>,

    /// Base URL for direct-backend mode.
    #[builder(default, setter(strip_option))]
    pub upstream_base_url: Option<String>,

    /// Scopes a caller must hold.
    #[builder(default = ScopeSet::from_iter([DEFAULT_REQUIRED_SCOPE]))]
    pub required_scopes: ScopeSet,

    /// Routing prefix added by the ingress, stripped before key resolution.
    #[builder(default = String::from(DEFAULT_INGRESS_PREFIX))]
    pub ingress_prefix: String,

    /// Whether any `Origin` is allowed.
    #[builder(default = false)]
    pub cors_allow_all_origins: bool,

    /// Origins allowed to read responses.
    #[builder(default)]
    pub cors_allowed_origins: Vec<String>,

    /// Inline JSON Web Key Set used to verify bearer tokens.
    #[builder(default, setter(strip_option))]
    pub pub_jwks: Option<String>,

    /// URL of the identity provider's JSON Web Key Set.
    #[builder(default, setter(strip_option))]
    pub oauth_jwks_url: Option<String>,

    /// Claims every token must carry with exactly these values.
    #[builder(default)]
    pub oauth_check_claims: BTreeMap<String, String>,

    /// Seconds between refreshes of a key set fetched from `oauth_jwks_url`.
    #[builder(default = DEFAULT_JWKS_REFRESH_SECS)]
    pub jwks_refresh_secs: u64,

    /// Skip signature verification and trust tokens as forwarded by a
    /// verifying gateway.
    #[builder(default = false)]
    pub trust_forwarded_token: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The backend the proxy fetches objects from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Blob container in a storage account.
    ObjectStore {
        /// Storage account endpoint URL.
        endpoint: String,
        /// Container name.
        container: String,
        /// Optional managed identity client id.
        client_id: Option<String>,
    },
    /// Plain HTTP upstream.
    Http {
        /// Base URL the request path is appended to.
        base_url: String,
    },
}

impl ProxyConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:8000` |
    /// | `LOG_LEVEL` | `info` |
    /// | `LOG_FORMAT` | `text` |
    /// | `PROXY_BACKEND` | *(auto)* |
    /// | `AZURE_STORAGE_CONTAINER_ENDPOINT` | *(unset)* |
    /// | `AZURE_STORAGE_CONTAINER` | `bulk-data-fp-mdw` |
    /// | `AZURE_CLIENT_ID` | *(unset)* |
    /// | `DSO_API_BASE_URL` | *(unset)* |
    /// | `REQUIRED_SCOPES` | `FP/MDW` |
    /// | `INGRESS_PREFIX` | `bulk-data-fp-mdw` |
    /// | `CORS_ALLOW_ALL_ORIGINS` | `false` |
    /// | `CORS_ALLOWED_ORIGINS` | *(empty)* |
    /// | `PUB_JWKS` | *(unset)* |
    /// | `OAUTH_JWKS_URL` | *(unset)* |
    /// | `OAUTH_CHECK_CLAIMS` | *(empty)* |
    /// | `JWKS_REFRESH_SECS` | `1800` |
    /// | `TRUST_FORWARDED_TOKEN` | `false` |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = var("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Some(v) = var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = var("LOG_FORMAT") {
            config.log_format = LogFormat::parse(&v);
        }
        config.backend_mode = var("PROXY_BACKEND");
        config.storage_endpoint = var("AZURE_STORAGE_CONTAINER_ENDPOINT");
        if let Some(v) = var("AZURE_STORAGE_CONTAINER") {
            config.storage_container = v;
        }
        config.managed_identity_client_id = var("AZURE_CLIENT_ID");
        config.upstream_base_url = var("DSO_API_BASE_URL");
        if let Some(v) = var("REQUIRED_SCOPES") {
            config.required_scopes = ScopeSet::parse(&v);
        }
        // An explicitly empty prefix disables stripping, so read it raw.
        if let Some(v) = lookup("INGRESS_PREFIX") {
            config.ingress_prefix = v.trim().trim_matches('/').to_owned();
        }
        if let Some(v) = var("CORS_ALLOW_ALL_ORIGINS") {
            config.cors_allow_all_origins = parse_bool(&v);
        }
        if let Some(v) = var("CORS_ALLOWED_ORIGINS") {
            config.cors_allowed_origins = parse_list(&v);
        }
        config.pub_jwks = var("PUB_JWKS");
        config.oauth_jwks_url = var("OAUTH_JWKS_URL");
        if let Some(v) = var("OAUTH_CHECK_CLAIMS") {
            config.oauth_check_claims = parse_pairs(&v);
        }
        if let Some(secs) = var("JWKS_REFRESH_SECS").and_then(|v| v.trim().parse().ok()) {
            config.jwks_refresh_secs = secs;
        }
        if let Some(v) = var("TRUST_FORWARDED_TOKEN") {
            config.trust_forwarded_token = parse_bool(&v);
        }

        config
    }

    /// Select and validate the backend.
    ///
    /// An explicit `backend_mode` wins; otherwise object-store mode is chosen
    /// when a storage endpoint is configured, and direct HTTP mode when only
    /// an upstream base URL is.
    pub fn backend(&self) -> ProxyResult<BackendConfig> {
        let object_store = || -> ProxyResult<BackendConfig> {
            let endpoint = self.storage_endpoint.clone().ok_or_else(|| {
                ProxyError::Config(
                    "AZURE_STORAGE_CONTAINER_ENDPOINT is required for object-store mode".to_owned(),
                )
            })?;
            Ok(BackendConfig::ObjectStore {
                endpoint,
                container: self.storage_container.clone(),
                client_id: self.managed_identity_client_id.clone(),
            })
        };
        let http = || -> ProxyResult<BackendConfig> {
            let base_url = self.upstream_base_url.clone().ok_or_else(|| {
                ProxyError::Config("DSO_API_BASE_URL is required for http mode".to_owned())
            })?;
            Ok(BackendConfig::Http { base_url })
        };

        match self.backend_mode.as_deref().map(str::to_ascii_lowercase) {
            Some(mode) if mode == "object-store" || mode == "azure" => object_store(),
            Some(mode) if mode == "http" => http(),
            Some(mode) => Err(ProxyError::Config(format!(
                "unknown PROXY_BACKEND {mode:?}, expected \"object-store\" or \"http\""
            ))),
            None if self.storage_endpoint.is_some() => object_store(),
            None if self.upstream_base_url.is_some() => http(),
            None => Err(ProxyError::Config(
                "no backend configured: set AZURE_STORAGE_CONTAINER_ENDPOINT or DSO_API_BASE_URL"
                    .to_owned(),
            )),
        }
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Parse `key=value` pairs separated by commas; entries without `=` are
/// ignored.
fn parse_pairs(value: &str) -> BTreeMap<String, String> {
    value
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}
