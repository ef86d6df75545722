//! Signature-verifying claims resolver backed by a JSON Web Key Set.
//!
//! Tokens are checked against the identity provider's published keys, given
//! inline (`PUB_JWKS`) and/or fetched from a URL (`OAUTH_JWKS_URL`). Keys are
//! loaded before serving starts and can be swapped while serving with
//! [`JwksTokenResolver::replace_keys`].

use std::collections::BTreeMap;
use std::fmt;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{DecodingKey, Validation};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::claims::TokenClaims;
use crate::error::AuthError;
use crate::resolver::{ClaimsResolver, bearer_token};

/// Where verification keys come from: an inline JWKS document, a JWKS URL, or
/// both (keys are merged).
#[derive(Debug, Clone, Default)]
pub struct KeySetSource {
    inline: Option<String>,
    url: Option<String>,
    client: reqwest::Client,
}

impl KeySetSource {
    /// Create a source from an inline JWKS document and a JWKS URL.
    #[must_use]
    pub fn new(inline: Option<String>, url: Option<String>) -> Self {
        Self {
            inline,
            url,
            client: reqwest::Client::new(),
        }
    }

    /// Whether neither an inline document nor a URL is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inline.is_none() && self.url.is_none()
    }

    /// The JWKS URL, when keys are fetched remotely.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Load the merged key set.
    pub async fn load(&self) -> Result<JwkSet, AuthError> {
        let mut key_set = JwkSet { keys: Vec::new() };
        if let Some(inline) = &self.inline {
            let parsed: JwkSet = serde_json::from_str(inline)
                .map_err(|e| AuthError::KeySet(format!("inline JWKS is invalid: {e}")))?;
            key_set.keys.extend(parsed.keys);
        }
        if let Some(url) = &self.url {
            key_set.keys.extend(self.fetch(url).await?.keys);
        }
        Ok(key_set)
    }

    async fn fetch(&self, url: &str) -> Result<JwkSet, AuthError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AuthError::KeySet(format!("GET {url}: {e}")))?;
        let key_set: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeySet(format!("GET {url}: {e}")))?;
        debug!(url, keys = key_set.keys.len(), "fetched key set");
        Ok(key_set)
    }
}

struct VerificationKey {
    kid: Option<String>,
    key: DecodingKey,
}

/// Verifies bearer tokens against a JSON Web Key Set before reading their
/// claims.
///
/// A token is accepted only when:
///
/// - its signature verifies with a key from the set, using the algorithm named
///   in its header (`alg: none` never parses, and a key only verifies
///   algorithms of its own family),
/// - `exp` is present and not passed, and `nbf` (when present) has passed,
/// - every configured claim check holds.
pub struct JwksTokenResolver {
    keys: RwLock<Vec<VerificationKey>>,
    check_claims: BTreeMap<String, String>,
}

impl fmt::Debug for JwksTokenResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwksTokenResolver")
            .field("keys", &self.key_count())
            .field("check_claims", &self.check_claims)
            .finish()
    }
}

impl JwksTokenResolver {
    /// Create a resolver for the given key set.
    ///
    /// Keys that cannot be used for verification are skipped; a set with no
    /// usable key at all is an error.
    pub fn new(key_set: &JwkSet) -> Result<Self, AuthError> {
        Ok(Self {
            keys: RwLock::new(decoding_keys(key_set)?),
            check_claims: BTreeMap::new(),
        })
    }

    /// Require each named claim to equal the given value (or, for array
    /// claims such as `aud`, to contain it).
    #[must_use]
    pub fn with_check_claims(mut self, check_claims: BTreeMap<String, String>) -> Self {
        self.check_claims = check_claims;
        self
    }

    /// Swap in a new key set, returning the number of usable keys.
    ///
    /// The current keys stay in place when the new set holds no usable key.
    pub fn replace_keys(&self, key_set: &JwkSet) -> Result<usize, AuthError> {
        let keys = decoding_keys(key_set)?;
        let count = keys.len();
        *self.keys.write() = keys;
        Ok(count)
    }

    /// Number of usable verification keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.read().len()
    }

    fn verify(&self, token: &str) -> Result<Value, AuthError> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let mut validation = Validation::new(header.alg);
        validation.validate_aud = false;
        validation.validate_nbf = true;

        let keys = self.keys.read();
        let mut last_err = AuthError::UnknownKey;
        for candidate in keys
            .iter()
            .filter(|k| kid_matches(k.kid.as_deref(), header.kid.as_deref()))
        {
            match jsonwebtoken::decode::<Value>(token, &candidate.key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm
                    ) =>
                {
                    last_err = AuthError::InvalidToken(e.to_string());
                }
                Err(e) => return Err(AuthError::InvalidToken(e.to_string())),
            }
        }
        Err(last_err)
    }

    fn check_claims(&self, payload: &Value) -> Result<(), AuthError> {
        for (name, expected) in &self.check_claims {
            if !payload
                .get(name)
                .is_some_and(|value| claim_matches(value, expected))
            {
                return Err(AuthError::ClaimMismatch(name.clone()));
            }
        }
        Ok(())
    }
}

impl ClaimsResolver for JwksTokenResolver {
    fn resolve(&self, parts: &http::request::Parts) -> Result<Option<TokenClaims>, AuthError> {
        let Some(token) = bearer_token(parts)? else {
            return Ok(None);
        };
        let payload = self.verify(token)?;
        self.check_claims(&payload)?;

        let claims = TokenClaims::from_value(payload)
            .map_err(|e| AuthError::InvalidPayload(e.to_string()))?;
        debug!(
            subject = ?claims.subject,
            scopes = %claims.scopes,
            "verified token claims"
        );
        Ok(Some(claims))
    }
}

fn decoding_keys(key_set: &JwkSet) -> Result<Vec<VerificationKey>, AuthError> {
    let keys: Vec<VerificationKey> = key_set
        .keys
        .iter()
        .filter_map(|jwk| {
            let kid = jwk.common.key_id.clone();
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => Some(VerificationKey { kid, key }),
                Err(e) => {
                    warn!(?kid, error = %e, "skipping unusable key");
                    None
                }
            }
        })
        .collect();

    if keys.is_empty() {
        return Err(AuthError::KeySet("no usable verification key".to_owned()));
    }
    Ok(keys)
}

/// A key without `kid` is tried for every token, and every key is tried for a
/// token without `kid`.
fn kid_matches(key: Option<&str>, token: Option<&str>) -> bool {
    match (key, token) {
        (Some(key), Some(token)) => key == token,
        _ => true,
    }
}

fn claim_matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Array(items) => items.iter().any(|item| item.as_str() == Some(expected)),
        Value::Number(_) | Value::Bool(_) => value.to_string() == expected,
        _ => false,
    }
}
