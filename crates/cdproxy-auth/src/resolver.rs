//! Claims resolver trait and the forwarded bearer-token implementation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tracing::debug;

use crate::claims::TokenClaims;
use crate::error::AuthError;

/// Trait for reading the verified token claims attached to a request.
///
/// Implementations never perform I/O per request: key material is loaded
/// ahead of time.
pub trait ClaimsResolver: Send + Sync {
    /// Resolve the caller's claims.
    ///
    /// Returns `Ok(None)` for anonymous requests (no credentials at all).
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if credentials are present but unreadable or
    /// fail verification.
    fn resolve(&self, parts: &http::request::Parts) -> Result<Option<TokenClaims>, AuthError>;
}

/// Reads claims from an `Authorization: Bearer <jwt>` header whose signature
/// has already been checked by the gateway in front of the proxy.
///
/// Only the payload segment is decoded; the header and signature segments are
/// required to be present but are not interpreted. Only safe behind a gateway
/// that rejects unverified tokens; see
/// [`JwksTokenResolver`](crate::jwks::JwksTokenResolver) otherwise.
#[derive(Debug, Clone, Default)]
pub struct ForwardedTokenResolver;

impl ForwardedTokenResolver {
    /// Create a new resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ClaimsResolver for ForwardedTokenResolver {
    fn resolve(&self, parts: &http::request::Parts) -> Result<Option<TokenClaims>, AuthError> {
        let Some(token) = bearer_token(parts)? else {
            return Ok(None);
        };
        let claims = decode_payload(token)?;
        debug!(
            subject = ?claims.subject,
            scopes = %claims.scopes,
            "resolved token claims"
        );
        Ok(Some(claims))
    }
}

/// The bearer token of a request, or `None` when it carries no
/// `Authorization` header.
pub(crate) fn bearer_token(parts: &http::request::Parts) -> Result<Option<&str>, AuthError> {
    let Some(value) = parts.headers.get(http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidHeaderEncoding)?;
    extract_bearer_token(value).map(Some)
}

/// Extract the token from a bearer credential.
///
/// Per RFC 6750 the scheme is case-insensitive.
fn extract_bearer_token(value: &str) -> Result<&str, AuthError> {
    let value = value.trim();
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
            let token = token.trim();
            if token.is_empty() {
                Err(AuthError::MalformedToken)
            } else {
                Ok(token)
            }
        }
        Some((scheme, _)) => Err(AuthError::UnsupportedScheme(scheme.to_owned())),
        None => Err(AuthError::UnsupportedScheme(value.to_owned())),
    }
}

fn decode_payload(token: &str) -> Result<TokenClaims, AuthError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::MalformedToken);
    };

    let json = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::InvalidPayload(e.to_string()))?;
    TokenClaims::from_json(&json).map_err(|e| AuthError::InvalidPayload(e.to_string()))
}
