//! Error types for claims resolution.

/// Errors that can occur while reading token claims from a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The `Authorization` header is not valid visible ASCII.
    #[error("Invalid Authorization header encoding")]
    InvalidHeaderEncoding,

    /// The `Authorization` header uses a scheme other than `Bearer`.
    #[error("Unsupported authorization scheme: {0}")]
    UnsupportedScheme(String),

    /// The bearer value is not a three-part JWT.
    #[error("Malformed bearer token")]
    MalformedToken,

    /// The token payload is not base64url-encoded JSON.
    #[error("Invalid token payload: {0}")]
    InvalidPayload(String),

    /// The token signature, algorithm, or registered claims (`exp`, `nbf`)
    /// failed verification.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// No key in the key set matches the token.
    #[error("No signing key matches the token")]
    UnknownKey,

    /// A claim required by configuration is missing or has another value.
    #[error("Token claim {0:?} does not have the expected value")]
    ClaimMismatch(String),

    /// The key set could not be loaded or holds no usable key.
    #[error("Invalid key set: {0}")]
    KeySet(String),
}
