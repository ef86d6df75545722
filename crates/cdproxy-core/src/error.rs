//! Error types for the confidential data proxy.

/// Errors surfaced by the proxy while handling a request or starting up.
///
/// Caller errors map to 4xx statuses through [`ProxyError::status_code`];
/// everything else is a system fault reported as `500`.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The request path does not address a single object.
    #[error("malformed object path: {0}")]
    MalformedPath(String),

    /// The addressed object does not exist in the backend.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A bearer token was presented but could not be read.
    #[error("invalid token: {0}")]
    Unauthorized(String),

    /// The caller lacks the required scopes.
    #[error("{}", crate::SCOPE_DENIED_MESSAGE)]
    Forbidden,

    /// Only `GET` is served on the proxy route.
    #[error("method \"{0}\" not allowed")]
    MethodNotAllowed(String),

    /// Invalid startup configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Backend connectivity, authentication, or transport failure.
    #[error("upstream error: {0}")]
    Upstream(#[source] anyhow::Error),
}

impl ProxyError {
    /// HTTP status code reported to the caller for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MalformedPath(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden => 403,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            Self::Config(_) | Self::Upstream(_) => 500,
        }
    }

    /// Whether the error was caused by the caller rather than the system.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        self.status_code() < 500
    }
}

/// Convenience result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;
