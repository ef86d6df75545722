//! Core types, configuration, and permission checks for the confidential data proxy.
//!
//! This crate holds the pieces of the proxy that do no I/O:
//!
//! - [`scope`]: the [`ScopeSet`] type and the [`authorize`] predicate.
//! - [`key`]: translation of a public request path into a backend [`ObjectKey`],
//!   and extraction of the attachment filename.
//! - [`config`]: environment-driven [`ProxyConfig`] and the [`BackendConfig`]
//!   selection derived from it.
//! - [`error`]: the [`ProxyError`] taxonomy and its HTTP status mapping.

pub mod config;
pub mod error;
pub mod key;
pub mod scope;

pub use config::{BackendConfig, LogFormat, ProxyConfig};
pub use error::{ProxyError, ProxyResult};
pub use key::{ObjectKey, attachment_filename, check_relative_path};
pub use scope::{ScopeSet, authorize};

/// Message returned to callers that lack the required scopes.
pub const SCOPE_DENIED_MESSAGE: &str = "Required scope not given.";
