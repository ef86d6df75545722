//! Token claims resolution for the confidential data proxy.
//!
//! Two [`ClaimsResolver`]s read the caller's claims from the inbound request so
//! that the proxy can run its scope check and attribute audit events:
//!
//! - [`JwksTokenResolver`] verifies the bearer token's signature and expiry
//!   against the identity provider's JSON Web Key Set.
//! - [`ForwardedTokenResolver`] trusts a token that a gateway in front of the
//!   proxy has already verified, and only decodes its payload.
//!
//! # Usage
//!
//! ```rust
//! use cdproxy_auth::{ClaimsResolver, ForwardedTokenResolver};
//!
//! let resolver = ForwardedTokenResolver::new();
//! let (parts, ()) = http::Request::builder()
//!     .uri("/file.zip")
//!     .body(())
//!     .unwrap()
//!     .into_parts();
//!
//! // No Authorization header: the caller is anonymous.
//! assert!(resolver.resolve(&parts).unwrap().is_none());
//! ```
//!
//! # Modules
//!
//! - [`claims`] - The [`TokenClaims`] read from a token payload
//! - [`error`] - Claims resolution errors
//! - [`jwks`] - The signature-verifying [`JwksTokenResolver`] and its [`KeySetSource`]
//! - [`resolver`] - The [`ClaimsResolver`] trait and the bearer-token implementation

pub mod claims;
pub mod error;
pub mod jwks;
pub mod resolver;

pub use claims::TokenClaims;
pub use error::AuthError;
pub use jwks::{JwksTokenResolver, KeySetSource};
pub use resolver::{ClaimsResolver, ForwardedTokenResolver};
