//! Translation of public request paths into backend object keys.
//!
//! The network-edge router mounts the proxy under an ingress prefix (e.g.
//! `/bulk-data-fp-mdw/`), while objects live in the container without it.
//! [`ObjectKey::resolve`] reconciles the two:
//!
//! ```text
//! /file.zip                        -> file.zip
//! /bulk-data-fp-mdw/sub/file.zip   -> sub/file.zip
//! /                                -> MalformedPath
//! /bulk-data-fp-mdw/sub/           -> MalformedPath
//! ```

use std::borrow::Cow;
use std::fmt;

use percent_encoding::percent_decode_str;

use crate::error::{ProxyError, ProxyResult};

/// Default ingress routing prefix, matching the container name.
pub const DEFAULT_INGRESS_PREFIX: &str = "bulk-data-fp-mdw";

/// A validated backend object key.
///
/// Never empty, never ends with `/`, and contains no empty, `.` or `..`
/// segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Resolve the object key addressed by a request path.
    ///
    /// The path is percent-decoded, its leading separator removed, and the
    /// `ingress_prefix` segment stripped when present. An empty
    /// `ingress_prefix` disables prefix stripping.
    pub fn resolve(request_path: &str, ingress_prefix: &str) -> ProxyResult<Self> {
        let decoded = decode_path(request_path)?;
        let mut key = decoded.strip_prefix('/').unwrap_or(&*decoded);

        if !ingress_prefix.is_empty() {
            if key == ingress_prefix {
                key = "";
            } else if let Some(rest) = key
                .strip_prefix(ingress_prefix)
                .and_then(|rest| rest.strip_prefix('/'))
            {
                key = rest;
            }
        }

        Self::new(key)
    }

    /// Validate a raw object key.
    pub fn new(key: impl Into<String>) -> ProxyResult<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(ProxyError::MalformedPath("empty object key".to_owned()));
        }
        if key.ends_with('/') {
            return Err(ProxyError::MalformedPath(format!(
                "{key} addresses a directory"
            )));
        }
        if key.split('/').any(|segment| segment.is_empty() || is_dot_segment(segment)) {
            return Err(ProxyError::MalformedPath(format!(
                "{key} contains an invalid segment"
            )));
        }
        Ok(Self(key))
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reject request paths that would climb out of the directory they are
/// appended to.
///
/// The path is percent-decoded first, so `%2e%2e` counts as `..`. Both `/`
/// and `\` separate segments, as URL parsers treat them alike for HTTP.
pub fn check_relative_path(request_path: &str) -> ProxyResult<()> {
    let decoded = decode_path(request_path)?;
    if decoded.split(['/', '\\']).any(is_dot_segment) {
        return Err(ProxyError::MalformedPath(format!(
            "{request_path} contains a dot segment"
        )));
    }
    Ok(())
}

fn is_dot_segment(segment: &str) -> bool {
    segment == "." || segment == ".."
}

/// The filename offered to the caller: the last segment of the original
/// request path (not of the resolved key).
///
/// Percent-escapes are decoded when they form valid UTF-8; otherwise the raw
/// segment is returned.
#[must_use]
pub fn attachment_filename(request_path: &str) -> String {
    let decoded = decode_path(request_path).unwrap_or(Cow::Borrowed(request_path));
    decoded.rsplit('/').next().unwrap_or_default().to_owned()
}

fn decode_path(path: &str) -> ProxyResult<Cow<'_, str>> {
    percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| ProxyError::MalformedPath("path is not valid UTF-8".to_owned()))
}
