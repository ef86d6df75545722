//! OAuth-style scope sets and the permission check.
//!
//! A scope is an opaque string granted by a verified access token (e.g.
//! `"FP/MDW"`). Comparison is exact and case-sensitive; a [`ScopeSet`] has set
//! semantics, so ordering and duplicates never matter.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An immutable set of scope strings.
///
/// # Examples
///
/// ```
/// use cdproxy_core::scope::{ScopeSet, authorize};
///
/// let required = ScopeSet::parse("FP/MDW");
/// let caller = ScopeSet::from_iter(["FP/MDW", "BRK/RO"]);
/// assert!(authorize(&required, &caller));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    /// Create an empty scope set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a scope list separated by commas and/or whitespace.
    ///
    /// Empty entries are ignored, so `"A, B"` and `"A B"` yield the same set.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        value
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Whether the given scope is granted.
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// Whether every scope of `other` is also in `self`.
    #[must_use]
    pub fn is_superset(&self, other: &ScopeSet) -> bool {
        self.0.is_superset(&other.0)
    }

    /// Number of distinct scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no scopes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl Extend<String> for ScopeSet {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for scope in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(scope)?;
            first = false;
        }
        Ok(())
    }
}

/// Check whether `caller` satisfies `required`.
///
/// Returns `true` iff every required scope was granted to the caller. An empty
/// `required` set is trivially satisfied.
#[must_use]
pub fn authorize(required: &ScopeSet, caller: &ScopeSet) -> bool {
    caller.is_superset(required)
}
