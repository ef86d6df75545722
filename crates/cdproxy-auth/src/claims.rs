//! Claims carried by a verified access token.

use cdproxy_core::ScopeSet;
use serde::Deserialize;
use serde_json::Value;

/// The subset of token claims the proxy uses.
///
/// Scopes drive the permission check; subject and email are only used to
/// attribute audit events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenClaims {
    /// Granted scopes.
    pub scopes: ScopeSet,
    /// The `sub` claim.
    pub subject: Option<String>,
    /// The `email` claim.
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    scopes: Option<Value>,
    #[serde(default)]
    scope: Option<Value>,
    #[serde(default)]
    realm_access: Option<RealmAccess>,
}

#[derive(Debug, Default, Deserialize)]
struct RealmAccess {
    #[serde(default)]
    roles: Vec<String>,
}

impl TokenClaims {
    /// Read claims from a decoded JSON token payload.
    ///
    /// Scopes are merged from the `scopes` claim (array or space separated
    /// string), the OAuth `scope` claim, and Keycloak's `realm_access.roles`.
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload).map(Self::from_raw)
    }

    /// Read claims from an already-parsed token payload.
    pub fn from_value(payload: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload).map(Self::from_raw)
    }

    fn from_raw(raw: RawClaims) -> Self {
        let mut scopes = ScopeSet::new();
        for value in [raw.scopes, raw.scope].into_iter().flatten() {
            scopes.extend(scope_values(value));
        }
        if let Some(realm) = raw.realm_access {
            scopes.extend(realm.roles);
        }

        Self {
            scopes,
            subject: raw.sub,
            email: raw.email,
        }
    }

    /// Identity used for audit attribution: email, then subject.
    #[must_use]
    pub fn principal(&self) -> Option<&str> {
        self.email.as_deref().or(self.subject.as_deref())
    }
}

fn scope_values(value: Value) -> Vec<String> {
    match value {
        Value::String(s) => s.split_whitespace().map(ToOwned::to_owned).collect(),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
