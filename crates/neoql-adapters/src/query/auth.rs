//! The caller's resolved authentication.

use indexmap::IndexMap;
use neoql_common::types::Value;
use serde::{Deserialize, Serialize};

/// Authentication state resolved by the serving layer.
///
/// Token verification happens upstream; Neoql only binds the result as the
/// `isAuthenticated` and `jwt` statement parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthContext {
    /// Whether the request carried a verified token.
    pub authenticated: bool,
    /// Token claims.
    pub claims: IndexMap<String, Value>,
}

impl AuthContext {
    /// An unauthenticated caller with no claims.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated caller with the given claims.
    #[must_use]
    pub fn with_claims(claims: IndexMap<String, Value>) -> Self {
        Self {
            authenticated: true,
            claims,
        }
    }

    /// Adds one claim.
    #[must_use]
    pub fn claim(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(key.into(), value.into());
        self
    }

    /// The claims as one map value.
    #[must_use]
    pub fn claims_value(&self) -> Value {
        Value::Map(self.claims.clone())
    }
}
