//! Authorization vocabulary shared by the schema model and the error types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The operation an authorization rule guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthOperation {
    /// Reading nodes (lists, connections and aggregations).
    Read,
    /// Creating nodes.
    Create,
    /// Updating node properties.
    Update,
    /// Deleting nodes.
    Delete,
    /// Creating an edge to or from the node.
    CreateRelationship,
    /// Deleting an edge to or from the node.
    DeleteRelationship,
}

impl AuthOperation {
    /// All operations, in declaration order.
    pub const ALL: [AuthOperation; 6] = [
        AuthOperation::Read,
        AuthOperation::Create,
        AuthOperation::Update,
        AuthOperation::Delete,
        AuthOperation::CreateRelationship,
        AuthOperation::DeleteRelationship,
    ];

    /// Returns the canonical upper-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AuthOperation::Read => "READ",
            AuthOperation::Create => "CREATE",
            AuthOperation::Update => "UPDATE",
            AuthOperation::Delete => "DELETE",
            AuthOperation::CreateRelationship => "CREATE_RELATIONSHIP",
            AuthOperation::DeleteRelationship => "DELETE_RELATIONSHIP",
        }
    }
}

impl fmt::Display for AuthOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthOperation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuthOperation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or(())
    }
}

/// When a validate-phase rule is checked relative to the write it guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthTiming {
    /// Against stored data, before the write.
    Before,
    /// Against the state the write produced.
    After,
}

impl AuthTiming {
    /// Returns the canonical upper-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AuthTiming::Before => "BEFORE",
            AuthTiming::After => "AFTER",
        }
    }
}

impl fmt::Display for AuthTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthTiming {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BEFORE" => Ok(AuthTiming::Before),
            "AFTER" => Ok(AuthTiming::After),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names_round_trip() {
        for op in AuthOperation::ALL {
            assert_eq!(op.as_str().parse::<AuthOperation>(), Ok(op));
        }
        assert!("AGGREGATE".parse::<AuthOperation>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let op: AuthOperation = serde_json::from_str("\"CREATE_RELATIONSHIP\"").unwrap();
        assert_eq!(op, AuthOperation::CreateRelationship);
        let timing: AuthTiming = serde_json::from_str("\"AFTER\"").unwrap();
        assert_eq!(timing, AuthTiming::After);
    }
}
