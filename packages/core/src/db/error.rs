//! Store Error Types
//!
//! This module defines the errors an `ObjectStore` backend reports. The merger
//! distinguishes a missing link relation (degradable) from every other failure
//! (fatal for the requested subtree).

use thiserror::Error;

/// Object store operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The relation backing a resource has not been provisioned
    #[error("Relation not provisioned: {relation}")]
    RelationNotProvisioned { relation: String },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Write rejected by a store constraint
    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}

impl StoreError {
    /// Create a relation-not-provisioned error
    pub fn relation_not_provisioned(relation: impl Into<String>) -> Self {
        Self::RelationNotProvisioned {
            relation: relation.into(),
        }
    }

    /// Create a query failed error
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create a constraint violation error
    pub fn constraint_violation(msg: impl Into<String>) -> Self {
        Self::ConstraintViolation(msg.into())
    }

    pub fn is_not_provisioned(&self) -> bool {
        matches!(self, Self::RelationNotProvisioned { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
