//! Service Layer Error Types
//!
//! This module defines error types for service-layer operations. Per-property
//! formula failures are not errors at this level; they travel inside the
//! aggregation report so the rest of a tree still renders.

use crate::config::ConfigError;
use crate::db::StoreError;
use crate::formula::FormulaError;
use thiserror::Error;

/// Hierarchy building errors
///
/// Any of these aborts the requested subtree; callers must not render a
/// half-built tree.
#[derive(Error, Debug)]
pub enum HierarchyError {
    /// Requested root object does not exist
    #[error("Object not found: {id}")]
    ObjectNotFound { id: String },

    /// Core object/link/profile fetch failed
    #[error("Fetch failed: {0}")]
    FetchFailed(#[from] StoreError),

    /// Service constructed with an invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl HierarchyError {
    /// Create an object not found error
    pub fn object_not_found(id: impl Into<String>) -> Self {
        Self::ObjectNotFound { id: id.into() }
    }
}

/// Mutation errors
#[derive(Error, Debug)]
pub enum ObjectServiceError {
    /// Input rejected before reaching the store
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Link whose child is its own parent
    #[error("Object {id} cannot be linked under itself")]
    SelfLink { id: String },

    /// Referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Store operation failed
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    /// Formula could not be evaluated
    #[error("Formula evaluation failed: {0}")]
    Formula(#[from] FormulaError),
}

impl ObjectServiceError {
    /// Create a validation failed error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    /// Create a self-link error
    pub fn self_link(id: impl Into<String>) -> Self {
        Self::SelfLink { id: id.into() }
    }

    /// Create a not found error
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}
