//! Data Models
//!
//! This module contains the typed entities the engine operates on:
//!
//! - `ObjectNode` - One occurrence of an object in a merged hierarchy tree
//! - `Property` / `FileAttachment` - Named values attached to objects
//! - `Formula` - Reusable arithmetic templates
//! - `ObjectLink` - Non-owning parent→child relations
//!
//! Raw store shapes live in [`crate::db::rows`]; everything here is what the
//! merger, aggregation and grouping code consume.

mod formula;
mod link;
mod object;
mod property;

pub use formula::Formula;
pub use link::ObjectLink;
pub use object::{InstanceKey, MaterialFlowType, ObjectNode, TruncationReason};
pub use property::{FileAttachment, Property};

use serde::Serialize;

/// Success flag plus error message, the shape view code expects from mutations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MutationOutcome {
    pub fn from_result<T, E: std::fmt::Display>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Self {
                success: true,
                error: None,
            },
            Err(e) => Self {
                success: false,
                error: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_outcome_from_result() {
        let ok: Result<u32, String> = Ok(1);
        assert_eq!(
            MutationOutcome::from_result(&ok),
            MutationOutcome {
                success: true,
                error: None
            }
        );

        let err: Result<u32, String> = Err("name cannot be empty".to_string());
        let outcome = MutationOutcome::from_result(&err);
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("name cannot be empty"));
    }
}
