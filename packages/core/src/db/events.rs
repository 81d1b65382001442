//! Domain Events for Object Mutations
//!
//! `ObjectService` emits these after every successful mutation so that views
//! holding a built tree know to re-fetch it. The engine never patches a tree in
//! place; the event only says *what* changed, not how to apply it.
//!
//! # Event Flow
//!
//! 1. `ObjectService` performs a mutation against the store
//! 2. A `DomainEvent` is sent on a tokio broadcast channel
//! 3. Subscribers (view layer) rebuild the affected tree and aggregates

use crate::models::ObjectLink;
use serde::{Deserialize, Serialize};

/// Domain events emitted by `ObjectService`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomainEvent {
    /// One or more objects were created (batch creations share `group_key`)
    #[serde(rename_all = "camelCase")]
    ObjectsCreated {
        ids: Vec<String>,
        group_key: Option<String>,
    },

    ObjectUpdated { id: String },

    /// An object and its direct-children subtree were removed
    #[serde(rename_all = "camelCase")]
    SubtreeDeleted { root_id: String, removed: usize },

    #[serde(rename_all = "camelCase")]
    SubtreeDuplicated {
        source_id: String,
        copy_id: String,
        copied: usize,
    },

    /// A property was added, edited, or had files attached/removed
    #[serde(rename_all = "camelCase")]
    PropertyChanged {
        object_id: String,
        property_id: String,
    },

    #[serde(rename_all = "camelCase")]
    PropertyDeleted { property_id: String },

    /// A formula template was created or edited; dependent values are NOT recomputed
    #[serde(rename_all = "camelCase")]
    FormulaChanged { formula_id: String },

    #[serde(rename_all = "camelCase")]
    FormulaDeleted { formula_id: String },

    LinkUpserted(ObjectLink),

    LinkDeleted { id: String },
}

impl DomainEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::ObjectsCreated { .. } => "objects:created",
            DomainEvent::ObjectUpdated { .. } => "object:updated",
            DomainEvent::SubtreeDeleted { .. } => "subtree:deleted",
            DomainEvent::SubtreeDuplicated { .. } => "subtree:duplicated",
            DomainEvent::PropertyChanged { .. } => "property:changed",
            DomainEvent::PropertyDeleted { .. } => "property:deleted",
            DomainEvent::FormulaChanged { .. } => "formula:changed",
            DomainEvent::FormulaDeleted { .. } => "formula:deleted",
            DomainEvent::LinkUpserted(_) => "link:upserted",
            DomainEvent::LinkDeleted { .. } => "link:deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Contract test: the view layer matches on the flat, internally-tagged format
    #[test]
    fn test_domain_event_serialization_contract() {
        let event = DomainEvent::LinkUpserted(ObjectLink {
            id: "link-1".to_string(),
            parent_id: Some("parent-123".to_string()),
            child_id: "child-456".to_string(),
            group_key: None,
        });

        let parsed = serde_json::to_value(&event).unwrap();
        assert_eq!(parsed.get("type").unwrap(), "linkUpserted");
        assert_eq!(parsed.get("parentId").unwrap(), "parent-123");
        assert_eq!(parsed.get("childId").unwrap(), "child-456");
        assert!(
            parsed.get("linkUpserted").is_none(),
            "Should NOT be nested under 'linkUpserted' key"
        );

        let event = DomainEvent::SubtreeDeleted {
            root_id: "obj-1".to_string(),
            removed: 3,
        };
        let parsed = serde_json::to_value(&event).unwrap();
        assert_eq!(parsed.get("type").unwrap(), "subtreeDeleted");
        assert_eq!(parsed.get("rootId").unwrap(), "obj-1");
        assert_eq!(parsed.get("removed").unwrap(), 3);
    }

    #[test]
    fn test_event_type_names() {
        let event = DomainEvent::FormulaChanged {
            formula_id: "f1".to_string(),
        };
        assert_eq!(event.event_type(), "formula:changed");

        let round_trip: DomainEvent =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(round_trip, event);
    }
}
