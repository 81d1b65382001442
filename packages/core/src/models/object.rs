//! Object Node Data Structures
//!
//! This module defines the `ObjectNode` struct, the in-memory tree node produced
//! by the hierarchy merger and consumed by aggregation and grouping.
//!
//! # Occurrences vs Identity
//!
//! The same stored object may appear several times in one merged tree: once as a
//! direct child (parent pointer) and once per link row that targets it. Every
//! appearance is a separate `ObjectNode` carrying its own [`InstanceKey`]. The
//! `id` field still identifies the underlying object; the instance key only
//! distinguishes occurrences for iteration, rendering and aggregation.

use crate::db::ObjectRow;
use crate::models::Property;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Material-flow classification used to split objects into two views
///
/// `Default` and `FinalProduct` belong to the hierarchy view, the remaining
/// three tags belong to the process-flow view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialFlowType {
    #[default]
    Default,
    RawMaterial,
    Intermediate,
    Component,
    FinalProduct,
}

impl MaterialFlowType {
    /// Whether this tag belongs to the process-flow subset
    pub fn is_process_flow(self) -> bool {
        matches!(
            self,
            MaterialFlowType::RawMaterial
                | MaterialFlowType::Intermediate
                | MaterialFlowType::Component
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MaterialFlowType::Default => "default",
            MaterialFlowType::RawMaterial => "raw_material",
            MaterialFlowType::Intermediate => "intermediate",
            MaterialFlowType::Component => "component",
            MaterialFlowType::FinalProduct => "final_product",
        }
    }
}

impl fmt::Display for MaterialFlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synthetic per-occurrence key
///
/// Renders as `direct:<objectId>`, `link:<linkId>` or `root-link:<linkId>`.
/// Never used for identity or equality of the underlying object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum InstanceKey {
    /// Reached through the object's own `parent_id`
    Direct(String),
    /// Reached through a link row with a non-null parent
    Link(String),
    /// Reached through a root-level link row (`parent_id` is null)
    RootLink(String),
}

impl InstanceKey {
    pub fn is_linked(&self) -> bool {
        !matches!(self, InstanceKey::Direct(_))
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKey::Direct(id) => write!(f, "direct:{}", id),
            InstanceKey::Link(id) => write!(f, "link:{}", id),
            InstanceKey::RootLink(id) => write!(f, "root-link:{}", id),
        }
    }
}

/// Why the merger stopped expanding a node's children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    /// The object already appears on the path from the root to this node
    CyclicReference,
    /// The configured maximum depth was reached
    DepthLimit,
}

/// One occurrence of an object in a merged hierarchy tree.
///
/// # Fields
///
/// - `id`: Identifier of the underlying stored object
/// - `owner_name`: Display name resolved from the owner's profile ("unknown" when absent)
/// - `group_key`: Effective display group; a link's own key overrides the object's key
/// - `children`: Direct children followed by linked children, built by the merger
/// - `instance_key`: How this occurrence was reached
/// - `truncated`: Set when the merger refused to expand this occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectNode {
    pub id: String,

    pub name: String,

    pub owner_id: Option<String>,

    pub owner_name: String,

    pub parent_id: Option<String>,

    pub group_key: Option<String>,

    #[serde(default)]
    pub material_flow_type: MaterialFlowType,

    /// Properties in insertion order
    #[serde(default)]
    pub properties: Vec<Property>,

    #[serde(default)]
    pub children: Vec<ObjectNode>,

    pub instance_key: InstanceKey,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated: Option<TruncationReason>,
}

impl ObjectNode {
    /// Build a childless node from a store row
    pub fn from_row(row: ObjectRow, instance_key: InstanceKey, owner_name: String) -> Self {
        Self {
            id: row.id,
            name: row.name,
            owner_id: row.owner_id,
            owner_name,
            parent_id: row.parent_id,
            group_key: row.group_key,
            material_flow_type: row.material_flow_type,
            properties: row.properties.into_iter().map(Property::from).collect(),
            children: Vec::new(),
            instance_key,
            truncated: None,
        }
    }

    /// Look up a property by name, ignoring case and surrounding whitespace
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name_matches(name))
    }

    /// Non-empty group key, if any
    pub fn effective_group_key(&self) -> Option<&str> {
        self.group_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Total number of occurrences in this subtree, including `self`
    pub fn occurrence_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(ObjectNode::occurrence_count)
            .sum::<usize>()
    }

    /// Depth-first visit of every occurrence in this subtree
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ObjectNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}
