//! Store Row Types
//!
//! Typed shapes exchanged with the external store. Reads return `ObjectRow`,
//! `PropertyRow` and `ProfileRow`; writes take the `New*` / `*Update` inputs.
//! Links and formulas are flat enough to travel as their model types.

use crate::models::{FileAttachment, Formula, MaterialFlowType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Object row with its nested properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub group_key: Option<String>,
    #[serde(default)]
    pub material_flow_type: MaterialFlowType,
    #[serde(default)]
    pub properties: Vec<PropertyRow>,
    pub created_at: DateTime<Utc>,
}

/// Property row with nested formula reference and file attachments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRow {
    pub id: String,
    pub object_id: String,
    pub name: String,
    #[serde(default)]
    pub raw_value: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub formula_id: Option<String>,
    #[serde(default)]
    pub formula: Option<Formula>,
    #[serde(default)]
    pub files: Vec<FileAttachment>,
}

/// Owner profile row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ProfileRow {
    /// Display name, falling back to the email address
    pub fn label(&self) -> Option<&str> {
        [self.display_name.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewObject {
    pub name: String,
    pub owner_id: Option<String>,
    pub parent_id: Option<String>,
    pub material_flow_type: MaterialFlowType,
}

/// Sparse object update, only provided fields change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectUpdate {
    pub name: Option<String>,
    pub material_flow_type: Option<MaterialFlowType>,
    /// `Some(None)` clears the group key
    pub group_key: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProperty {
    pub object_id: String,
    pub name: String,
    pub raw_value: String,
    pub unit: Option<String>,
    pub formula_id: Option<String>,
    #[serde(default)]
    pub files: Vec<FileAttachment>,
}

/// Sparse property update, only provided fields change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyUpdate {
    pub name: Option<String>,
    pub raw_value: Option<String>,
    /// `Some(None)` clears the unit
    pub unit: Option<Option<String>>,
    /// `Some(None)` detaches the formula
    pub formula_id: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFormula {
    pub name: String,
    pub expression: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLink {
    pub parent_id: Option<String>,
    pub child_id: String,
    pub group_key: Option<String>,
}
