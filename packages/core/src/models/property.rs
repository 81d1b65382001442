//! Property and File Attachment Structures
//!
//! A property is a named value attached to an object. Its `raw_value` is either
//! a literal number, a free-text value, or an arithmetic formula referencing
//! sibling property names (e.g. `lengte * breedte`).

use crate::db::PropertyRow;
use crate::models::Formula;
use serde::{Deserialize, Serialize};

/// File attached to a property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub name: String,
    pub storage_path: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Named value attached to an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,

    pub object_id: String,

    /// Trimmed, non-empty name. Formula references match it case-insensitively.
    pub name: String,

    /// Literal number, free text, or formula expression
    pub raw_value: String,

    /// Free-text unit (e.g. "cm", "kg")
    #[serde(default)]
    pub unit: Option<String>,

    /// Formula template this value was derived from
    #[serde(default)]
    pub formula_id: Option<String>,

    /// Nested formula reference as fetched with the property row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<Formula>,

    #[serde(default)]
    pub files: Vec<FileAttachment>,
}

impl Property {
    /// Expression used for evaluation
    ///
    /// The stored raw value wins. When it is blank and a formula template is
    /// attached, the template's expression is used instead.
    pub fn expression(&self) -> &str {
        let raw = self.raw_value.trim();
        if raw.is_empty() {
            if let Some(formula) = &self.formula {
                return formula.expression.trim();
            }
        }
        raw
    }

    /// Declared unit, ignoring blank values
    pub fn declared_unit(&self) -> Option<&str> {
        self.unit.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    pub fn name_matches(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

impl From<PropertyRow> for Property {
    fn from(row: PropertyRow) -> Self {
        Self {
            id: row.id,
            object_id: row.object_id,
            name: row.name.trim().to_string(),
            raw_value: row.raw_value,
            unit: row.unit,
            formula_id: row.formula_id,
            formula: row.formula,
            files: row.files,
        }
    }
}
