//! Object Links
//!
//! A link is a non-owning parent→child relation that lets one object appear
//! under several parents. A null `parent_id` places the child at root level.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectLink {
    pub id: String,

    pub parent_id: Option<String>,

    pub child_id: String,

    /// Overrides the child's own group key for this occurrence
    #[serde(default)]
    pub group_key: Option<String>,
}

impl ObjectLink {
    /// A link whose child is its own parent
    pub fn is_self_link(&self) -> bool {
        self.parent_id.as_deref() == Some(self.child_id.as_str())
    }

    /// Same `(parent, child)` pair, which upserts collapse into one row
    pub fn same_edge(&self, parent_id: Option<&str>, child_id: &str) -> bool {
        self.parent_id.as_deref() == parent_id && self.child_id == child_id
    }
}
