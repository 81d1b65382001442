//! Formula Templates
//!
//! Named, reusable arithmetic expressions referencing property names. Editing a
//! template does not touch properties already derived from it; recomputation
//! is an explicit operation on `ObjectService`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formula {
    pub id: String,
    pub name: String,
    pub expression: String,
}
