//! ObjectStore Trait - Store Abstraction Layer
//!
//! This module defines the `ObjectStore` trait that abstracts the external
//! relational store holding objects, properties, formulas, links and owner
//! profiles. The engine never talks to a concrete backend; it is handed an
//! `Arc<dyn ObjectStore>` at construction time.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: Every method is async; the store is reached over I/O.
//! 2. **Typed Rows**: Backends translate their own row shapes into
//!    [`ObjectRow`]/[`PropertyRow`]/[`ProfileRow`] at this boundary.
//! 3. **Error Handling**: Uses [`StoreError`]; a missing link relation is
//!    reported as `StoreError::RelationNotProvisioned` so the merger can
//!    degrade instead of failing.
//! 4. **No Incremental Patching**: Callers re-fetch after every mutation.
//!
//! # Examples
//!
//! ```rust,no_run
//! use objectspace_core::db::{InMemoryStore, NewObject, ObjectStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());
//! let created = store
//!     .insert_objects(
//!         vec![NewObject {
//!             name: "Kast".to_string(),
//!             ..Default::default()
//!         }],
//!         None,
//!     )
//!     .await?;
//! let roots = store.list_children(None).await?;
//! assert_eq!(roots[0].id, created[0].id);
//! # Ok(())
//! # }
//! ```

use crate::db::error::StoreResult;
use crate::db::rows::{
    NewFormula, NewLink, NewObject, NewProperty, ObjectRow, ObjectUpdate, ProfileRow,
    PropertyRow, PropertyUpdate,
};
use crate::models::{FileAttachment, Formula, ObjectLink};
use async_trait::async_trait;

/// Abstraction over the external persistent store
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; sibling subtrees are fetched
/// concurrently from the same store handle.
///
/// # Method Categories
///
/// - **Hierarchy reads**: children, links, batched object and profile lookups
/// - **Objects**: batch insert, sparse update, bulk delete
/// - **Properties**: insert, update, delete, file attachments
/// - **Formulas**: template CRUD
/// - **Links**: upsert and delete
#[async_trait]
pub trait ObjectStore: Send + Sync {
    //
    // HIERARCHY READS
    //

    /// Objects whose `parent_id` equals `parent_id` (null for roots), ordered by name
    ///
    /// Rows include their properties with nested formula references and files.
    async fn list_children(&self, parent_id: Option<&str>) -> StoreResult<Vec<ObjectRow>>;

    /// Link rows whose `parent_id` equals `parent_id` (null for root links)
    ///
    /// # Errors
    ///
    /// May fail with `StoreError::RelationNotProvisioned` when the link
    /// relation does not exist in this deployment.
    async fn list_links(&self, parent_id: Option<&str>) -> StoreResult<Vec<ObjectLink>>;

    /// Batched lookup; missing ids are silently absent from the result
    async fn resolve_objects_by_ids(&self, ids: &[String]) -> StoreResult<Vec<ObjectRow>>;

    /// Batched owner lookup; missing ids are silently absent from the result
    async fn resolve_profiles_by_ids(&self, ids: &[String]) -> StoreResult<Vec<ProfileRow>>;

    //
    // OBJECTS
    //

    /// Insert objects, stamping every row with `group_key`
    async fn insert_objects(
        &self,
        objects: Vec<NewObject>,
        group_key: Option<String>,
    ) -> StoreResult<Vec<ObjectRow>>;

    async fn update_object(&self, id: &str, update: ObjectUpdate) -> StoreResult<ObjectRow>;

    /// Delete objects together with their properties and every link touching them
    ///
    /// Returns the number of objects removed.
    async fn delete_objects(&self, ids: &[String]) -> StoreResult<usize>;

    //
    // PROPERTIES
    //

    async fn insert_property(&self, property: NewProperty) -> StoreResult<PropertyRow>;

    async fn update_property(&self, id: &str, update: PropertyUpdate)
        -> StoreResult<PropertyRow>;

    async fn delete_property(&self, id: &str) -> StoreResult<()>;

    /// Properties whose `formula_id` equals `formula_id`
    async fn properties_by_formula(&self, formula_id: &str) -> StoreResult<Vec<PropertyRow>>;

    async fn attach_file(&self, property_id: &str, file: FileAttachment)
        -> StoreResult<PropertyRow>;

    async fn remove_file(&self, property_id: &str, storage_path: &str)
        -> StoreResult<PropertyRow>;

    //
    // FORMULAS
    //

    async fn list_formulas(&self) -> StoreResult<Vec<Formula>>;

    async fn get_formula(&self, id: &str) -> StoreResult<Option<Formula>>;

    async fn insert_formula(&self, formula: NewFormula) -> StoreResult<Formula>;

    async fn update_formula(&self, id: &str, formula: NewFormula) -> StoreResult<Formula>;

    /// Delete a template; properties referencing it keep their cached value
    async fn delete_formula(&self, id: &str) -> StoreResult<()>;

    //
    // LINKS
    //

    /// Insert a link, or update the group key of the existing `(parent, child)` row
    async fn upsert_link(&self, link: NewLink) -> StoreResult<ObjectLink>;

    async fn delete_link(&self, id: &str) -> StoreResult<()>;
}
