//! In-Memory ObjectStore
//!
//! A complete `ObjectStore` backed by plain vectors behind a `tokio::sync::RwLock`.
//! It is the reference adapter used by tests and benchmarks and a stand-in for
//! the external store while a view layer is being developed.
//!
//! Besides the trait surface it offers a few switches that real deployments
//! exhibit: an unprovisioned link relation, a failing object fetch, and raw
//! link insertion that bypasses upsert checks (for malformed-data scenarios).
//! Every hierarchy read is counted so batching can be asserted.

use crate::db::error::{StoreError, StoreResult};
use crate::db::object_store::ObjectStore;
use crate::db::rows::{
    NewFormula, NewLink, NewObject, NewProperty, ObjectRow, ObjectUpdate, ProfileRow,
    PropertyRow, PropertyUpdate,
};
use crate::models::{FileAttachment, Formula, MaterialFlowType, ObjectLink};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

const LINK_RELATION: &str = "object_links";

#[derive(Debug, Clone)]
struct ObjectRecord {
    id: String,
    name: String,
    owner_id: Option<String>,
    parent_id: Option<String>,
    group_key: Option<String>,
    material_flow_type: MaterialFlowType,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct PropertyRecord {
    id: String,
    object_id: String,
    name: String,
    raw_value: String,
    unit: Option<String>,
    formula_id: Option<String>,
    files: Vec<FileAttachment>,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: Vec<ObjectRecord>,
    properties: Vec<PropertyRecord>,
    formulas: Vec<Formula>,
    links: Vec<ObjectLink>,
    profiles: Vec<ProfileRow>,
}

impl MemoryState {
    fn property_row(&self, record: &PropertyRecord) -> PropertyRow {
        let formula = record
            .formula_id
            .as_deref()
            .and_then(|fid| self.formulas.iter().find(|f| f.id == fid))
            .cloned();

        PropertyRow {
            id: record.id.clone(),
            object_id: record.object_id.clone(),
            name: record.name.clone(),
            raw_value: record.raw_value.clone(),
            unit: record.unit.clone(),
            formula_id: record.formula_id.clone(),
            formula,
            files: record.files.clone(),
        }
    }

    fn object_row(&self, record: &ObjectRecord) -> ObjectRow {
        let properties = self
            .properties
            .iter()
            .filter(|p| p.object_id == record.id)
            .map(|p| self.property_row(p))
            .collect();

        ObjectRow {
            id: record.id.clone(),
            name: record.name.clone(),
            owner_id: record.owner_id.clone(),
            parent_id: record.parent_id.clone(),
            group_key: record.group_key.clone(),
            material_flow_type: record.material_flow_type,
            properties,
            created_at: record.created_at,
        }
    }

    fn property_mut(&mut self, id: &str) -> StoreResult<&mut PropertyRecord> {
        self.properties
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::not_found("Property", id))
    }
}

/// Snapshot of hierarchy read counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCallCounts {
    pub list_children: usize,
    pub list_links: usize,
    pub resolve_objects: usize,
    pub resolve_profiles: usize,
}

#[derive(Debug, Default)]
struct CallCounters {
    list_children: AtomicUsize,
    list_links: AtomicUsize,
    resolve_objects: AtomicUsize,
    resolve_profiles: AtomicUsize,
}

/// Vector-backed store for tests, benchmarks and local development
#[derive(Debug)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    links_provisioned: AtomicBool,
    fail_object_reads: AtomicBool,
    counters: CallCounters,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            links_provisioned: AtomicBool::new(true),
            fail_object_reads: AtomicBool::new(false),
            counters: CallCounters::default(),
        }
    }

    /// Toggle the link relation; when unprovisioned every link call fails
    pub fn set_links_provisioned(&self, provisioned: bool) {
        self.links_provisioned.store(provisioned, Ordering::Release);
    }

    /// Make object reads (`list_children`, `resolve_objects_by_ids`) fail
    pub fn set_fail_object_reads(&self, fail: bool) {
        self.fail_object_reads.store(fail, Ordering::Release);
    }

    pub async fn insert_profile(&self, profile: ProfileRow) {
        let mut state = self.state.write().await;
        state.profiles.retain(|p| p.id != profile.id);
        state.profiles.push(profile);
    }

    /// Append a link row verbatim, skipping upsert and self-link checks
    pub async fn insert_link_row(&self, link: ObjectLink) {
        self.state.write().await.links.push(link);
    }

    pub fn call_counts(&self) -> StoreCallCounts {
        StoreCallCounts {
            list_children: self.counters.list_children.load(Ordering::Relaxed),
            list_links: self.counters.list_links.load(Ordering::Relaxed),
            resolve_objects: self.counters.resolve_objects.load(Ordering::Relaxed),
            resolve_profiles: self.counters.resolve_profiles.load(Ordering::Relaxed),
        }
    }

    pub fn reset_call_counts(&self) {
        self.counters.list_children.store(0, Ordering::Relaxed);
        self.counters.list_links.store(0, Ordering::Relaxed);
        self.counters.resolve_objects.store(0, Ordering::Relaxed);
        self.counters.resolve_profiles.store(0, Ordering::Relaxed);
    }

    fn check_object_reads(&self) -> StoreResult<()> {
        if self.fail_object_reads.load(Ordering::Acquire) {
            return Err(StoreError::query_failed("object fetch failed"));
        }
        Ok(())
    }

    fn check_links(&self) -> StoreResult<()> {
        if !self.links_provisioned.load(Ordering::Acquire) {
            return Err(StoreError::relation_not_provisioned(LINK_RELATION));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn list_children(&self, parent_id: Option<&str>) -> StoreResult<Vec<ObjectRow>> {
        self.counters.list_children.fetch_add(1, Ordering::Relaxed);
        self.check_object_reads()?;

        let state = self.state.read().await;
        let mut records: Vec<&ObjectRecord> = state
            .objects
            .iter()
            .filter(|o| o.parent_id.as_deref() == parent_id)
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(records.into_iter().map(|r| state.object_row(r)).collect())
    }

    async fn list_links(&self, parent_id: Option<&str>) -> StoreResult<Vec<ObjectLink>> {
        self.counters.list_links.fetch_add(1, Ordering::Relaxed);
        self.check_links()?;

        let state = self.state.read().await;
        Ok(state
            .links
            .iter()
            .filter(|l| l.parent_id.as_deref() == parent_id)
            .cloned()
            .collect())
    }

    async fn resolve_objects_by_ids(&self, ids: &[String]) -> StoreResult<Vec<ObjectRow>> {
        self.counters.resolve_objects.fetch_add(1, Ordering::Relaxed);
        self.check_object_reads()?;

        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let state = self.state.read().await;
        Ok(state
            .objects
            .iter()
            .filter(|o| wanted.contains(o.id.as_str()))
            .map(|o| state.object_row(o))
            .collect())
    }

    async fn resolve_profiles_by_ids(&self, ids: &[String]) -> StoreResult<Vec<ProfileRow>> {
        self.counters.resolve_profiles.fetch_add(1, Ordering::Relaxed);

        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let state = self.state.read().await;
        Ok(state
            .profiles
            .iter()
            .filter(|p| wanted.contains(p.id.as_str()))
            .cloned()
            .collect())
    }

    async fn insert_objects(
        &self,
        objects: Vec<NewObject>,
        group_key: Option<String>,
    ) -> StoreResult<Vec<ObjectRow>> {
        let mut state = self.state.write().await;

        for object in &objects {
            if let Some(parent_id) = &object.parent_id {
                if !state.objects.iter().any(|o| &o.id == parent_id) {
                    return Err(StoreError::not_found("Object", parent_id.clone()));
                }
            }
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(objects.len());
        for object in objects {
            let record = ObjectRecord {
                id: Uuid::new_v4().to_string(),
                name: object.name,
                owner_id: object.owner_id,
                parent_id: object.parent_id,
                group_key: group_key.clone(),
                material_flow_type: object.material_flow_type,
                created_at: now,
            };
            created.push(state.object_row(&record));
            state.objects.push(record);
        }
        Ok(created)
    }

    async fn update_object(&self, id: &str, update: ObjectUpdate) -> StoreResult<ObjectRow> {
        let mut state = self.state.write().await;
        let record = state
            .objects
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::not_found("Object", id))?;

        if let Some(name) = update.name {
            record.name = name;
        }
        if let Some(flow) = update.material_flow_type {
            record.material_flow_type = flow;
        }
        if let Some(group_key) = update.group_key {
            record.group_key = group_key;
        }

        let record = record.clone();
        Ok(state.object_row(&record))
    }

    async fn delete_objects(&self, ids: &[String]) -> StoreResult<usize> {
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut state = self.state.write().await;

        let before = state.objects.len();
        state.objects.retain(|o| !doomed.contains(o.id.as_str()));
        let removed = before - state.objects.len();

        state
            .properties
            .retain(|p| !doomed.contains(p.object_id.as_str()));
        state.links.retain(|l| {
            !doomed.contains(l.child_id.as_str())
                && !l
                    .parent_id
                    .as_deref()
                    .is_some_and(|parent| doomed.contains(parent))
        });

        Ok(removed)
    }

    async fn insert_property(&self, property: NewProperty) -> StoreResult<PropertyRow> {
        let mut state = self.state.write().await;

        if !state.objects.iter().any(|o| o.id == property.object_id) {
            return Err(StoreError::not_found("Object", property.object_id));
        }
        if let Some(formula_id) = &property.formula_id {
            if !state.formulas.iter().any(|f| &f.id == formula_id) {
                return Err(StoreError::constraint_violation(format!(
                    "unknown formula {}",
                    formula_id
                )));
            }
        }

        let record = PropertyRecord {
            id: Uuid::new_v4().to_string(),
            object_id: property.object_id,
            name: property.name,
            raw_value: property.raw_value,
            unit: property.unit,
            formula_id: property.formula_id,
            files: property.files,
        };
        let row = state.property_row(&record);
        state.properties.push(record);
        Ok(row)
    }

    async fn update_property(
        &self,
        id: &str,
        update: PropertyUpdate,
    ) -> StoreResult<PropertyRow> {
        let mut state = self.state.write().await;

        if let Some(Some(formula_id)) = &update.formula_id {
            if !state.formulas.iter().any(|f| &f.id == formula_id) {
                return Err(StoreError::constraint_violation(format!(
                    "unknown formula {}",
                    formula_id
                )));
            }
        }

        let record = state.property_mut(id)?;
        if let Some(name) = update.name {
            record.name = name;
        }
        if let Some(raw_value) = update.raw_value {
            record.raw_value = raw_value;
        }
        if let Some(unit) = update.unit {
            record.unit = unit;
        }
        if let Some(formula_id) = update.formula_id {
            record.formula_id = formula_id;
        }

        let record = record.clone();
        Ok(state.property_row(&record))
    }

    async fn delete_property(&self, id: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let before = state.properties.len();
        state.properties.retain(|p| p.id != id);
        if state.properties.len() == before {
            return Err(StoreError::not_found("Property", id));
        }
        Ok(())
    }

    async fn properties_by_formula(&self, formula_id: &str) -> StoreResult<Vec<PropertyRow>> {
        let state = self.state.read().await;
        Ok(state
            .properties
            .iter()
            .filter(|p| p.formula_id.as_deref() == Some(formula_id))
            .map(|p| state.property_row(p))
            .collect())
    }

    async fn attach_file(
        &self,
        property_id: &str,
        file: FileAttachment,
    ) -> StoreResult<PropertyRow> {
        let mut state = self.state.write().await;
        let record = state.property_mut(property_id)?;
        record.files.retain(|f| f.storage_path != file.storage_path);
        record.files.push(file);

        let record = record.clone();
        Ok(state.property_row(&record))
    }

    async fn remove_file(&self, property_id: &str, storage_path: &str) -> StoreResult<PropertyRow> {
        let mut state = self.state.write().await;
        let record = state.property_mut(property_id)?;
        let before = record.files.len();
        record.files.retain(|f| f.storage_path != storage_path);
        if record.files.len() == before {
            return Err(StoreError::not_found("File", storage_path));
        }

        let record = record.clone();
        Ok(state.property_row(&record))
    }

    async fn list_formulas(&self) -> StoreResult<Vec<Formula>> {
        let state = self.state.read().await;
        let mut formulas = state.formulas.clone();
        formulas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(formulas)
    }

    async fn get_formula(&self, id: &str) -> StoreResult<Option<Formula>> {
        let state = self.state.read().await;
        Ok(state.formulas.iter().find(|f| f.id == id).cloned())
    }

    async fn insert_formula(&self, formula: NewFormula) -> StoreResult<Formula> {
        let mut state = self.state.write().await;
        let formula = Formula {
            id: Uuid::new_v4().to_string(),
            name: formula.name,
            expression: formula.expression,
        };
        state.formulas.push(formula.clone());
        Ok(formula)
    }

    async fn update_formula(&self, id: &str, formula: NewFormula) -> StoreResult<Formula> {
        let mut state = self.state.write().await;
        let existing = state
            .formulas
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| StoreError::not_found("Formula", id))?;
        existing.name = formula.name;
        existing.expression = formula.expression;
        Ok(existing.clone())
    }

    async fn delete_formula(&self, id: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let before = state.formulas.len();
        state.formulas.retain(|f| f.id != id);
        if state.formulas.len() == before {
            return Err(StoreError::not_found("Formula", id));
        }

        for property in state
            .properties
            .iter_mut()
            .filter(|p| p.formula_id.as_deref() == Some(id))
        {
            property.formula_id = None;
        }
        Ok(())
    }

    async fn upsert_link(&self, link: NewLink) -> StoreResult<ObjectLink> {
        self.check_links()?;
        if link.parent_id.as_deref() == Some(link.child_id.as_str()) {
            return Err(StoreError::constraint_violation("link cannot target its own parent"));
        }

        let mut state = self.state.write().await;
        if !state.objects.iter().any(|o| o.id == link.child_id) {
            return Err(StoreError::not_found("Object", link.child_id));
        }

        if let Some(existing) = state
            .links
            .iter_mut()
            .find(|l| l.same_edge(link.parent_id.as_deref(), &link.child_id))
        {
            existing.group_key = link.group_key;
            return Ok(existing.clone());
        }

        let created = ObjectLink {
            id: Uuid::new_v4().to_string(),
            parent_id: link.parent_id,
            child_id: link.child_id,
            group_key: link.group_key,
        };
        state.links.push(created.clone());
        Ok(created)
    }

    async fn delete_link(&self, id: &str) -> StoreResult<()> {
        self.check_links()?;
        let mut state = self.state.write().await;
        let before = state.links.len();
        state.links.retain(|l| l.id != id);
        if state.links.len() == before {
            return Err(StoreError::not_found("Link", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_object(name: &str, parent_id: Option<&str>) -> NewObject {
        NewObject {
            name: name.to_string(),
            parent_id: parent_id.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_list_children_ordered_by_name() {
        let store = InMemoryStore::new();
        let root = store
            .insert_objects(vec![new_object("Root", None)], None)
            .await
            .unwrap()
            .remove(0);
        store
            .insert_objects(
                vec![
                    new_object("Zadel", Some(&root.id)),
                    new_object("Aandrijving", Some(&root.id)),
                ],
                None,
            )
            .await
            .unwrap();

        let children = store.list_children(Some(&root.id)).await.unwrap();
        let names: Vec<_> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Aandrijving", "Zadel"]);
    }

    #[tokio::test]
    async fn test_upsert_link_collapses_duplicates() {
        let store = InMemoryStore::new();
        let rows = store
            .insert_objects(vec![new_object("A", None), new_object("B", None)], None)
            .await
            .unwrap();

        let first = store
            .upsert_link(NewLink {
                parent_id: Some(rows[0].id.clone()),
                child_id: rows[1].id.clone(),
                group_key: None,
            })
            .await
            .unwrap();
        let second = store
            .upsert_link(NewLink {
                parent_id: Some(rows[0].id.clone()),
                child_id: rows[1].id.clone(),
                group_key: Some("g".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        let links = store.list_links(Some(&rows[0].id)).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].group_key.as_deref(), Some("g"));
    }

    #[tokio::test]
    async fn test_upsert_link_rejects_self_link() {
        let store = InMemoryStore::new();
        let row = store
            .insert_objects(vec![new_object("A", None)], None)
            .await
            .unwrap()
            .remove(0);

        let result = store
            .upsert_link(NewLink {
                parent_id: Some(row.id.clone()),
                child_id: row.id.clone(),
                group_key: None,
            })
            .await;
        assert!(matches!(result, Err(StoreError::ConstraintViolation(_))));
    }

    #[tokio::test]
    async fn test_unprovisioned_links() {
        let store = InMemoryStore::new();
        store.set_links_provisioned(false);

        let err = store.list_links(None).await.unwrap_err();
        assert!(err.is_not_provisioned());
    }

    #[tokio::test]
    async fn test_delete_objects_cascades_properties_and_links() {
        let store = InMemoryStore::new();
        let rows = store
            .insert_objects(vec![new_object("A", None), new_object("B", None)], None)
            .await
            .unwrap();
        store
            .insert_property(NewProperty {
                object_id: rows[1].id.clone(),
                name: "gewicht".to_string(),
                raw_value: "4".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .upsert_link(NewLink {
                parent_id: Some(rows[0].id.clone()),
                child_id: rows[1].id.clone(),
                group_key: None,
            })
            .await
            .unwrap();

        let removed = store.delete_objects(&[rows[1].id.clone()]).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.list_links(Some(&rows[0].id)).await.unwrap().is_empty());
        assert!(store
            .resolve_objects_by_ids(&[rows[1].id.clone()])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_formula_detaches_properties() {
        let store = InMemoryStore::new();
        let row = store
            .insert_objects(vec![new_object("A", None)], None)
            .await
            .unwrap()
            .remove(0);
        let formula = store
            .insert_formula(NewFormula {
                name: "dubbel".to_string(),
                expression: "x * 2".to_string(),
            })
            .await
            .unwrap();
        let property = store
            .insert_property(NewProperty {
                object_id: row.id.clone(),
                name: "y".to_string(),
                raw_value: "8".to_string(),
                formula_id: Some(formula.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(property.formula.as_ref().map(|f| f.id.as_str()), Some(formula.id.as_str()));

        store.delete_formula(&formula.id).await.unwrap();
        let rows = store.resolve_objects_by_ids(&[row.id.clone()]).await.unwrap();
        assert!(rows[0].properties[0].formula_id.is_none());
        assert_eq!(rows[0].properties[0].raw_value, "8");
    }
}
