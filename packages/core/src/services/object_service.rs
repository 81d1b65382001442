//! Object Service - Mutations Against the Store
//!
//! Validates and performs object, property, formula and link mutations, then
//! broadcasts a [`DomainEvent`] describing what changed. Built trees are never
//! patched: views listen for events and rebuild through `HierarchyService`.
//!
//! # Formula Recalculation
//!
//! Editing a formula template does not touch the properties that used it.
//! Callers wanting fresh cached values ask for them explicitly with
//! [`ObjectService::recalculate_formula`].

use crate::db::{
    DomainEvent, NewFormula, NewLink, NewObject, NewProperty, ObjectRow, ObjectStore,
    ObjectUpdate, PropertyRow, PropertyUpdate,
};
use crate::formula::{validate_expression, FormulaError, PropertyScope};
use crate::models::{FileAttachment, Formula, ObjectLink, Property};
use crate::services::error::ObjectServiceError;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Broadcast channel capacity for domain events
const DOMAIN_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Result of an explicit formula recalculation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculationReport {
    /// Properties referencing the formula
    pub affected: usize,
    /// Properties whose cached value was rewritten
    pub recalculated: usize,
    /// Property id and error for every property that could not be evaluated
    pub failures: Vec<(String, FormulaError)>,
}

#[derive(Clone)]
pub struct ObjectService {
    store: Arc<dyn ObjectStore>,
    event_tx: broadcast::Sender<DomainEvent>,
}

impl ObjectService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        let (event_tx, _) = broadcast::channel(DOMAIN_EVENT_CHANNEL_CAPACITY);
        Self { store, event_tx }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Subscribe to domain events
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use objectspace_core::db::InMemoryStore;
    /// # use objectspace_core::services::ObjectService;
    /// # use std::sync::Arc;
    /// # #[tokio::main]
    /// # async fn main() {
    /// let service = ObjectService::new(Arc::new(InMemoryStore::new()));
    /// let mut rx = service.subscribe_to_events();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = rx.recv().await {
    ///         println!("Event: {}", event.event_type());
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<DomainEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores send errors, there may be no subscribers
    fn emit_event(&self, event: DomainEvent) {
        tracing::debug!("Emitting {}", event.event_type());
        let _ = self.event_tx.send(event);
    }

    // ------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------

    pub async fn create_object(&self, object: NewObject) -> Result<ObjectRow, ObjectServiceError> {
        let mut created = self.create_objects(vec![object]).await?;
        created
            .pop()
            .ok_or_else(|| ObjectServiceError::validation("Store returned no object"))
    }

    /// Create objects in one batch
    ///
    /// More than one object share a freshly generated group key so views can
    /// cluster them.
    pub async fn create_objects(
        &self,
        objects: Vec<NewObject>,
    ) -> Result<Vec<ObjectRow>, ObjectServiceError> {
        if objects.is_empty() {
            return Err(ObjectServiceError::validation("No objects to create"));
        }

        let objects = objects
            .into_iter()
            .map(|mut object| {
                object.name = validate_name(&object.name, "Object")?;
                Ok(object)
            })
            .collect::<Result<Vec<_>, ObjectServiceError>>()?;

        let group_key = (objects.len() > 1).then(|| Uuid::new_v4().to_string());
        let created = self.store.insert_objects(objects, group_key.clone()).await?;

        tracing::debug!("Created {} objects (group {:?})", created.len(), group_key);
        self.emit_event(DomainEvent::ObjectsCreated {
            ids: created.iter().map(|o| o.id.clone()).collect(),
            group_key,
        });
        Ok(created)
    }

    pub async fn update_object(
        &self,
        id: &str,
        mut update: ObjectUpdate,
    ) -> Result<ObjectRow, ObjectServiceError> {
        if let Some(name) = &update.name {
            update.name = Some(validate_name(name, "Object")?);
        }

        let updated = self.store.update_object(id, update).await?;
        self.emit_event(DomainEvent::ObjectUpdated { id: id.to_string() });
        Ok(updated)
    }

    /// Delete an object together with every direct descendant
    ///
    /// Properties of removed objects and links touching them go too. Objects
    /// only linked below the subtree are left alone. Returns the number of
    /// objects removed.
    pub async fn delete_subtree(&self, root_id: &str) -> Result<usize, ObjectServiceError> {
        let rows = self.collect_subtree(root_id).await?;
        let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();

        let removed = self.store.delete_objects(&ids).await?;
        tracing::debug!("Deleted subtree {} ({} objects)", root_id, removed);

        self.emit_event(DomainEvent::SubtreeDeleted {
            root_id: root_id.to_string(),
            removed,
        });
        Ok(removed)
    }

    /// Deep-copy an object's direct-children subtree under `target_parent`
    ///
    /// Copies get new ids and the same names, flow types, group keys and
    /// properties. Links are not copied. Returns the copy of the root.
    pub async fn duplicate_subtree(
        &self,
        source_id: &str,
        target_parent: Option<String>,
    ) -> Result<ObjectRow, ObjectServiceError> {
        // Snapshot first, the copy may land inside the source subtree
        let rows = self.collect_subtree(source_id).await?;

        let mut copied_ids: HashMap<String, String> = HashMap::new();
        let mut root_copy: Option<ObjectRow> = None;

        for row in &rows {
            let parent_id = if row.id == source_id {
                target_parent.clone()
            } else {
                row.parent_id
                    .as_ref()
                    .and_then(|parent| copied_ids.get(parent))
                    .cloned()
            };

            let copy = self
                .store
                .insert_objects(
                    vec![NewObject {
                        name: row.name.clone(),
                        owner_id: row.owner_id.clone(),
                        parent_id,
                        material_flow_type: row.material_flow_type,
                    }],
                    row.group_key.clone(),
                )
                .await?
                .pop()
                .ok_or_else(|| ObjectServiceError::validation("Store returned no object"))?;

            for property in &row.properties {
                self.store
                    .insert_property(NewProperty {
                        object_id: copy.id.clone(),
                        name: property.name.clone(),
                        raw_value: property.raw_value.clone(),
                        unit: property.unit.clone(),
                        formula_id: property.formula_id.clone(),
                        files: property.files.clone(),
                    })
                    .await?;
            }

            copied_ids.insert(row.id.clone(), copy.id.clone());
            if root_copy.is_none() {
                root_copy = Some(copy);
            }
        }

        let root_copy = root_copy.ok_or_else(|| ObjectServiceError::not_found("Object", source_id))?;

        self.emit_event(DomainEvent::SubtreeDuplicated {
            source_id: source_id.to_string(),
            copy_id: root_copy.id.clone(),
            copied: rows.len(),
        });

        // Re-read so the returned row carries the copied properties
        let refreshed = self.require_object(&root_copy.id).await?;
        Ok(refreshed)
    }

    /// Root row followed by its direct descendants, parents before children
    async fn collect_subtree(&self, root_id: &str) -> Result<Vec<ObjectRow>, ObjectServiceError> {
        let root = self.require_object(root_id).await?;

        let mut rows = vec![root];
        let mut queue = VecDeque::from([root_id.to_string()]);
        while let Some(parent_id) = queue.pop_front() {
            for child in self.store.list_children(Some(&parent_id)).await? {
                if rows.iter().any(|row| row.id == child.id) {
                    tracing::warn!("Parent cycle at object {}, not descending", child.id);
                    continue;
                }
                queue.push_back(child.id.clone());
                rows.push(child);
            }
        }
        Ok(rows)
    }

    async fn require_object(&self, id: &str) -> Result<ObjectRow, ObjectServiceError> {
        self.store
            .resolve_objects_by_ids(&[id.to_string()])
            .await?
            .into_iter()
            .find(|row| row.id == id)
            .ok_or_else(|| ObjectServiceError::not_found("Object", id))
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Add a property; names are trimmed and must be unique per object (ignoring case)
    pub async fn add_property(
        &self,
        mut property: NewProperty,
    ) -> Result<PropertyRow, ObjectServiceError> {
        property.name = validate_name(&property.name, "Property")?;

        let object = self.require_object(&property.object_id).await?;
        ensure_unique_property_name(&object, &property.name, None)?;
        if let Some(formula_id) = &property.formula_id {
            self.require_formula(formula_id).await?;
        }

        let created = self.store.insert_property(property).await?;
        self.emit_event(DomainEvent::PropertyChanged {
            object_id: created.object_id.clone(),
            property_id: created.id.clone(),
        });
        Ok(created)
    }

    pub async fn update_property(
        &self,
        object_id: &str,
        property_id: &str,
        mut update: PropertyUpdate,
    ) -> Result<PropertyRow, ObjectServiceError> {
        let object = self.require_object(object_id).await?;
        if !object.properties.iter().any(|p| p.id == property_id) {
            return Err(ObjectServiceError::not_found("Property", property_id));
        }

        if let Some(name) = &update.name {
            let name = validate_name(name, "Property")?;
            ensure_unique_property_name(&object, &name, Some(property_id))?;
            update.name = Some(name);
        }
        if let Some(Some(formula_id)) = &update.formula_id {
            self.require_formula(formula_id).await?;
        }

        let updated = self.store.update_property(property_id, update).await?;
        self.emit_event(DomainEvent::PropertyChanged {
            object_id: updated.object_id.clone(),
            property_id: updated.id.clone(),
        });
        Ok(updated)
    }

    pub async fn delete_property(&self, property_id: &str) -> Result<(), ObjectServiceError> {
        self.store.delete_property(property_id).await?;
        self.emit_event(DomainEvent::PropertyDeleted {
            property_id: property_id.to_string(),
        });
        Ok(())
    }

    pub async fn attach_file(
        &self,
        property_id: &str,
        file: FileAttachment,
    ) -> Result<PropertyRow, ObjectServiceError> {
        if file.name.trim().is_empty() || file.storage_path.trim().is_empty() {
            return Err(ObjectServiceError::validation(
                "File name and storage path cannot be empty",
            ));
        }

        let updated = self.store.attach_file(property_id, file).await?;
        self.emit_event(DomainEvent::PropertyChanged {
            object_id: updated.object_id.clone(),
            property_id: updated.id.clone(),
        });
        Ok(updated)
    }

    pub async fn remove_file(
        &self,
        property_id: &str,
        storage_path: &str,
    ) -> Result<PropertyRow, ObjectServiceError> {
        let updated = self.store.remove_file(property_id, storage_path).await?;
        self.emit_event(DomainEvent::PropertyChanged {
            object_id: updated.object_id.clone(),
            property_id: updated.id.clone(),
        });
        Ok(updated)
    }

    // ------------------------------------------------------------------
    // Formulas
    // ------------------------------------------------------------------

    pub async fn list_formulas(&self) -> Result<Vec<Formula>, ObjectServiceError> {
        Ok(self.store.list_formulas().await?)
    }

    /// Create a formula template; the expression must parse
    pub async fn create_formula(&self, formula: NewFormula) -> Result<Formula, ObjectServiceError> {
        let formula = validate_formula(formula)?;
        let created = self.store.insert_formula(formula).await?;

        self.emit_event(DomainEvent::FormulaChanged {
            formula_id: created.id.clone(),
        });
        Ok(created)
    }

    /// Edit a formula template
    ///
    /// Properties that cached a value from the old expression keep it until
    /// [`recalculate_formula`](Self::recalculate_formula) is called.
    pub async fn update_formula(
        &self,
        id: &str,
        formula: NewFormula,
    ) -> Result<Formula, ObjectServiceError> {
        let formula = validate_formula(formula)?;
        let updated = self.store.update_formula(id, formula).await?;

        self.emit_event(DomainEvent::FormulaChanged {
            formula_id: updated.id.clone(),
        });
        Ok(updated)
    }

    /// Delete a formula template; properties using it are detached, values kept
    pub async fn delete_formula(&self, id: &str) -> Result<(), ObjectServiceError> {
        self.store.delete_formula(id).await?;
        self.emit_event(DomainEvent::FormulaDeleted {
            formula_id: id.to_string(),
        });
        Ok(())
    }

    /// Evaluate a template against an object's other properties and store
    /// the result as the property's cached value
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown object, property or formula
    /// - `Formula` when the template cannot be evaluated in that scope
    pub async fn apply_formula(
        &self,
        object_id: &str,
        property_id: &str,
        formula_id: &str,
    ) -> Result<PropertyRow, ObjectServiceError> {
        let formula = self.require_formula(formula_id).await?;
        let object = self.require_object(object_id).await?;
        if !object.properties.iter().any(|p| p.id == property_id) {
            return Err(ObjectServiceError::not_found("Property", property_id));
        }

        let value = evaluate_in_object(&object, property_id, &formula.expression)?;

        let updated = self
            .store
            .update_property(
                property_id,
                PropertyUpdate {
                    raw_value: Some(value.to_string()),
                    formula_id: Some(Some(formula.id.clone())),
                    ..Default::default()
                },
            )
            .await?;

        self.emit_event(DomainEvent::PropertyChanged {
            object_id: updated.object_id.clone(),
            property_id: updated.id.clone(),
        });
        Ok(updated)
    }

    /// Recompute the cached value of every property using `formula_id`
    ///
    /// Per-property evaluation failures are collected in the report and leave
    /// the old value in place.
    pub async fn recalculate_formula(
        &self,
        formula_id: &str,
    ) -> Result<RecalculationReport, ObjectServiceError> {
        let formula = self.require_formula(formula_id).await?;
        let dependents = self.store.properties_by_formula(formula_id).await?;

        let mut report = RecalculationReport {
            affected: dependents.len(),
            ..Default::default()
        };
        if dependents.is_empty() {
            return Ok(report);
        }

        let mut object_ids: Vec<String> = Vec::new();
        for property in &dependents {
            if !object_ids.contains(&property.object_id) {
                object_ids.push(property.object_id.clone());
            }
        }
        let objects: HashMap<String, ObjectRow> = self
            .store
            .resolve_objects_by_ids(&object_ids)
            .await?
            .into_iter()
            .map(|row| (row.id.clone(), row))
            .collect();

        for property in dependents {
            let Some(object) = objects.get(&property.object_id) else {
                tracing::warn!(
                    "Property {} references missing object {}",
                    property.id,
                    property.object_id
                );
                continue;
            };

            match evaluate_in_object(object, &property.id, &formula.expression) {
                Ok(value) => {
                    self.store
                        .update_property(
                            &property.id,
                            PropertyUpdate {
                                raw_value: Some(value.to_string()),
                                ..Default::default()
                            },
                        )
                        .await?;
                    report.recalculated += 1;
                    self.emit_event(DomainEvent::PropertyChanged {
                        object_id: property.object_id.clone(),
                        property_id: property.id.clone(),
                    });
                }
                Err(e) => {
                    tracing::warn!("Recalculation of property {} failed: {}", property.id, e);
                    report.failures.push((property.id.clone(), e));
                }
            }
        }

        tracing::debug!(
            "Recalculated formula {}: {}/{} properties",
            formula_id,
            report.recalculated,
            report.affected
        );
        Ok(report)
    }

    async fn require_formula(&self, id: &str) -> Result<Formula, ObjectServiceError> {
        self.store
            .get_formula(id)
            .await?
            .ok_or_else(|| ObjectServiceError::not_found("Formula", id))
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Link `child_id` under `parent_id` (root level when `None`)
    ///
    /// Linking the same pair again updates the group key instead of adding a row.
    pub async fn link_objects(&self, link: NewLink) -> Result<ObjectLink, ObjectServiceError> {
        if link.parent_id.as_deref() == Some(link.child_id.as_str()) {
            return Err(ObjectServiceError::self_link(link.child_id));
        }
        if let Some(parent_id) = &link.parent_id {
            self.require_object(parent_id).await?;
        }
        self.require_object(&link.child_id).await?;

        let link = self.store.upsert_link(link).await?;
        self.emit_event(DomainEvent::LinkUpserted(link.clone()));
        Ok(link)
    }

    pub async fn unlink(&self, link_id: &str) -> Result<(), ObjectServiceError> {
        self.store.delete_link(link_id).await?;
        self.emit_event(DomainEvent::LinkDeleted {
            id: link_id.to_string(),
        });
        Ok(())
    }
}

fn validate_name(name: &str, entity: &str) -> Result<String, ObjectServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ObjectServiceError::validation(format!(
            "{} name cannot be empty",
            entity
        )));
    }
    Ok(trimmed.to_string())
}

fn ensure_unique_property_name(
    object: &ObjectRow,
    name: &str,
    except_id: Option<&str>,
) -> Result<(), ObjectServiceError> {
    let lowered = name.to_lowercase();
    let taken = object.properties.iter().any(|p| {
        Some(p.id.as_str()) != except_id && p.name.trim().to_lowercase() == lowered
    });
    if taken {
        return Err(ObjectServiceError::validation(format!(
            "Property '{}' already exists on object {}",
            name, object.id
        )));
    }
    Ok(())
}

fn validate_formula(formula: NewFormula) -> Result<NewFormula, ObjectServiceError> {
    let name = validate_name(&formula.name, "Formula")?;
    let expression = formula.expression.trim().to_string();
    validate_expression(&expression)?;
    Ok(NewFormula { name, expression })
}

/// Evaluate `expression` over an object's properties, hiding the target property
fn evaluate_in_object(
    object: &ObjectRow,
    target_property_id: &str,
    expression: &str,
) -> Result<f64, FormulaError> {
    let properties: Vec<Property> = object
        .properties
        .iter()
        .cloned()
        .map(Property::from)
        .collect();
    PropertyScope::new(&properties)
        .excluding(target_property_id)
        .evaluate(expression)
}
