//! Integration tests for ObjectService
//!
//! Tests cover:
//! - Subtree delete and duplicate
//! - Formula templates: apply, edit without recalculation, explicit recalculation
//! - File attachments
//! - Links and event emission

use anyhow::{Context, Result};
use objectspace_core::{
    db::{InMemoryStore, NewFormula, NewLink, NewObject, NewProperty, ObjectRow, ObjectStore, PropertyUpdate},
    EngineConfig, FileAttachment, HierarchyService, MutationOutcome, ObjectService,
    ObjectServiceError,
};
use std::sync::Arc;

fn create_test_env() -> (Arc<InMemoryStore>, ObjectService) {
    let store = Arc::new(InMemoryStore::new());
    let service = ObjectService::new(store.clone());
    (store, service)
}

fn object(name: &str, parent_id: Option<&str>) -> NewObject {
    NewObject {
        name: name.to_string(),
        parent_id: parent_id.map(str::to_string),
        ..Default::default()
    }
}

fn property(object_id: &str, name: &str, raw: &str) -> NewProperty {
    NewProperty {
        object_id: object_id.to_string(),
        name: name.to_string(),
        raw_value: raw.to_string(),
        ..Default::default()
    }
}

// =========================================================================
// Subtree Tests
// =========================================================================

#[tokio::test]
async fn test_delete_subtree_removes_descendants_only() -> Result<()> {
    let (store, service) = create_test_env();
    let kast = service.create_object(object("Kast", None)).await?;
    let plank = service.create_object(object("Plank", Some(&kast.id))).await?;
    service.create_object(object("Schroef", Some(&plank.id))).await?;
    let lamp = service.create_object(object("Lamp", None)).await?;
    service
        .link_objects(NewLink {
            parent_id: Some(kast.id.clone()),
            child_id: lamp.id.clone(),
            group_key: None,
        })
        .await?;

    let removed = service.delete_subtree(&kast.id).await?;

    assert_eq!(removed, 3);
    let remaining = store.list_children(None).await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, lamp.id, "Linked objects survive");
    assert!(store.list_links(Some(&kast.id)).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_subtree_copies_properties() -> Result<()> {
    let (store, service) = create_test_env();
    let kast = service.create_object(object("Kast", None)).await?;
    let plank = service.create_object(object("Plank", Some(&kast.id))).await?;
    service.add_property(property(&plank.id, "lengte", "80")).await?;

    let copy = service.duplicate_subtree(&kast.id, None).await?;

    assert_ne!(copy.id, kast.id);
    assert_eq!(copy.name, "Kast");
    let copied_children = store.list_children(Some(&copy.id)).await?;
    assert_eq!(copied_children.len(), 1);
    assert_ne!(copied_children[0].id, plank.id);
    assert_eq!(copied_children[0].properties[0].raw_value, "80");
    assert_eq!(store.list_children(None).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_into_own_subtree_terminates() -> Result<()> {
    let (store, service) = create_test_env();
    let kast = service.create_object(object("Kast", None)).await?;
    service.create_object(object("Plank", Some(&kast.id))).await?;

    let copy = service.duplicate_subtree(&kast.id, Some(kast.id.clone())).await?;

    assert_eq!(copy.parent_id.as_deref(), Some(kast.id.as_str()));
    assert_eq!(store.list_children(Some(&kast.id)).await?.len(), 2);
    Ok(())
}

// =========================================================================
// Formula Tests
// =========================================================================

#[tokio::test]
async fn test_apply_formula_stores_result() -> Result<()> {
    let (_store, service) = create_test_env();
    let plank = service.create_object(object("Plank", None)).await?;
    service.add_property(property(&plank.id, "lengte", "3")).await?;
    service.add_property(property(&plank.id, "breedte", "4")).await?;
    let oppervlak = service.add_property(property(&plank.id, "oppervlak", "")).await?;
    let formula = service
        .create_formula(NewFormula {
            name: "Oppervlak".to_string(),
            expression: "lengte * breedte".to_string(),
        })
        .await?;

    let updated = service
        .apply_formula(&plank.id, &oppervlak.id, &formula.id)
        .await?;

    assert_eq!(updated.raw_value, "12");
    assert_eq!(updated.formula_id.as_deref(), Some(formula.id.as_str()));
    Ok(())
}

#[tokio::test]
async fn test_multi_word_template_accepted_and_applied() -> Result<()> {
    let (_store, service) = create_test_env();
    let plank = service.create_object(object("Plank", None)).await?;
    service.add_property(property(&plank.id, "breedte plank", "30")).await?;
    let target = service.add_property(property(&plank.id, "dubbel", "")).await?;
    let formula = service
        .create_formula(NewFormula {
            name: "Dubbel".to_string(),
            expression: "breedte plank * 2".to_string(),
        })
        .await?;

    let updated = service.apply_formula(&plank.id, &target.id, &formula.id).await?;

    assert_eq!(updated.raw_value, "60");
    Ok(())
}

#[tokio::test]
async fn test_apply_formula_missing_variable() -> Result<()> {
    let (_store, service) = create_test_env();
    let plank = service.create_object(object("Plank", None)).await?;
    service.add_property(property(&plank.id, "a", "1")).await?;
    let target = service.add_property(property(&plank.id, "som", "")).await?;
    let formula = service
        .create_formula(NewFormula {
            name: "Som".to_string(),
            expression: "a + b".to_string(),
        })
        .await?;

    let result = service.apply_formula(&plank.id, &target.id, &formula.id).await;
    assert!(matches!(result, Err(ObjectServiceError::Formula(_))));
    Ok(())
}

#[tokio::test]
async fn test_formula_edit_requires_explicit_recalculation() -> Result<()> {
    let (store, service) = create_test_env();
    let plank = service.create_object(object("Plank", None)).await?;
    service.add_property(property(&plank.id, "lengte", "3")).await?;
    let target = service.add_property(property(&plank.id, "dubbel", "")).await?;
    let formula = service
        .create_formula(NewFormula {
            name: "Dubbel".to_string(),
            expression: "lengte * 2".to_string(),
        })
        .await?;
    service.apply_formula(&plank.id, &target.id, &formula.id).await?;

    service
        .update_formula(
            &formula.id,
            NewFormula {
                name: "Dubbel".to_string(),
                expression: "lengte * 3".to_string(),
            },
        )
        .await?;

    let cached = |rows: Vec<ObjectRow>| -> Result<String> {
        let row = rows.into_iter().next().context("object missing")?;
        let prop = row
            .properties
            .into_iter()
            .find(|p| p.name == "dubbel")
            .context("property missing")?;
        Ok(prop.raw_value)
    };

    let before = cached(store.resolve_objects_by_ids(&[plank.id.clone()]).await?)?;
    assert_eq!(before, "6", "Editing a formula does not recompute");

    let report = service.recalculate_formula(&formula.id).await?;
    assert_eq!(report.affected, 1);
    assert_eq!(report.recalculated, 1);
    assert!(report.failures.is_empty());

    let after = cached(store.resolve_objects_by_ids(&[plank.id.clone()]).await?)?;
    assert_eq!(after, "9");
    Ok(())
}

#[tokio::test]
async fn test_delete_formula_detaches_properties() -> Result<()> {
    let (_store, service) = create_test_env();
    let plank = service.create_object(object("Plank", None)).await?;
    service.add_property(property(&plank.id, "lengte", "3")).await?;
    let target = service.add_property(property(&plank.id, "dubbel", "")).await?;
    let formula = service
        .create_formula(NewFormula {
            name: "Dubbel".to_string(),
            expression: "lengte * 2".to_string(),
        })
        .await?;
    service.apply_formula(&plank.id, &target.id, &formula.id).await?;

    service.delete_formula(&formula.id).await?;

    assert!(service.list_formulas().await?.is_empty());
    let report = service.recalculate_formula(&formula.id).await;
    assert!(matches!(report, Err(ObjectServiceError::NotFound { .. })));
    Ok(())
}

// =========================================================================
// Property and File Tests
// =========================================================================

#[tokio::test]
async fn test_rename_property_checks_duplicates() -> Result<()> {
    let (_store, service) = create_test_env();
    let plank = service.create_object(object("Plank", None)).await?;
    service.add_property(property(&plank.id, "lengte", "3")).await?;
    let breedte = service.add_property(property(&plank.id, "breedte", "4")).await?;

    let clash = service
        .update_property(
            &plank.id,
            &breedte.id,
            PropertyUpdate {
                name: Some("Lengte".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(clash, Err(ObjectServiceError::ValidationFailed(_))));

    let renamed = service
        .update_property(
            &plank.id,
            &breedte.id,
            PropertyUpdate {
                name: Some(" Breedte ".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(renamed.name, "Breedte");
    Ok(())
}

#[tokio::test]
async fn test_attach_and_remove_file() -> Result<()> {
    let (_store, service) = create_test_env();
    let plank = service.create_object(object("Plank", None)).await?;
    let tekening = service.add_property(property(&plank.id, "tekening", "zie bijlage")).await?;

    let file = FileAttachment {
        name: "plank.pdf".to_string(),
        storage_path: "objects/plank.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        size_bytes: 2048,
    };
    let with_file = service.attach_file(&tekening.id, file).await?;
    assert_eq!(with_file.files.len(), 1);

    let without = service.remove_file(&tekening.id, "objects/plank.pdf").await?;
    assert!(without.files.is_empty());

    let missing = service.remove_file(&tekening.id, "objects/plank.pdf").await;
    assert!(matches!(missing, Err(ObjectServiceError::Store(_))));
    Ok(())
}

// =========================================================================
// Link and Event Tests
// =========================================================================

#[tokio::test]
async fn test_links_upsert_and_render() -> Result<()> {
    let (store, service) = create_test_env();
    let kast = service.create_object(object("Kast", None)).await?;
    let lamp = service.create_object(object("Lamp", None)).await?;

    let first = service
        .link_objects(NewLink {
            parent_id: Some(kast.id.clone()),
            child_id: lamp.id.clone(),
            group_key: None,
        })
        .await?;
    let second = service
        .link_objects(NewLink {
            parent_id: Some(kast.id.clone()),
            child_id: lamp.id.clone(),
            group_key: Some("verlichting".to_string()),
        })
        .await?;
    assert_eq!(first.id, second.id, "Same pair collapses into one link");

    let hierarchy = HierarchyService::new(store.clone(), EngineConfig::default())?;
    let tree = hierarchy.build_subtree(&kast.id).await?;
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].effective_group_key(), Some("verlichting"));

    service.unlink(&first.id).await?;
    let tree = hierarchy.build_subtree(&kast.id).await?;
    assert!(tree.children.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_event_sequence_and_outcome() -> Result<()> {
    let (_store, service) = create_test_env();
    let mut rx = service.subscribe_to_events();

    let batch = service
        .create_objects(vec![object("Poot 1", None), object("Poot 2", None)])
        .await?;
    let prop = service.add_property(property(&batch[0].id, "hoogte", "45")).await?;
    service.delete_property(&prop.id).await?;

    let types: Vec<&'static str> = (0..3)
        .map(|_| rx.try_recv().map(|e| e.event_type()))
        .collect::<Result<_, _>>()?;
    assert_eq!(types, vec!["objects:created", "property:changed", "property:deleted"]);

    let failed = service.delete_property(&prop.id).await;
    let outcome = MutationOutcome::from_result(&failed);
    assert!(!outcome.success);
    assert!(outcome.error.is_some());
    assert!(rx.try_recv().is_err(), "Failures emit nothing");
    Ok(())
}
