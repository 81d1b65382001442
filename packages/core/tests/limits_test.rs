//! Engine behaviour at its size limits
//!
//! Tests cover:
//! - Long chains of formula properties on one object
//! - A parent chain as deep as the largest accepted `max_depth`

use anyhow::{Context, Result};
use objectspace_core::{
    aggregate,
    config::MAX_SUPPORTED_DEPTH,
    db::{InMemoryStore, NewObject, NewProperty, ObjectStore},
    own_totals, EngineConfig, HierarchyService, ObjectNode, OutputUnitPolicy, Partition,
    TruncationReason,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

async fn create(store: &InMemoryStore, name: &str, parent_id: Option<&str>) -> Result<String> {
    let row = store
        .insert_objects(
            vec![NewObject {
                name: name.to_string(),
                parent_id: parent_id.map(str::to_string),
                ..Default::default()
            }],
            None,
        )
        .await?
        .remove(0);
    Ok(row.id)
}

async fn property(store: &InMemoryStore, object_id: &str, name: &str, raw: &str) -> Result<()> {
    store
        .insert_property(NewProperty {
            object_id: object_id.to_string(),
            name: name.to_string(),
            raw_value: raw.to_string(),
            ..Default::default()
        })
        .await?;
    Ok(())
}

// =========================================================================
// Formula Chains
// =========================================================================

#[tokio::test]
async fn test_long_formula_chain_resolves_quickly() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let service = HierarchyService::new(store.clone(), EngineConfig::default())?;

    let root = create(&store, "Reeks", None).await?;
    property(&store, &root, "p0", "1").await?;
    property(&store, &root, "p1", "1").await?;
    for i in 2..60 {
        let formula = format!("p{} + p{}", i - 1, i - 2);
        property(&store, &root, &format!("p{}", i), &formula).await?;
    }

    let tree = service.build_subtree(&root).await?;

    let started = Instant::now();
    let (totals, issues) = own_totals(&tree, &OutputUnitPolicy::AsDeclared);
    let report = aggregate(std::slice::from_ref(&tree), Partition::Hierarchy, &OutputUnitPolicy::AsDeclared);
    let elapsed = started.elapsed();

    assert!(issues.is_empty());
    assert_eq!(totals["p19"].total, 6765.0);
    assert_eq!(totals["p59"].total, 1_548_008_755_920.0);
    assert_eq!(
        report.root_total("p59").context("p59 missing")?.total,
        1_548_008_755_920.0
    );
    assert!(
        elapsed < Duration::from_secs(5),
        "Chain of 60 formulas took {:?}",
        elapsed
    );
    Ok(())
}

// =========================================================================
// Depth Ceiling
// =========================================================================

#[tokio::test]
async fn test_chain_at_depth_ceiling_builds() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let config = EngineConfig::default().with_max_depth(MAX_SUPPORTED_DEPTH);
    let service = HierarchyService::new(store.clone(), config)?;

    let root = create(&store, "L0", None).await?;
    let mut parent = root.clone();
    for level in 1..=MAX_SUPPORTED_DEPTH + 1 {
        parent = create(&store, &format!("L{}", level), Some(&parent)).await?;
    }

    let tree = service.build_subtree(&root).await?;

    // Occurrences down to the ceiling; the one at the ceiling is not expanded
    assert_eq!(tree.occurrence_count(), MAX_SUPPORTED_DEPTH + 1);

    let mut node: &ObjectNode = &tree;
    let mut depth = 0;
    while let Some(child) = node.children.first() {
        assert!(node.truncated.is_none(), "Truncated early at depth {}", depth);
        node = child;
        depth += 1;
    }
    assert_eq!(depth, MAX_SUPPORTED_DEPTH);
    assert_eq!(node.name, format!("L{}", MAX_SUPPORTED_DEPTH));
    assert_eq!(node.truncated, Some(TruncationReason::DepthLimit));
    Ok(())
}

#[tokio::test]
async fn test_depth_beyond_ceiling_rejected() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let config = EngineConfig::default().with_max_depth(MAX_SUPPORTED_DEPTH + 1);

    assert!(HierarchyService::new(store, config).is_err());
    Ok(())
}
