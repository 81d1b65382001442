//! Performance benchmarks for tree building and aggregation
//!
//! Run with: `cargo bench -p objectspace-core`
//!
//! These benchmarks measure the view-open critical path:
//! - Merged subtree construction against the in-memory store
//! - Aggregation of a prebuilt tree with literal and chained formula properties

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use objectspace_core::db::{InMemoryStore, NewLink, NewObject, NewProperty, ObjectStore};
use objectspace_core::{aggregate, EngineConfig, HierarchyService, OutputUnitPolicy, Partition};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Build a tree `depth` levels deep with `width` children per node
///
/// Every node carries a literal, a unit-bearing literal and a chained formula.
/// Every leaf is additionally linked under the root.
async fn setup_tree(width: usize, depth: usize) -> (Arc<InMemoryStore>, String) {
    let store = Arc::new(InMemoryStore::new());
    let root = store
        .insert_objects(
            vec![NewObject {
                name: "Root".to_string(),
                ..Default::default()
            }],
            None,
        )
        .await
        .unwrap()
        .remove(0);

    let mut level = vec![root.id.clone()];
    for d in 0..depth {
        let mut next = Vec::new();
        for parent in &level {
            let objects = (0..width)
                .map(|i| NewObject {
                    name: format!("Node {}-{}", d, i),
                    parent_id: Some(parent.clone()),
                    ..Default::default()
                })
                .collect();
            for row in store.insert_objects(objects, None).await.unwrap() {
                for (name, raw, unit) in [
                    ("lengte", "2", Some("m")),
                    ("breedte", "30", Some("cm")),
                    ("oppervlak", "lengte * breedte", None),
                    ("dubbel", "oppervlak * 2", None),
                ] {
                    store
                        .insert_property(NewProperty {
                            object_id: row.id.clone(),
                            name: name.to_string(),
                            raw_value: raw.to_string(),
                            unit: unit.map(str::to_string),
                            ..Default::default()
                        })
                        .await
                        .unwrap();
                }
                next.push(row.id);
            }
        }
        level = next;
    }

    for leaf in level.iter().step_by(width.max(1)) {
        store
            .upsert_link(NewLink {
                parent_id: Some(root.id.clone()),
                child_id: leaf.clone(),
                group_key: None,
            })
            .await
            .unwrap();
    }

    (store, root.id)
}

/// Benchmark merged subtree construction
fn bench_build_subtree(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("build_subtree");
    group.sample_size(20);

    for (width, depth) in [(10, 2), (5, 4)] {
        let (store, root_id) = rt.block_on(setup_tree(width, depth));
        let service = HierarchyService::new(store, EngineConfig::default()).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, depth)),
            &root_id,
            |b, root_id| {
                b.iter(|| rt.block_on(async { black_box(service.build_subtree(root_id).await.unwrap()) }));
            },
        );
    }

    group.finish();
}

/// Benchmark aggregation of a prebuilt tree
fn bench_aggregate(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("aggregate");

    for (width, depth) in [(10, 2), (5, 4)] {
        let tree = rt.block_on(async {
            let (store, root_id) = setup_tree(width, depth).await;
            let service = HierarchyService::new(store, EngineConfig::default()).unwrap();
            service.build_subtree(&root_id).await.unwrap()
        });
        let policy = OutputUnitPolicy::BaseUnits;

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, depth)),
            &tree,
            |b, tree| {
                b.iter(|| black_box(aggregate(std::slice::from_ref(tree), Partition::Hierarchy, &policy)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_build_subtree, bench_aggregate);
criterion_main!(benches);
