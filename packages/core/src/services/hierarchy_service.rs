//! Hierarchy Service - Merged Tree Construction
//!
//! This module builds the in-memory object tree the rest of the engine works on.
//! Each level merges two sources:
//!
//! 1. Direct children: objects whose `parent_id` is the level's parent, ordered by name
//! 2. Linked children: one entry per link row whose `parent_id` is the level's parent,
//!    in link-row order, resolved to object rows in a single batched lookup
//!
//! Direct children come first (`direct:<id>`), linked children follow
//! (`link:<linkId>`, or `root-link:<linkId>` at top level) and carry the link's
//! group key when it has one. An object linked twice appears twice; nothing is
//! deduplicated.
//!
//! # Concurrency
//!
//! Trees are built breadth-first: every expandable node of a level has its
//! children fetched concurrently, and the next level starts once all of them
//! have returned. Owner names are resolved with one batched profile lookup per
//! fetched level, which bounds store round-trips on wide trees. The finished
//! occurrences are assembled into nested nodes bottom-up, so tree depth never
//! grows the call stack.
//!
//! # Failure Semantics
//!
//! - Object fetch failure: fatal for the requested subtree (`FetchFailed`)
//! - Link relation not provisioned: warning, treated as "no links"
//! - Profile fetch failure: warning, owners shown as the unknown label
//! - Object already on the current root-to-node path, or depth cap reached:
//!   the occurrence is kept but not expanded, and marked `truncated`

use crate::config::EngineConfig;
use crate::db::{ObjectRow, ObjectStore};
use crate::models::{InstanceKey, ObjectLink, ObjectNode, TruncationReason};
use crate::services::error::HierarchyError;
use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One occurrence during a breadth-first build; tree links are arena indices
struct Slot {
    node: ObjectNode,
    parent: Option<usize>,
    depth: usize,
    children: Vec<usize>,
}

/// State scoped to a single `build_*` call
#[derive(Default)]
struct BuildRun {
    /// Set once the unavailable link source has been warned about
    links_warned: AtomicBool,
}

/// Builds merged hierarchy trees from an `ObjectStore`
///
/// # Examples
///
/// ```no_run
/// # use objectspace_core::db::{InMemoryStore, ObjectStore};
/// # use objectspace_core::services::HierarchyService;
/// # use objectspace_core::EngineConfig;
/// # use std::sync::Arc;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store: Arc<dyn ObjectStore> = Arc::new(InMemoryStore::new());
/// let service = HierarchyService::new(store, EngineConfig::default())?;
/// let roots = service.build_top_level(None).await?;
/// println!("{} top-level objects", roots.len());
/// # Ok(())
/// # }
/// ```
pub struct HierarchyService {
    store: Arc<dyn ObjectStore>,
    config: EngineConfig,
}

impl HierarchyService {
    /// Create a new HierarchyService
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when `config.validate()` fails.
    pub fn new(store: Arc<dyn ObjectStore>, config: EngineConfig) -> Result<Self, HierarchyError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the full merged subtree rooted at `object_id`
    ///
    /// The root occurrence is keyed `direct:<object_id>`.
    ///
    /// # Errors
    ///
    /// - `ObjectNotFound` if the root object does not exist
    /// - `FetchFailed` if any object fetch in the subtree fails
    pub async fn build_subtree(&self, object_id: &str) -> Result<ObjectNode, HierarchyError> {
        let row = self
            .store
            .resolve_objects_by_ids(&[object_id.to_string()])
            .await?
            .into_iter()
            .find(|row| row.id == object_id)
            .ok_or_else(|| HierarchyError::object_not_found(object_id))?;

        let owners = self
            .resolve_owner_names(distinct_owner_ids(std::iter::once(&row)))
            .await;
        let key = InstanceKey::Direct(row.id.clone());
        let root = self.to_node(row, key, &owners);

        self.grow(vec![root], &BuildRun::default())
            .await?
            .pop()
            .ok_or_else(|| HierarchyError::object_not_found(object_id))
    }

    /// Build every top-level tree: root objects followed by root-level links
    ///
    /// With `owner_filter`, only top-level entries owned by that user are kept;
    /// their descendants are not filtered.
    pub async fn build_top_level(
        &self,
        owner_filter: Option<&str>,
    ) -> Result<Vec<ObjectNode>, HierarchyError> {
        let run = BuildRun::default();
        let mut roots = self.fetch_level(None, &run).await?;
        if let Some(owner) = owner_filter {
            roots.retain(|node| node.owner_id.as_deref() == Some(owner));
        }

        self.grow(roots, &run).await
    }

    /// Expand `roots` (depth 0) level by level, then nest the occurrences
    async fn grow(&self, roots: Vec<ObjectNode>, run: &BuildRun) -> Result<Vec<ObjectNode>, HierarchyError> {
        let root_count = roots.len();
        let mut slots: Vec<Slot> = roots
            .into_iter()
            .map(|node| Slot {
                node,
                parent: None,
                depth: 0,
                children: Vec::new(),
            })
            .collect();
        let mut frontier: Vec<usize> = (0..root_count).collect();

        while !frontier.is_empty() {
            let mut expanding = Vec::with_capacity(frontier.len());
            for idx in frontier {
                match self.truncation(&slots, idx) {
                    Some(reason) => slots[idx].node.truncated = Some(reason),
                    None => expanding.push(idx),
                }
            }

            let parent_ids: Vec<String> = expanding
                .iter()
                .map(|&idx| slots[idx].node.id.clone())
                .collect();
            let levels = try_join_all(
                parent_ids
                    .iter()
                    .map(|parent_id| self.fetch_level(Some(parent_id.as_str()), run)),
            )
            .await?;

            let mut next = Vec::new();
            for (parent, children) in expanding.into_iter().zip(levels) {
                let depth = slots[parent].depth + 1;
                for node in children {
                    let idx = slots.len();
                    slots.push(Slot {
                        node,
                        parent: Some(parent),
                        depth,
                        children: Vec::new(),
                    });
                    slots[parent].children.push(idx);
                    next.push(idx);
                }
            }
            frontier = next;
        }

        Ok(assemble(slots, root_count))
    }

    /// Why the occurrence at `idx` must not be expanded, if it must not
    fn truncation(&self, slots: &[Slot], idx: usize) -> Option<TruncationReason> {
        let slot = &slots[idx];

        let mut ancestor = slot.parent;
        while let Some(a) = ancestor {
            if slots[a].node.id == slot.node.id {
                tracing::warn!(
                    "Cyclic link data: object {} already on its own path, not expanding {}",
                    slot.node.id,
                    slot.node.instance_key
                );
                return Some(TruncationReason::CyclicReference);
            }
            ancestor = slots[a].parent;
        }

        if slot.depth >= self.config.max_depth {
            tracing::warn!(
                "Depth limit {} reached at object {}, not expanding",
                self.config.max_depth,
                slot.node.id
            );
            return Some(TruncationReason::DepthLimit);
        }
        None
    }

    /// One level, without recursion: direct children then linked children
    async fn fetch_level(
        &self,
        parent_id: Option<&str>,
        run: &BuildRun,
    ) -> Result<Vec<ObjectNode>, HierarchyError> {
        let direct = self.store.list_children(parent_id).await?;
        let links = self.fetch_links(parent_id, run).await?;

        let links: Vec<ObjectLink> = links
            .into_iter()
            .filter(|link| {
                if link.is_self_link() {
                    tracing::warn!("Skipping self-link {} on object {}", link.id, link.child_id);
                    return false;
                }
                true
            })
            .collect();

        let target_ids: Vec<String> = {
            let mut seen = HashSet::new();
            links
                .iter()
                .filter(|link| seen.insert(link.child_id.as_str()))
                .map(|link| link.child_id.clone())
                .collect()
        };

        let targets: HashMap<String, ObjectRow> = if target_ids.is_empty() {
            HashMap::new()
        } else {
            self.store
                .resolve_objects_by_ids(&target_ids)
                .await?
                .into_iter()
                .map(|row| (row.id.clone(), row))
                .collect()
        };

        tracing::debug!(
            "Fetched level {:?}: {} direct, {} linked",
            parent_id,
            direct.len(),
            links.len()
        );

        let mut entries: Vec<(ObjectRow, InstanceKey)> = direct
            .into_iter()
            .map(|row| {
                let key = InstanceKey::Direct(row.id.clone());
                (row, key)
            })
            .collect();

        for link in links {
            let Some(target) = targets.get(&link.child_id) else {
                tracing::warn!(
                    "Skipping dangling link {}: object {} not found",
                    link.id,
                    link.child_id
                );
                continue;
            };

            let mut row = target.clone();
            if let Some(group_key) = link.group_key.filter(|k| !k.trim().is_empty()) {
                row.group_key = Some(group_key);
            }
            let key = match parent_id {
                Some(_) => InstanceKey::Link(link.id),
                None => InstanceKey::RootLink(link.id),
            };
            entries.push((row, key));
        }

        let owner_ids = distinct_owner_ids(entries.iter().map(|(row, _)| row));
        let owners = self.resolve_owner_names(owner_ids).await;

        Ok(entries
            .into_iter()
            .map(|(row, key)| self.to_node(row, key, &owners))
            .collect())
    }

    async fn fetch_links(
        &self,
        parent_id: Option<&str>,
        run: &BuildRun,
    ) -> Result<Vec<ObjectLink>, HierarchyError> {
        match self.store.list_links(parent_id).await {
            Ok(links) => Ok(links),
            Err(e) if e.is_not_provisioned() && self.config.degrade_missing_links => {
                if !run.links_warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!("Link source unavailable, continuing without links: {}", e);
                } else {
                    tracing::debug!("Link source unavailable for {:?}", parent_id);
                }
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// One batched profile lookup for a whole level
    async fn resolve_owner_names(&self, owner_ids: Vec<String>) -> HashMap<String, String> {
        if owner_ids.is_empty() {
            return HashMap::new();
        }

        match self.store.resolve_profiles_by_ids(&owner_ids).await {
            Ok(profiles) => profiles
                .into_iter()
                .filter_map(|profile| {
                    let label = profile.label()?.to_string();
                    Some((profile.id, label))
                })
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to resolve {} owner profiles: {}", owner_ids.len(), e);
                HashMap::new()
            }
        }
    }

    fn to_node(&self, row: ObjectRow, key: InstanceKey, owners: &HashMap<String, String>) -> ObjectNode {
        let owner_name = row
            .owner_id
            .as_ref()
            .and_then(|id| owners.get(id))
            .cloned()
            .unwrap_or_else(|| self.config.unknown_owner_label.clone());
        ObjectNode::from_row(row, key, owner_name)
    }
}

/// Nest arena slots into trees; children always sit after their parent
fn assemble(slots: Vec<Slot>, root_count: usize) -> Vec<ObjectNode> {
    let mut children_of = Vec::with_capacity(slots.len());
    let mut nodes: Vec<Option<ObjectNode>> = Vec::with_capacity(slots.len());
    for slot in slots {
        children_of.push(slot.children);
        nodes.push(Some(slot.node));
    }

    for idx in (0..nodes.len()).rev() {
        let children: Vec<ObjectNode> = children_of[idx]
            .iter()
            .filter_map(|&child| nodes[child].take())
            .collect();
        if let Some(node) = nodes[idx].as_mut() {
            node.children = children;
        }
    }

    nodes.into_iter().take(root_count).flatten().collect()
}

fn distinct_owner_ids<'r>(rows: impl Iterator<Item = &'r ObjectRow>) -> Vec<String> {
    let mut owner_ids: Vec<String> = Vec::new();
    for owner_id in rows.filter_map(|row| row.owner_id.as_ref()) {
        if !owner_ids.contains(owner_id) {
            owner_ids.push(owner_id.clone());
        }
    }
    owner_ids
}
