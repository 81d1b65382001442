//! Grouped display lists
//!
//! Turns one level of sibling nodes into display entries. Nodes sharing a
//! group key render as consecutive `group-member` entries pointing at one
//! anchor (the first member's id); ungrouped nodes and single-member groups
//! render as plain items. Separators are only emitted on request.

use crate::models::ObjectNode;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DisplayEntry<'a> {
    Item {
        node: &'a ObjectNode,
    },
    GroupMember {
        node: &'a ObjectNode,
        #[serde(rename = "groupKey")]
        group_key: String,
        /// Id of the group's first member, the shared navigation target
        #[serde(rename = "anchorId")]
        anchor_id: String,
    },
    #[serde(rename = "sep")]
    Separator,
}

impl<'a> DisplayEntry<'a> {
    pub fn node(&self) -> Option<&'a ObjectNode> {
        match self {
            DisplayEntry::Item { node } | DisplayEntry::GroupMember { node, .. } => Some(node),
            DisplayEntry::Separator => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupingOptions {
    /// Emit a separator at every boundary touching a multi-member group
    pub separators: bool,
}

impl GroupingOptions {
    pub fn with_separators() -> Self {
        Self { separators: true }
    }
}

/// Nodes rendered together: one ungrouped node, or every member of a group
struct Unit<'a> {
    group_key: Option<&'a str>,
    members: Vec<&'a ObjectNode>,
}

impl Unit<'_> {
    fn is_group(&self) -> bool {
        self.members.len() > 1
    }
}

/// Build a grouped list in input order, without separators
pub fn build_grouped_list(nodes: &[ObjectNode]) -> Vec<DisplayEntry<'_>> {
    build_grouped_list_with(nodes, GroupingOptions::default())
}

/// Build a grouped list in input order
///
/// A group is placed where its first member appears.
pub fn build_grouped_list_with(nodes: &[ObjectNode], options: GroupingOptions) -> Vec<DisplayEntry<'_>> {
    render(partition_units(nodes), options)
}

/// Sorted variant ordering members and units by case-insensitive name
pub fn build_grouped_list_sorted(nodes: &[ObjectNode], options: GroupingOptions) -> Vec<DisplayEntry<'_>> {
    build_grouped_list_sorted_by(nodes, options, |node| node.name.to_lowercase())
}

/// Sorted variant with a caller-provided key
///
/// Members are ordered inside their group first; units are then ordered by
/// their first member's key. Both sorts are stable.
pub fn build_grouped_list_sorted_by<K, F>(
    nodes: &[ObjectNode],
    options: GroupingOptions,
    key: F,
) -> Vec<DisplayEntry<'_>>
where
    K: Ord,
    F: Fn(&ObjectNode) -> K,
{
    let mut units = partition_units(nodes);
    for unit in &mut units {
        unit.members.sort_by_key(|&node| key(node));
    }
    units.sort_by_key(|unit| key(unit.members[0]));
    render(units, options)
}

fn partition_units(nodes: &[ObjectNode]) -> Vec<Unit<'_>> {
    let mut units: Vec<Unit<'_>> = Vec::new();
    let mut group_index: HashMap<&str, usize> = HashMap::new();

    for node in nodes {
        match node.effective_group_key() {
            Some(group_key) => {
                if let Some(&index) = group_index.get(group_key) {
                    units[index].members.push(node);
                } else {
                    group_index.insert(group_key, units.len());
                    units.push(Unit {
                        group_key: Some(group_key),
                        members: vec![node],
                    });
                }
            }
            None => units.push(Unit {
                group_key: None,
                members: vec![node],
            }),
        }
    }

    units
}

fn render(units: Vec<Unit<'_>>, options: GroupingOptions) -> Vec<DisplayEntry<'_>> {
    let mut entries = Vec::with_capacity(units.len());
    let mut previous_was_group = false;

    for (index, unit) in units.into_iter().enumerate() {
        if options.separators && index > 0 && (previous_was_group || unit.is_group()) {
            entries.push(DisplayEntry::Separator);
        }
        previous_was_group = unit.is_group();

        match (unit.group_key, unit.is_group()) {
            (Some(group_key), true) => {
                let anchor_id = unit.members[0].id.clone();
                for node in unit.members {
                    entries.push(DisplayEntry::GroupMember {
                        node,
                        group_key: group_key.to_string(),
                        anchor_id: anchor_id.clone(),
                    });
                }
            }
            _ => {
                for node in unit.members {
                    entries.push(DisplayEntry::Item { node });
                }
            }
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InstanceKey, MaterialFlowType};
    use serde_json::json;

    fn node(id: &str, name: &str, group_key: Option<&str>) -> ObjectNode {
        ObjectNode {
            id: id.to_string(),
            name: name.to_string(),
            owner_id: None,
            owner_name: "unknown".to_string(),
            parent_id: None,
            group_key: group_key.map(str::to_string),
            material_flow_type: MaterialFlowType::Default,
            properties: Vec::new(),
            children: Vec::new(),
            instance_key: InstanceKey::Direct(id.to_string()),
            truncated: None,
        }
    }

    fn shape(entries: &[DisplayEntry<'_>]) -> Vec<String> {
        entries
            .iter()
            .map(|entry| match entry {
                DisplayEntry::Item { node } => format!("item:{}", node.id),
                DisplayEntry::GroupMember { node, anchor_id, .. } => {
                    format!("member:{}@{}", node.id, anchor_id)
                }
                DisplayEntry::Separator => "sep".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_group_members_share_anchor() {
        let nodes = vec![node("1", "a", Some("g")), node("2", "b", Some("g")), node("3", "c", None)];

        let entries = build_grouped_list(&nodes);

        assert_eq!(shape(&entries), vec!["member:1@1", "member:2@1", "item:3"]);
    }

    #[test]
    fn test_single_member_group_is_item() {
        let nodes = vec![node("1", "a", Some("solo")), node("2", "b", Some(" "))];

        assert_eq!(shape(&build_grouped_list(&nodes)), vec!["item:1", "item:2"]);
    }

    #[test]
    fn test_group_placed_at_first_member() {
        let nodes = vec![
            node("1", "a", Some("g")),
            node("2", "b", None),
            node("3", "c", Some("g")),
        ];

        assert_eq!(
            shape(&build_grouped_list(&nodes)),
            vec!["member:1@1", "member:3@1", "item:2"]
        );
    }

    #[test]
    fn test_separators_at_group_boundaries() {
        let nodes = vec![
            node("1", "a", None),
            node("2", "b", Some("g")),
            node("3", "c", Some("g")),
            node("4", "d", None),
            node("5", "e", None),
        ];

        let entries = build_grouped_list_with(&nodes, GroupingOptions::with_separators());

        assert_eq!(
            shape(&entries),
            vec!["item:1", "sep", "member:2@2", "member:3@2", "sep", "item:4", "item:5"]
        );
    }

    #[test]
    fn test_sorted_orders_units_and_members() {
        let nodes = vec![
            node("1", "Zaag", None),
            node("2", "plank", Some("g")),
            node("3", "Bout", Some("g")),
            node("4", "moer", None),
        ];

        let entries = build_grouped_list_sorted(&nodes, GroupingOptions::default());

        assert_eq!(
            shape(&entries),
            vec!["member:3@3", "member:2@3", "item:4", "item:1"]
        );
    }

    #[test]
    fn test_serialized_shape() {
        let nodes = vec![node("1", "a", Some("g")), node("2", "b", Some("g"))];
        let entries = build_grouped_list_with(&nodes, GroupingOptions::default());

        let value = serde_json::to_value(&entries[1]).unwrap();
        assert_eq!(value["type"], json!("group-member"));
        assert_eq!(value["groupKey"], json!("g"));
        assert_eq!(value["anchorId"], json!("1"));
        assert_eq!(
            serde_json::to_value(DisplayEntry::Separator).unwrap(),
            json!({ "type": "sep" })
        );
    }
}
