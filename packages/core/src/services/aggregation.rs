//! Aggregation Engine
//!
//! Rolls property values up a merged hierarchy tree. Every occurrence is
//! aggregated on its own, keyed by its instance path, so an object reached
//! through two links contributes twice.
//!
//! The computation is a pure function of the tree: nothing is cached between
//! calls, callers rebuild the tree and re-aggregate after every mutation.
//!
//! # Partitions
//!
//! - `Hierarchy`: nodes whose material flow type is not a process-flow type
//! - `Flow`: only `raw_material`, `intermediate` and `component` nodes
//!
//! Nodes outside the active partition get no entry, but the walk continues
//! through them: their member descendants roll up into the nearest member
//! ancestor, or into the root totals when there is none.

use crate::formula::{FormulaError, PropertyScope, Resolution};
use crate::models::{MaterialFlowType, ObjectNode, Property};
use crate::utils::{base_unit, convert};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which view of the object set is aggregated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    #[default]
    Hierarchy,
    Flow,
}

impl Partition {
    pub fn includes(self, flow_type: MaterialFlowType) -> bool {
        match self {
            Partition::Hierarchy => !flow_type.is_process_flow(),
            Partition::Flow => flow_type.is_process_flow(),
        }
    }
}

/// Target unit for each property before summation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "units", rename_all = "snake_case")]
pub enum OutputUnitPolicy {
    /// Sum values in whatever unit each property declares
    #[default]
    AsDeclared,
    /// Convert every value to its unit family's base unit (m, kg, L)
    BaseUnits,
    /// Explicit target unit per property name (case-insensitive)
    PerProperty(BTreeMap<String, String>),
}

impl OutputUnitPolicy {
    pub fn per_property<K, V>(units: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::PerProperty(
            units
                .into_iter()
                .map(|(name, unit)| (name.into().trim().to_lowercase(), unit.into()))
                .collect(),
        )
    }

    /// Unit `property` is reported in, `None` when no conversion applies
    pub fn target_unit(&self, property: &Property) -> Option<&str> {
        let declared = property.declared_unit()?;
        match self {
            OutputUnitPolicy::AsDeclared => None,
            OutputUnitPolicy::BaseUnits => base_unit(declared),
            OutputUnitPolicy::PerProperty(units) => units
                .get(&property.name.trim().to_lowercase())
                .map(String::as_str),
        }
    }

    fn apply(&self, property: &Property, value: f64) -> f64 {
        match (property.declared_unit(), self.target_unit(property)) {
            (Some(from), Some(to)) => convert(value, from, to),
            _ => value,
        }
    }
}

/// Running sum for one property name
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyTotal {
    pub total: f64,
    /// Occurrences that produced a number (cyclic values count, as 0)
    pub count: usize,
    /// Occurrences whose evaluation failed; excluded from `total` and `count`
    pub failed: usize,
}

impl PropertyTotal {
    pub fn add(&mut self, value: f64) {
        self.total += value;
        self.count += 1;
    }

    pub fn merge(&mut self, other: &PropertyTotal) {
        self.total += other.total;
        self.count += other.count;
        self.failed += other.failed;
    }
}

pub type PropertyTotals = BTreeMap<String, PropertyTotal>;

fn merge_totals(into: &mut PropertyTotals, from: &PropertyTotals) {
    for (name, total) in from {
        into.entry(name.clone()).or_default().merge(total);
    }
}

/// A property that did not contribute its own value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyIssue {
    pub property_id: String,
    pub property_name: String,
    pub error: FormulaError,
}

/// Aggregation entry for one occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAggregate {
    pub object_id: String,
    pub name: String,
    pub instance_path: String,
    /// The occurrence's own properties
    pub own: PropertyTotals,
    /// Own totals plus every member descendant occurrence
    pub subtree: PropertyTotals,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<PropertyIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationReport {
    pub partition: Partition,
    /// Entries keyed by instance path
    pub nodes: BTreeMap<String, NodeAggregate>,
    /// Sum of every top-level member's subtree totals
    pub root_totals: PropertyTotals,
}

impl AggregationReport {
    pub fn node(&self, instance_path: &str) -> Option<&NodeAggregate> {
        self.nodes.get(instance_path)
    }

    /// Every occurrence of one object, in instance-path order
    pub fn occurrences_of<'a>(&'a self, object_id: &'a str) -> impl Iterator<Item = &'a NodeAggregate> + 'a {
        self.nodes
            .values()
            .filter(move |entry| entry.object_id == object_id)
    }

    pub fn root_total(&self, property_name: &str) -> Option<&PropertyTotal> {
        self.root_totals.get(property_name)
    }
}

/// Instance path of a child below `parent_path`
pub fn instance_path(parent_path: &str, node: &ObjectNode) -> String {
    if parent_path.is_empty() {
        node.instance_key.to_string()
    } else {
        format!("{}/{}", parent_path, node.instance_key)
    }
}

/// Resolve and total one node's own properties
///
/// Partition-independent: the same node yields the same totals in every view.
pub fn own_totals(node: &ObjectNode, policy: &OutputUnitPolicy) -> (PropertyTotals, Vec<PropertyIssue>) {
    let scope = PropertyScope::new(&node.properties);
    let mut totals = PropertyTotals::new();
    let mut issues = Vec::new();

    for property in &node.properties {
        let name = property.name.trim();
        if name.is_empty() {
            continue;
        }
        let entry = totals.entry(name.to_string()).or_default();

        match scope.resolve(property) {
            Resolution::Value(value) => entry.add(policy.apply(property, value)),
            Resolution::Cyclic { name: cyclic } => {
                entry.add(0.0);
                issues.push(PropertyIssue {
                    property_id: property.id.clone(),
                    property_name: name.to_string(),
                    error: FormulaError::cyclic(cyclic),
                });
            }
            Resolution::NotNumeric => {}
            Resolution::Failed(error) => {
                entry.failed += 1;
                issues.push(PropertyIssue {
                    property_id: property.id.clone(),
                    property_name: name.to_string(),
                    error,
                });
            }
        }
    }

    (totals, issues)
}

/// Aggregate a forest of merged trees for one partition
pub fn aggregate(tree: &[ObjectNode], partition: Partition, policy: &OutputUnitPolicy) -> AggregationReport {
    let mut report = AggregationReport {
        partition,
        nodes: BTreeMap::new(),
        root_totals: PropertyTotals::new(),
    };

    for root in tree {
        let contributed = aggregate_node(root, "", partition, policy, &mut report.nodes);
        merge_totals(&mut report.root_totals, &contributed);
    }

    tracing::debug!(
        "Aggregated {} {:?} occurrences across {} trees",
        report.nodes.len(),
        partition,
        tree.len()
    );
    report
}

/// Returns what this occurrence contributes to its nearest member ancestor
fn aggregate_node(
    node: &ObjectNode,
    parent_path: &str,
    partition: Partition,
    policy: &OutputUnitPolicy,
    entries: &mut BTreeMap<String, NodeAggregate>,
) -> PropertyTotals {
    let path = instance_path(parent_path, node);

    let mut descendants = PropertyTotals::new();
    for child in &node.children {
        let contributed = aggregate_node(child, &path, partition, policy, entries);
        merge_totals(&mut descendants, &contributed);
    }

    if !partition.includes(node.material_flow_type) {
        return descendants;
    }

    let (own, issues) = own_totals(node, policy);
    let mut subtree = own.clone();
    merge_totals(&mut subtree, &descendants);

    entries.insert(
        path.clone(),
        NodeAggregate {
            object_id: node.id.clone(),
            name: node.name.clone(),
            instance_path: path,
            own,
            subtree: subtree.clone(),
            issues,
        },
    );
    subtree
}
