//! Engine Services
//!
//! This module contains the services that turn store rows into views:
//!
//! - `HierarchyService` - Builds merged (direct + linked) object trees
//! - `aggregation` - Per-occurrence property totals and subtree rollups
//! - `grouping` - Group-key clustering of sibling lists for display
//! - `ObjectService` - Validated mutations with domain event broadcast
//!
//! Aggregation and grouping are pure functions over a built tree; only the
//! hierarchy and object services talk to the store.

pub mod aggregation;
pub mod error;
pub mod grouping;
pub mod hierarchy_service;
pub mod object_service;

pub use aggregation::{
    aggregate, own_totals, AggregationReport, NodeAggregate, OutputUnitPolicy, Partition,
    PropertyIssue, PropertyTotal, PropertyTotals,
};
pub use error::{HierarchyError, ObjectServiceError};
pub use grouping::{
    build_grouped_list, build_grouped_list_sorted, build_grouped_list_sorted_by,
    build_grouped_list_with, DisplayEntry, GroupingOptions,
};
pub use hierarchy_service::HierarchyService;
pub use object_service::{ObjectService, RecalculationReport};
