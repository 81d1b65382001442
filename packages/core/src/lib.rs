//! ObjectSpace Core Engine
//!
//! This crate turns flat object, property, link and profile rows from an
//! external store into merged hierarchy trees, and computes property rollups
//! and grouped display lists over them.
//!
//! # Architecture
//!
//! - **Injected store**: every entry point works against an `Arc<dyn ObjectStore>`;
//!   there is no global client
//! - **Rebuild, never patch**: trees and aggregates are recomputed from the store
//!   on every view; mutations only broadcast events
//! - **Dedicated formula evaluator**: arithmetic only, no general interpreter
//!
//! # Modules
//!
//! - [`models`] - Object nodes, properties, formulas, links
//! - [`db`] - Store trait, row types, in-memory store, domain events
//! - [`formula`] - Expression parsing, substitution and chained resolution
//! - [`services`] - Hierarchy merger, aggregation, grouping, mutations
//! - [`utils`] - Unit conversion
//! - [`config`] - Engine configuration
//! - [`logging`] - Tracing bootstrap

pub mod config;
pub mod db;
pub mod formula;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig};
pub use models::*;
pub use services::*;
