//! Store Layer
//!
//! This module is the boundary to the external relational store:
//!
//! - [`ObjectStore`] - async trait every backend implements
//! - [`rows`] - typed row shapes exchanged across the boundary
//! - [`InMemoryStore`] - vector-backed reference implementation
//! - [`DomainEvent`] - change notifications emitted after mutations
//!
//! # Architecture
//!
//! The engine is handed an `Arc<dyn ObjectStore>` rather than reaching for a
//! global client, so every entry point can be exercised against a fake store.
//! Storage engine design itself is out of scope; backends own write
//! consistency for objects, properties and links.

mod error;
pub mod events;
mod memory_store;
mod object_store;
pub mod rows;

pub use error::{StoreError, StoreResult};
pub use events::DomainEvent;
pub use memory_store::{InMemoryStore, StoreCallCounts};
pub use object_store::ObjectStore;
pub use rows::{
    NewFormula, NewLink, NewObject, NewProperty, ObjectRow, ObjectUpdate, ProfileRow,
    PropertyRow, PropertyUpdate,
};
