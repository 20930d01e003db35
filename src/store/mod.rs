//! Schema, storage, materialization, and access control
//!
//! The store layer turns domain entities into kernel nodes and
//! relationships and back, bootstraps a fresh database, and enforces the
//! surrogate view filter on everything handed to a viewer.

pub mod codec;
pub mod factory;
pub mod schema;
pub mod storage;
pub mod view;

pub use storage::{
    ProvenanceStore, StoreError, StoreResult, DEFAULT_SEARCH_RESULTS, MAX_OBJECTS,
};
pub use view::{RedactingPolicy, SurrogatePolicy, SurrogateRegistry};
