//! provdb: an embedded provenance graph store
//!
//! A persistent, typed, directed multigraph database specialized for
//! recording, querying, and access-controlled viewing of data-lineage
//! graphs. Services report provenance as collections of objects and typed
//! edges, traverse lineage up- or downstream of a focal object, run
//! ad-hoc pattern queries, and receive views filtered by a viewer's
//! clearance.
//!
//! # Architecture
//!
//! - [`graph`]: the embedded transactional property graph kernel with
//!   labeled nodes, typed relationships, uniqueness constraints, property
//!   auto-indices, scoped transactions, traversal, and pattern queries.
//! - [`persistence`]: RocksDB snapshot storage plus a write-ahead log.
//! - [`model`]: domain entities such as objects, actors, edges,
//!   non-provenance edges, privilege classes, and collections.
//! - [`store`]: schema bootstrap, CRUD, polymorphic hydration, privilege
//!   dominance, and the surrogate view filter.
//! - [`dag`]: lineage discovery and DAG annotation passes.
//! - [`client`]: the user-parameterized facade callers talk to.
//!
//! # Example
//!
//! ```rust
//! use provdb::{
//!     EdgeKind, LocalClient, ProvEdge, ProvObject, ProvenanceCollection,
//!     ProvenanceStore, TraversalSettings, User,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(ProvenanceStore::in_memory().unwrap());
//! let client = LocalClient::new(store, User::god());
//!
//! // Report a small lineage graph.
//! let input = ProvObject::data("raw readings");
//! let output = ProvObject::data("clean readings");
//! let mut col = ProvenanceCollection::new();
//! col.add_node(input.clone());
//! col.add_node(output.clone());
//! col.add_edge(ProvEdge::new(&input.oid, &output.oid, EdgeKind::InputTo));
//! client.report(&col).unwrap();
//!
//! // Spider the graph back out.
//! let dag = client
//!     .get_graph(&input.oid, &TraversalSettings::new().set_n(10))
//!     .unwrap();
//! assert!(dag.contains_oid(&output.oid));
//! ```

#![warn(clippy::all)]

pub mod client;
pub mod dag;
pub mod graph;
pub mod model;
pub mod persistence;
pub mod store;

pub use client::{ClientError, ClientResult, LocalClient};
pub use dag::{new_dag, Fingerprint, LineageDag, TraversalSettings};
pub use graph::{GraphError, GraphKernel, PropertyMap, PropertyValue};
pub use model::{
    is_prov_oid, new_oid, Actor, ActorKind, DataSubtype, EdgeKind, NonProvenanceEdge,
    ObjectKind, PrivilegeClass, PrivilegeSet, ProvEdge, ProvenanceCollection, ProvObject,
    User, DEFAULT_WORKFLOW_OID, GOD_AID, PUBLIC_AID, UNKNOWN_ACTIVITY_OID,
};
pub use persistence::{Persistence, PersistenceError};
pub use store::{
    ProvenanceStore, RedactingPolicy, StoreError, StoreResult, SurrogatePolicy,
    SurrogateRegistry,
};

use std::sync::{Arc, Mutex, OnceLock};

static DEFAULT_STORE: OnceLock<Arc<ProvenanceStore>> = OnceLock::new();
static DEFAULT_STORE_INIT: Mutex<()> = Mutex::new(());

/// The process-wide store at the default location, opened on first use.
///
/// The location comes from `PROVENANCE_DB_LOCATION` when set, else
/// `$HOME/provenance.db`. The store requires exclusive access to its
/// directory for the process lifetime.
pub fn default_store() -> StoreResult<Arc<ProvenanceStore>> {
    if let Some(store) = DEFAULT_STORE.get() {
        return Ok(Arc::clone(store));
    }
    let _guard = DEFAULT_STORE_INIT
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    if let Some(store) = DEFAULT_STORE.get() {
        return Ok(Arc::clone(store));
    }
    let store = Arc::new(ProvenanceStore::open_default()?);
    let _ = DEFAULT_STORE.set(Arc::clone(&store));
    Ok(store)
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
