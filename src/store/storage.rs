//! The provenance store: schema bootstrap and CRUD over the kernel
//!
//! Every public operation opens one transaction, does its work, and
//! commits on success; dropping the transaction on an error path rolls the
//! store back. Duplicate unique keys are idempotent skips, never errors;
//! edges referencing missing endpoints are fatal for that operation.

use super::codec;
use super::factory;
use super::schema::{self, *};
use super::view::{self, SurrogatePolicy, SurrogateRegistry};
use crate::graph::{
    execute, Direction, GraphError, GraphKernel, Label, NodeId, NodePattern, ParseError,
    PatternQuery, PropertyMap, PropertyValue, RelType, TraversalSpec, Traverser, WriteTxn,
};
use crate::model::{
    ids, Actor, EdgeKind, NonProvenanceEdge, ObjectKind, PrivilegeClass, ProvEdge,
    ProvenanceCollection, ProvObject, User,
};
use crate::persistence::PersistenceError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

/// The maximum number of objects returned by any one listing or graph
/// discovery operation.
pub const MAX_OBJECTS: i64 = 500;

/// Result count used when a search does not say how many it wants.
pub const DEFAULT_SEARCH_RESULTS: i64 = 30;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// An identifier did not resolve
    #[error("Not found: {0}")]
    NotFound(String),

    /// Null/empty keys, unsupported direction strings
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An edge insert referenced a missing endpoint
    #[error("Dangling edge: {0}")]
    DanglingEdge(String),

    /// Kernel-level failure
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Durability failure
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Textual query failure
    #[error("Query parse error: {0}")]
    Parse(#[from] ParseError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// An embedded provenance graph store.
pub struct ProvenanceStore {
    kernel: GraphKernel,
    surrogates: RwLock<SurrogateRegistry>,
}

impl ProvenanceStore {
    /// Open (or create) a store at the given directory, bootstrapping a
    /// fresh store with constraints, built-in objects, and the privilege
    /// lattice.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let kernel = GraphKernel::open(path.into(), schema::kernel_config())?;
        let store = ProvenanceStore {
            kernel,
            surrogates: RwLock::new(SurrogateRegistry::new()),
        };
        store.bootstrap_if_needed()?;
        Ok(store)
    }

    /// Open an ephemeral in-memory store. Used by tests and callers that
    /// do not need durability.
    pub fn in_memory() -> StoreResult<Self> {
        let store = ProvenanceStore {
            kernel: GraphKernel::in_memory(schema::kernel_config()),
            surrogates: RwLock::new(SurrogateRegistry::new()),
        };
        store.bootstrap_if_needed()?;
        Ok(store)
    }

    /// The default on-disk location: `PROVENANCE_DB_LOCATION` if set, else
    /// `$HOME/provenance.db`.
    pub fn default_location() -> PathBuf {
        if let Some(loc) = std::env::var_os("PROVENANCE_DB_LOCATION") {
            return PathBuf::from(loc);
        }
        let home = std::env::var_os("HOME").unwrap_or_else(|| ".".into());
        PathBuf::from(home).join("provenance.db")
    }

    /// Open the store at the default location.
    pub fn open_default() -> StoreResult<Self> {
        Self::open(Self::default_location())
    }

    /// Register a surrogate-derivation policy for an object kind.
    pub fn set_surrogate_policy(&self, kind: ObjectKind, policy: Arc<dyn SurrogatePolicy>) {
        self.surrogates
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .register(kind, policy);
    }

    pub(crate) fn registry(&self) -> SurrogateRegistry {
        self.surrogates
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Direct kernel access for the traversal engine.
    pub(crate) fn kernel(&self) -> &GraphKernel {
        &self.kernel
    }

    /// Flush durability state.
    pub fn checkpoint(&self) -> StoreResult<()> {
        self.kernel.checkpoint()?;
        Ok(())
    }

    // ============================================================
    // Bootstrap
    // ============================================================

    /// One-time setup of a fresh store, triggered when the default
    /// workflow OID is absent. Idempotent.
    fn bootstrap_if_needed(&self) -> StoreResult<()> {
        {
            let txn = self.kernel.read();
            if oid_node(&txn, ids::DEFAULT_WORKFLOW_OID).is_some() {
                return Ok(());
            }
        }

        info!("Running one-time setup of this new store");

        self.store_object(&ProvObject::default_workflow())?;
        self.store_object(&ProvObject::unknown_activity())?;
        self.store_actor(&User::god().actor)?;
        self.store_actor(&User::public_user().actor)?;

        self.create_privilege_lattice()?;

        info!("Finished one-time setup");
        Ok(())
    }

    /// The default privilege-class lattice.
    fn create_privilege_lattice(&self) -> StoreResult<()> {
        use PrivilegeClass as PC;

        self.assert_dominates(&PC::admin(), &PC::national_security())?;
        self.assert_dominates(&PC::national_security(), &PC::emergency_high())?;
        self.assert_dominates(&PC::emergency_high(), &PC::emergency_low())?;
        self.assert_dominates(&PC::admin(), &PC::private_medical())?;
        self.assert_dominates(&PC::private_medical(), &PC::public())?;
        self.assert_dominates(&PC::emergency_low(), &PC::public())?;
        self.assert_dominates(&PC::national_security(), &PC::public())?;

        for level in (2..=10).rev() {
            self.assert_dominates(&PC::level(level), &PC::level(level - 1))?;
        }
        Ok(())
    }

    // ============================================================
    // Store operations
    // ============================================================

    /// Store an actor. Re-inserting an existing aid is a skip-logged
    /// no-op; returns whether the actor was newly persisted.
    pub fn store_actor(&self, actor: &Actor) -> StoreResult<bool> {
        let mut txn = self.kernel.write();
        let (_, new) = store_actor_in(&mut txn, actor)?;
        txn.commit()?;
        Ok(new)
    }

    /// Store a provenance object along with its owner link and privilege
    /// bindings. Re-inserting an existing OID is a skip-logged no-op.
    pub fn store_object(&self, obj: &ProvObject) -> StoreResult<bool> {
        let mut txn = self.kernel.write();
        let (_, new) = store_object_in(&mut txn, obj)?;
        txn.commit()?;
        Ok(new)
    }

    /// Store a provenance edge. Both endpoints must already exist.
    pub fn store_edge(&self, edge: &ProvEdge) -> StoreResult<bool> {
        let mut txn = self.kernel.write();
        let new = store_edge_in(&mut txn, edge)?;
        txn.commit()?;
        Ok(new)
    }

    /// Store a non-provenance edge. The `from` endpoint must exist; the
    /// `to` endpoint is resolved as an OID or auto-created as an NPID.
    pub fn store_npe(&self, npe: &NonProvenanceEdge) -> StoreResult<bool> {
        let mut txn = self.kernel.write();
        let new = store_npe_in(&mut txn, npe)?;
        txn.commit()?;
        Ok(new)
    }

    /// Persist a whole collection in one transaction: actors first, then
    /// objects, edges, and NPEs. Returns the number of newly persisted
    /// elements; on any failure nothing is persisted.
    pub fn store_collection(&self, col: &ProvenanceCollection) -> StoreResult<usize> {
        debug!(
            "Storing provenance collection: {} nodes, {} edges, {} npes, {} actors",
            col.count_nodes(),
            col.count_edges(),
            col.count_npes(),
            col.count_actors()
        );
        let mut txn = self.kernel.write();
        let mut new_count = 0;

        // Actors first: objects may be owned by them.
        for actor in col.actors() {
            if store_actor_in(&mut txn, actor)?.1 {
                new_count += 1;
            }
        }
        for obj in col.nodes() {
            if store_object_in(&mut txn, obj)?.1 {
                new_count += 1;
            }
        }
        for edge in col.edges() {
            if store_edge_in(&mut txn, edge)? {
                new_count += 1;
            }
        }
        for npe in col.npes() {
            if store_npe_in(&mut txn, npe)? {
                new_count += 1;
            }
        }

        txn.commit()?;
        Ok(new_count)
    }

    // ============================================================
    // Delete operations
    // ============================================================

    /// Delete an object. With `cascade`, incident relationships go first;
    /// without it, the delete fails if any remain. Returns false when the
    /// OID does not resolve.
    pub fn delete_object(&self, oid: &str, cascade: bool) -> StoreResult<bool> {
        let mut txn = self.kernel.write();
        let Some(node_id) = oid_node(&txn, oid) else {
            warn!("Cannot delete {}: no such object", oid);
            return Ok(false);
        };

        if cascade {
            let incident: Vec<_> = txn.incident_rels(node_id).iter().map(|r| r.id).collect();
            for rel_id in incident {
                txn.delete_rel(rel_id)?;
            }
        }
        txn.delete_node(node_id)?;
        txn.commit()?;
        Ok(true)
    }

    /// Delete the first edge matching `(from, to, kind, workflow)`, where
    /// an absent workflow matches only an absent workflow.
    pub fn delete_edge(&self, edge: &ProvEdge) -> StoreResult<bool> {
        let mut txn = self.kernel.write();
        let Some(from) = oid_node(&txn, &edge.from) else {
            warn!("Cannot delete edge {}: from node does not exist", edge);
            return Ok(false);
        };
        let Some(to) = oid_node(&txn, &edge.to) else {
            warn!("Cannot delete edge {}: to node does not exist", edge);
            return Ok(false);
        };

        let target = find_edge_rel(&txn, from, to, edge);
        match target {
            Some(rel_id) => {
                txn.delete_rel(rel_id)?;
                txn.commit()?;
                Ok(true)
            }
            None => {
                warn!("Cannot delete edge {}: no matching edge found", edge);
                Ok(false)
            }
        }
    }

    // ============================================================
    // Existence and single-element lookups
    // ============================================================

    /// Hydrate the object stored under an OID, unfiltered.
    pub fn get_object(&self, oid: &str) -> StoreResult<Option<ProvObject>> {
        let txn = self.kernel.read();
        match oid_node(&txn, oid) {
            Some(id) => Ok(Some(factory::object_from_node(&txn, id)?)),
            None => Ok(None),
        }
    }

    /// Hydrate and view-filter the object stored under an OID.
    pub fn get_object_for(&self, oid: &str, user: &User) -> StoreResult<Option<ProvObject>> {
        let txn = self.kernel.read();
        let Some(id) = oid_node(&txn, oid) else {
            return Ok(None);
        };
        let obj = factory::object_from_node(&txn, id)?;
        Ok(view::version_suitable_for(&txn, &self.registry(), &obj, user)?)
    }

    /// Look up an actor by aid.
    pub fn get_actor(&self, aid: &str) -> StoreResult<Option<Actor>> {
        if aid.is_empty() {
            return Ok(None);
        }
        let txn = self.kernel.read();
        match aid_node(&txn, aid) {
            Some(id) => Ok(Some(factory::actor_from_node(&txn, id)?)),
            None => Ok(None),
        }
    }

    /// Look up an actor by name.
    pub fn get_actor_by_name(&self, name: &str) -> StoreResult<Option<Actor>> {
        if name.is_empty() {
            return Ok(None);
        }
        let txn = self.kernel.read();
        let label = Label::new(LABEL_ACTOR);
        let hit = txn
            .nodes_with_property(PROP_NAME, &PropertyValue::from(name))
            .into_iter()
            .find(|&id| {
                txn.get_node(id)
                    .map(|n| n.has_label(&label))
                    .unwrap_or(false)
            });
        match hit {
            Some(id) => Ok(Some(factory::actor_from_node(&txn, id)?)),
            None => Ok(None),
        }
    }

    /// Get an actor by name, creating it when absent.
    pub fn get_or_create_actor(&self, name: &str) -> StoreResult<Actor> {
        if let Some(actor) = self.get_actor_by_name(name)? {
            return Ok(actor);
        }
        let actor = Actor::new(name);
        self.store_actor(&actor)?;
        Ok(actor)
    }

    /// Look up a privilege class by pid.
    pub fn get_privilege_class(&self, pid: &str) -> StoreResult<Option<PrivilegeClass>> {
        if pid.is_empty() {
            return Ok(None);
        }
        let txn = self.kernel.read();
        match pid_node(&txn, pid) {
            Some(id) => Ok(Some(factory::privilege_from_node(&txn, id)?)),
            None => Ok(None),
        }
    }

    /// Look up a privilege class by name.
    pub fn get_privilege_by_name(&self, name: &str) -> StoreResult<Option<PrivilegeClass>> {
        if name.is_empty() {
            return Err(StoreError::InvalidArgument(
                "privilege name cannot be empty".to_string(),
            ));
        }
        let txn = self.kernel.read();
        let label = Label::new(LABEL_PRIVILEGE_CLASS);
        let hit = txn
            .nodes_with_property(PROP_NAME, &PropertyValue::from(name))
            .into_iter()
            .find(|&id| {
                txn.get_node(id)
                    .map(|n| n.has_label(&label))
                    .unwrap_or(false)
            });
        match hit {
            Some(id) => Ok(Some(factory::privilege_from_node(&txn, id)?)),
            None => Ok(None),
        }
    }

    /// Whether a non-provenance identifier exists.
    pub fn npid_exists(&self, npid: &str) -> bool {
        let txn = self.kernel.read();
        npid_node(&txn, npid).is_some()
    }

    /// Whether a non-provenance edge with this npeid exists.
    pub fn npe_exists(&self, npe: &NonProvenanceEdge) -> bool {
        let txn = self.kernel.read();
        !txn.rels_with_property(PROP_NPEID, &PropertyValue::from(npe.npeid.as_str()))
            .is_empty()
    }

    /// Whether an identical `(from, to, kind, workflow)` edge exists.
    pub fn edge_exists(&self, edge: &ProvEdge) -> bool {
        let txn = self.kernel.read();
        let (Some(from), Some(to)) = (oid_node(&txn, &edge.from), oid_node(&txn, &edge.to))
        else {
            return false;
        };
        find_edge_rel(&txn, from, to, edge).is_some()
    }

    // ============================================================
    // Listing and search
    // ============================================================

    /// Up to `limit` actors, ordered by name descending.
    pub fn get_actors(&self, limit: i64) -> StoreResult<ProvenanceCollection> {
        let limit = clamp_limit(limit, 100, MAX_OBJECTS);
        let txn = self.kernel.read();
        let q = PatternQuery::node(NodePattern::var("n").with_label(LABEL_ACTOR))
            .order_by("n", PROP_NAME, true)
            .with_limit(limit);
        let rows = execute(&txn, &q)?;

        let mut col = ProvenanceCollection::new();
        for row in rows {
            if let Some(id) = row.node("n") {
                col.add_actor(factory::actor_from_node(&txn, id)?);
            }
        }
        Ok(col)
    }

    /// The most recently created workflows.
    pub fn list_workflows(&self, limit: i64) -> StoreResult<Vec<ProvObject>> {
        let limit = clamp_limit(limit, 100, 1000);
        let txn = self.kernel.read();
        let q = PatternQuery::node(
            NodePattern::var("n")
                .with_label(LABEL_PROVENANCE)
                .with_prop(PROP_TYPE, "workflow"),
        )
        .order_by("n", PROP_CREATED, true)
        .with_limit(limit);
        let rows = execute(&txn, &q)?;

        let mut workflows = Vec::new();
        for row in rows {
            if let Some(id) = row.node("n") {
                let obj = factory::object_from_node(&txn, id)?;
                if obj.is_workflow() {
                    workflows.push(obj);
                } else {
                    warn!("Workflow query returned non-workflow {}", obj.oid);
                }
            }
        }
        Ok(workflows)
    }

    /// The most recent edges reported under a workflow, with their
    /// endpoints, as seen by `user`.
    pub fn get_members(
        &self,
        workflow_oid: &str,
        user: &User,
        limit: i64,
    ) -> StoreResult<ProvenanceCollection> {
        let limit = clamp_limit(limit, 100, MAX_OBJECTS);
        let registry = self.registry();
        let txn = self.kernel.read();

        let mut rel_ids =
            txn.rels_with_property(PROP_WORKFLOW, &PropertyValue::from(workflow_oid));
        rel_ids.sort_by_key(|&id| {
            txn.get_rel(id)
                .map(|r| std::cmp::Reverse(r.created_at))
                .unwrap_or(std::cmp::Reverse(0))
        });
        rel_ids.truncate(limit);

        let mut col = ProvenanceCollection::new();
        for rel_id in rel_ids {
            let Some(rel) = txn.get_rel(rel_id) else {
                continue;
            };
            let (source, target) = (rel.source, rel.target);
            for node_id in [source, target] {
                let obj = factory::object_from_node(&txn, node_id)?;
                if let Some(seen) = view::version_suitable_for(&txn, &registry, &obj, user)? {
                    col.add_node(seen);
                }
            }
            col.add_edge(factory::edge_from_rel(&txn, rel_id)?);
        }
        Ok(col)
    }

    /// Case-insensitive name search over provenance objects, most recent
    /// first, as seen by `user`.
    pub fn search(&self, term: &str, user: &User, limit: i64) -> StoreResult<ProvenanceCollection> {
        let limit = clamp_limit(limit, DEFAULT_SEARCH_RESULTS, MAX_OBJECTS);
        let registry = self.registry();
        let txn = self.kernel.read();

        let needle = term.trim().to_lowercase();
        let mut hits: Vec<&crate::graph::Node> = txn
            .nodes_by_label(&Label::new(LABEL_PROVENANCE))
            .into_iter()
            .filter(|n| {
                codec::prop_string(n, PROP_NAME)
                    .to_lowercase()
                    .contains(&needle)
            })
            .collect();
        hits.sort_by_key(|n| std::cmp::Reverse(codec::prop_i64(n, PROP_CREATED)));

        let mut col = ProvenanceCollection::new();
        for node in hits {
            if col.count_nodes() >= limit {
                break;
            }
            let obj = factory::object_from_node(&txn, node.id)?;
            if let Some(seen) = view::version_suitable_for(&txn, &registry, &obj, user)? {
                col.add_node(seen);
            }
        }
        Ok(col)
    }

    /// Objects carrying every given metadata key/value pair, as seen by
    /// `user`.
    pub fn load_by_metadata(
        &self,
        user: &User,
        fields: &HashMap<String, PropertyValue>,
        limit: i64,
    ) -> StoreResult<ProvenanceCollection> {
        if fields.is_empty() {
            return Err(StoreError::InvalidArgument(
                "metadata query needs at least one field".to_string(),
            ));
        }
        let limit = clamp_limit(limit, 100, MAX_OBJECTS);
        let registry = self.registry();
        let txn = self.kernel.read();

        let mut col = ProvenanceCollection::new();
        for node in txn.nodes_by_label(&Label::new(LABEL_PROVENANCE)) {
            if col.count_nodes() >= limit {
                break;
            }
            let all_match = fields.iter().all(|(k, v)| {
                node.get_property(&codec::metadata_property_name(k))
                    == Some(&codec::encode_metadata_value(v))
            });
            if !all_match {
                continue;
            }
            let obj = factory::object_from_node(&txn, node.id)?;
            if let Some(seen) = view::version_suitable_for(&txn, &registry, &obj, user)? {
                col.add_node(seen);
            }
        }
        Ok(col)
    }

    /// The most recently created provenance objects, as seen by `user`.
    pub fn get_recently_created(&self, user: &User, limit: i64) -> StoreResult<ProvenanceCollection> {
        let limit = clamp_limit(limit, 20, MAX_OBJECTS);
        let registry = self.registry();
        let txn = self.kernel.read();

        let q = PatternQuery::node(NodePattern::var("n").with_label(LABEL_PROVENANCE))
            .order_by("n", PROP_CREATED, true)
            .with_limit(limit);
        let rows = execute(&txn, &q)?;

        let mut col = ProvenanceCollection::new();
        for row in rows {
            if let Some(id) = row.node("n") {
                let obj = factory::object_from_node(&txn, id)?;
                if let Some(seen) = view::version_suitable_for(&txn, &registry, &obj, user)? {
                    col.add_node(seen);
                }
            }
        }
        Ok(col)
    }

    /// Objects owned by an actor, as seen by `user`.
    pub fn get_owned_objects(
        &self,
        aid: &str,
        user: &User,
        limit: i64,
    ) -> StoreResult<ProvenanceCollection> {
        if aid.is_empty() {
            return Err(StoreError::InvalidArgument("invalid actor".to_string()));
        }
        let limit = clamp_limit(limit, 100, MAX_OBJECTS);
        let registry = self.registry();
        let txn = self.kernel.read();
        let Some(actor_id) = aid_node(&txn, aid) else {
            return Err(StoreError::NotFound(format!("actor {}", aid)));
        };

        let owns = RelType::new(REL_OWNS);
        let mut col = ProvenanceCollection::new();
        for rel in txn.outgoing_rels(actor_id) {
            if col.count_nodes() >= limit {
                break;
            }
            if rel.rel_type != owns || !factory::is_prov_object_node(&txn, rel.target) {
                continue;
            }
            let obj = factory::object_from_node(&txn, rel.target)?;
            if let Some(seen) = view::version_suitable_for(&txn, &registry, &obj, user)? {
                col.add_node(seen);
            }
        }
        debug!("{} nodes owned by {}", col.count_nodes(), aid);
        Ok(col)
    }

    /// All privilege classes in the store.
    pub fn list_privilege_classes(&self) -> StoreResult<Vec<PrivilegeClass>> {
        let txn = self.kernel.read();
        let mut classes = Vec::new();
        for node in txn.nodes_by_label(&Label::new(LABEL_PRIVILEGE_CLASS)) {
            classes.push(factory::privilege_from_node(&txn, node.id)?);
        }
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(classes)
    }

    /// Non-provenance edges, most recent first. With an identifier, only
    /// edges incident to that identifier.
    pub fn get_non_provenance_edges(
        &self,
        npid: Option<&str>,
        _user: &User,
        limit: i64,
    ) -> StoreResult<ProvenanceCollection> {
        let limit = clamp_limit(limit, 100, MAX_OBJECTS);
        let txn = self.kernel.read();
        let npe_type = RelType::new(REL_NPE);

        let mut rels: Vec<&crate::graph::Relationship> = match npid {
            Some(npid) => match npid_node(&txn, npid) {
                Some(id) => txn
                    .incident_rels(id)
                    .into_iter()
                    .filter(|r| r.rel_type == npe_type)
                    .collect(),
                None => Vec::new(),
            },
            None => txn.all_rels().filter(|r| r.rel_type == npe_type).collect(),
        };
        rels.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        rels.truncate(limit);

        let mut col = ProvenanceCollection::new();
        for rel in rels {
            col.add_npe(factory::npe_from_rel(&txn, rel.id)?);
        }
        Ok(col)
    }

    /// Provenance objects immediately incident to a non-provenance
    /// identifier, along with the connecting edges.
    pub fn get_incident_provenance(
        &self,
        npid: &str,
        limit: i64,
    ) -> StoreResult<ProvenanceCollection> {
        let limit = clamp_limit(limit, 50, MAX_OBJECTS);
        let txn = self.kernel.read();

        let mut col = ProvenanceCollection::new();
        let Some(id) = npid_node(&txn, npid) else {
            return Ok(col);
        };

        let npe_type = RelType::new(REL_NPE);
        for rel in txn.incident_rels(id) {
            if col.count_nodes() >= limit {
                break;
            }
            if rel.rel_type != npe_type {
                continue;
            }
            let plus_end = if factory::is_prov_object_node(&txn, rel.source) {
                rel.source
            } else {
                rel.target
            };
            if factory::is_prov_object_node(&txn, plus_end) {
                col.add_node(factory::object_from_node(&txn, plus_end)?);
            }
            col.add_npe(factory::npe_from_rel(&txn, rel.id)?);
        }
        Ok(col)
    }

    /// Edges (and optionally NPEs) incident to a set of objects.
    ///
    /// `direction` is `bling` (toward inputs), `fling` (toward outputs),
    /// or `both`; anything else is an error, as is asking for neither
    /// edges nor NPEs.
    pub fn get_incident_edges(
        &self,
        oids: &[String],
        _user: &User,
        direction: &str,
        include_edges: bool,
        include_npes: bool,
    ) -> StoreResult<ProvenanceCollection> {
        if !include_edges && !include_npes {
            return Err(StoreError::InvalidArgument(
                "no results possible".to_string(),
            ));
        }
        let dir = match direction {
            "fling" => Direction::Outgoing,
            "bling" => Direction::Incoming,
            "both" => Direction::Both,
            other => {
                return Err(StoreError::InvalidArgument(format!(
                    "invalid direction {}: valid is fling, bling, both",
                    other
                )))
            }
        };

        let txn = self.kernel.read();
        let npe_type = RelType::new(REL_NPE);
        let mut col = ProvenanceCollection::new();

        for oid in oids {
            let Some(id) = oid_node(&txn, oid) else {
                continue;
            };
            let rels = match dir {
                Direction::Outgoing => txn.outgoing_rels(id),
                Direction::Incoming => txn.incoming_rels(id),
                Direction::Both => txn.incident_rels(id),
            };
            for rel in rels {
                if rel.rel_type == npe_type {
                    if include_npes {
                        col.add_npe(factory::npe_from_rel(&txn, rel.id)?);
                    }
                } else if include_edges
                    && EdgeKind::from_str(rel.rel_type.as_str()).is_some()
                {
                    col.add_edge(factory::edge_from_rel(&txn, rel.id)?);
                }
            }
        }
        Ok(col)
    }

    /// Lineage edges one hop upstream of an object.
    pub fn get_bling(&self, oid: &str, user: &User) -> StoreResult<ProvenanceCollection> {
        self.get_incident_edges(&[oid.to_string()], user, "bling", true, false)
    }

    /// Lineage edges one hop downstream of an object.
    pub fn get_fling(&self, oid: &str, user: &User) -> StoreResult<ProvenanceCollection> {
        self.get_incident_edges(&[oid.to_string()], user, "fling", true, false)
    }

    /// Whether a lineage path connects two objects, in either direction,
    /// within the bounded path length.
    pub fn path_exists(&self, one: &str, two: &str) -> StoreResult<bool> {
        let txn = self.kernel.read();
        let (Some(a), Some(b)) = (oid_node(&txn, one), oid_node(&txn, two)) else {
            return Ok(false);
        };
        if a == b {
            return Ok(true);
        }
        let types = schema::provenance_rel_types();
        Ok(
            crate::graph::path_exists(&txn, a, b, &types, Direction::Outgoing, MAX_PATH_LENGTH)
                || crate::graph::path_exists(
                    &txn,
                    a,
                    b,
                    &types,
                    Direction::Incoming,
                    MAX_PATH_LENGTH,
                ),
        )
    }

    // ============================================================
    // Privileges
    // ============================================================

    /// Whether privilege class `one` dominates `other`.
    pub fn dominates(&self, one: &PrivilegeClass, other: &PrivilegeClass) -> StoreResult<bool> {
        let txn = self.kernel.read();
        Ok(view::dominates(&txn, one, other)?)
    }

    /// Record that `a` dominates `b`, creating either class as needed.
    pub fn assert_dominates(&self, a: &PrivilegeClass, b: &PrivilegeClass) -> StoreResult<()> {
        let mut txn = self.kernel.write();
        let na = get_or_create_privilege_in(&mut txn, a)?;
        let nb = get_or_create_privilege_in(&mut txn, b)?;

        let dominates_type = RelType::new(REL_DOMINATES);
        let already = txn
            .outgoing_rels(na)
            .iter()
            .any(|r| r.rel_type == dominates_type && r.target == nb);
        if !already {
            txn.create_rel(na, nb, REL_DOMINATES, PropertyMap::new())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Run an object through the surrogate view filter for a viewer.
    pub fn version_suitable_for(
        &self,
        obj: &ProvObject,
        user: &User,
    ) -> StoreResult<Option<ProvObject>> {
        let txn = self.kernel.read();
        Ok(view::version_suitable_for(&txn, &self.registry(), obj, user)?)
    }

    // ============================================================
    // Taint
    // ============================================================

    /// Mark an object as tainted: creates a taint object one hop upstream
    /// connected by a `marks` edge under the default workflow.
    pub fn taint(&self, oid: &str, user: &User, description: &str) -> StoreResult<ProvObject> {
        let taint = ProvObject::taint(user, description);
        let edge = ProvEdge::new(&taint.oid, oid, EdgeKind::Marks)
            .in_workflow(ids::DEFAULT_WORKFLOW_OID);

        let mut txn = self.kernel.write();
        if oid_node(&txn, oid).is_none() {
            return Err(StoreError::NotFound(format!("object {}", oid)));
        }
        store_object_in(&mut txn, &taint)?;
        store_edge_in(&mut txn, &edge)?;
        txn.commit()?;
        Ok(taint)
    }

    /// Remove the taints attached directly to an object; returns how many
    /// taint objects were deleted.
    pub fn remove_taints(&self, oid: &str) -> StoreResult<usize> {
        let mut txn = self.kernel.write();
        let Some(node_id) = oid_node(&txn, oid) else {
            return Err(StoreError::NotFound(format!("object {}", oid)));
        };

        let marks = RelType::new(EdgeKind::Marks.as_str());
        let taint_ids: Vec<NodeId> = txn
            .incoming_rels(node_id)
            .iter()
            .filter(|r| r.rel_type == marks)
            .map(|r| r.source)
            .collect();

        let mut removed = 0;
        for taint_id in taint_ids {
            let obj = factory::object_from_node(&txn, taint_id)?;
            if !(obj.heritable && obj.is_taint()) {
                warn!("Failed to remove non-taint mark source {}", obj.oid);
                continue;
            }
            let incident: Vec<_> = txn.incident_rels(taint_id).iter().map(|r| r.id).collect();
            for rel_id in incident {
                txn.delete_rel(rel_id)?;
            }
            txn.delete_node(taint_id)?;
            removed += 1;
        }
        txn.commit()?;
        Ok(removed)
    }

    /// Taints attached directly to an object: heritable taint objects one
    /// lineage hop upstream, whatever edge kind connects them.
    pub fn get_direct_taints(&self, oid: &str, user: &User) -> StoreResult<ProvenanceCollection> {
        let registry = self.registry();
        let txn = self.kernel.read();
        let Some(node_id) = oid_node(&txn, oid) else {
            return Err(StoreError::NotFound(format!("object {}", oid)));
        };

        let mut col = ProvenanceCollection::new();
        for rel in factory::incident_lineage_rels(&txn, node_id, Direction::Incoming) {
            let obj = factory::object_from_node(&txn, rel.source)?;
            if obj.heritable && obj.is_taint() {
                if let Some(seen) = view::version_suitable_for(&txn, &registry, &obj, user)? {
                    col.add_node(seen);
                }
            }
        }
        Ok(col)
    }

    /// Taints marking strict ancestors of an object, found by walking the
    /// lineage upstream within the bounded path length. Direct taints are
    /// not included.
    pub fn get_indirect_taint_sources(
        &self,
        oid: &str,
        user: &User,
    ) -> StoreResult<ProvenanceCollection> {
        let registry = self.registry();
        let txn = self.kernel.read();
        let Some(node_id) = oid_node(&txn, oid) else {
            return Err(StoreError::NotFound(format!("object {}", oid)));
        };

        let spec = TraversalSpec::new(schema::provenance_rel_types(), Direction::Incoming)
            .with_max_depth(MAX_PATH_LENGTH);
        let marks = RelType::new(EdgeKind::Marks.as_str());
        let mut col = ProvenanceCollection::new();

        for (ancestor, depth) in Traverser::new(&txn, node_id, spec) {
            if col.count_nodes() >= 50 {
                break;
            }
            if depth == 0 {
                // The object itself: its marks are direct taints.
                continue;
            }
            for rel in txn.incoming_rels(ancestor) {
                if rel.rel_type != marks {
                    continue;
                }
                let obj = factory::object_from_node(&txn, rel.source)?;
                if obj.heritable && obj.is_taint() {
                    if let Some(seen) = view::version_suitable_for(&txn, &registry, &obj, user)? {
                        col.add_node(seen);
                    }
                }
            }
        }
        Ok(col)
    }

    /// All taint sources of an object, direct and inherited.
    pub fn get_all_taint_sources(&self, oid: &str, user: &User) -> StoreResult<ProvenanceCollection> {
        let mut col = self.get_indirect_taint_sources(oid, user)?;
        col.add_all(self.get_direct_taints(oid, user)?);
        Ok(col)
    }

    /// Direct taints per object within an already-assembled collection.
    /// Consults no storage; taints absent from the collection are not
    /// found.
    pub fn taint_sources(col: &ProvenanceCollection) -> HashMap<String, Vec<ProvObject>> {
        let mut taints: HashMap<String, Vec<ProvObject>> = HashMap::new();
        for obj in col.nodes() {
            for edge in col.inbound_edges_of(&obj.oid) {
                if edge.kind != EdgeKind::Marks {
                    continue;
                }
                if let Some(source) = col.get_node(&edge.from) {
                    if source.is_taint() {
                        taints
                            .entry(obj.oid.clone())
                            .or_default()
                            .push(source.clone());
                    }
                }
            }
        }
        taints
    }

    // ============================================================
    // Textual queries
    // ============================================================

    /// Run a textual pattern query and extract its provenance content, as
    /// seen by `user`. Results are capped at 500 rows unless the query
    /// says otherwise.
    pub fn query(&self, text: &str, user: &User) -> StoreResult<ProvenanceCollection> {
        info!("Query for {}", text);
        let mut query = crate::graph::parse_query(text, &HashMap::new())?;
        if query.limit.is_none() {
            query.limit = Some(500);
        }

        let registry = self.registry();
        let txn = self.kernel.read();
        let rows = execute(&txn, &query)?;
        let raw = factory::collection_from_rows(&txn, &rows)?;

        // View-filter the hydrated nodes before they reach the caller.
        let mut col = ProvenanceCollection::new();
        for obj in raw.nodes() {
            if let Some(seen) = view::version_suitable_for(&txn, &registry, obj, user)? {
                col.add_node(seen);
            }
        }
        for edge in raw.edges() {
            col.add_edge(edge.clone());
        }
        for npe in raw.npes() {
            col.add_npe(npe.clone());
        }
        for actor in raw.actors() {
            col.add_actor(actor.clone());
        }
        Ok(col)
    }
}

// ============================================================
// Internal helpers operating inside a caller's transaction
// ============================================================

pub(crate) fn oid_node(g: &crate::graph::GraphStore, oid: &str) -> Option<NodeId> {
    g.lookup_unique(
        &Label::new(LABEL_PROVENANCE),
        PROP_OID,
        &PropertyValue::from(oid),
    )
}

pub(crate) fn aid_node(g: &crate::graph::GraphStore, aid: &str) -> Option<NodeId> {
    g.lookup_unique(&Label::new(LABEL_ACTOR), PROP_AID, &PropertyValue::from(aid))
}

pub(crate) fn pid_node(g: &crate::graph::GraphStore, pid: &str) -> Option<NodeId> {
    g.lookup_unique(
        &Label::new(LABEL_PRIVILEGE_CLASS),
        PROP_PID,
        &PropertyValue::from(pid),
    )
}

pub(crate) fn npid_node(g: &crate::graph::GraphStore, npid: &str) -> Option<NodeId> {
    g.lookup_unique(
        &Label::new(LABEL_NON_PROVENANCE),
        PROP_NPID,
        &PropertyValue::from(npid),
    )
}

fn find_edge_rel(
    g: &crate::graph::GraphStore,
    from: NodeId,
    to: NodeId,
    edge: &ProvEdge,
) -> Option<crate::graph::RelId> {
    let rel_type = RelType::new(edge.kind.as_str());
    g.outgoing_rels(from)
        .into_iter()
        .filter(|r| r.rel_type == rel_type && r.target == to)
        .find(|r| {
            let stored_wf = r
                .get_property(PROP_WORKFLOW)
                .and_then(|v| v.as_string())
                .filter(|s| !s.is_empty());
            stored_wf == edge.workflow.as_deref()
        })
        .map(|r| r.id)
}

fn store_actor_in(txn: &mut WriteTxn<'_>, actor: &Actor) -> StoreResult<(NodeId, bool)> {
    if actor.aid.is_empty() {
        return Err(StoreError::InvalidArgument("actor aid is empty".to_string()));
    }
    if let Some(existing) = aid_node(txn, &actor.aid) {
        warn!(
            "Skipping storage of actor {} under aid {}: aid already exists",
            actor.name, actor.aid
        );
        return Ok((existing, false));
    }

    debug!("STORE actor {}", actor);
    let id = txn.create_node(vec![Label::new(LABEL_ACTOR)], codec::actor_to_props(actor))?;
    Ok((id, true))
}

fn store_object_in(txn: &mut WriteTxn<'_>, obj: &ProvObject) -> StoreResult<(NodeId, bool)> {
    if obj.oid.is_empty() {
        return Err(StoreError::InvalidArgument("object oid is empty".to_string()));
    }
    if let Some(existing) = oid_node(txn, &obj.oid) {
        warn!(
            "Skipping storage of {} under OID {}: OID already exists",
            obj.name, obj.oid
        );
        return Ok((existing, false));
    }

    debug!("STORE: {}", obj);
    let node_id = txn.create_node(
        vec![Label::new(LABEL_PROVENANCE)],
        codec::object_to_props(obj),
    )?;

    if let Some(owner) = &obj.owner {
        match aid_node(txn, &owner.aid) {
            Some(actor_id) => {
                txn.create_rel(actor_id, node_id, REL_OWNS, PropertyMap::new())?;
            }
            None => warn!(
                "Cannot store owner of {}: aid {} does not exist; actors must be pre-saved",
                obj.oid, owner.aid
            ),
        }
    }

    for pc in obj.privileges.iter() {
        let pc_node = get_or_create_privilege_in(txn, pc)?;
        txn.create_rel(node_id, pc_node, REL_CONTROLLED_BY, PropertyMap::new())?;
    }

    Ok((node_id, true))
}

fn store_edge_in(txn: &mut WriteTxn<'_>, edge: &ProvEdge) -> StoreResult<bool> {
    debug!("STORE edge {}", edge);
    let from = oid_node(txn, &edge.from).ok_or_else(|| {
        StoreError::DanglingEdge(format!("edge {}: from OID is not in the store", edge))
    })?;
    let to = oid_node(txn, &edge.to).ok_or_else(|| {
        StoreError::DanglingEdge(format!("edge {}: to OID is not in the store", edge))
    })?;

    if find_edge_rel(txn, from, to, edge).is_some() {
        debug!("Edge {} already present; skipping", edge);
        return Ok(false);
    }

    let mut props = PropertyMap::new();
    if let Some(wf) = &edge.workflow {
        props.insert(PROP_WORKFLOW.to_string(), wf.clone().into());
    }
    txn.create_rel(from, to, edge.kind.as_str(), props)?;
    Ok(true)
}

fn store_npe_in(txn: &mut WriteTxn<'_>, npe: &NonProvenanceEdge) -> StoreResult<bool> {
    debug!("STORE NPE {}", npe);
    let from = oid_node(txn, &npe.from).ok_or_else(|| {
        StoreError::DanglingEdge(format!("NPE {}: from OID is not in the store", npe))
    })?;

    if !txn
        .rels_with_property(PROP_NPEID, &PropertyValue::from(npe.npeid.as_str()))
        .is_empty()
    {
        debug!("NPE {} already present; skipping", npe.npeid);
        return Ok(false);
    }

    let other_side = if ids::is_prov_oid(&npe.to) {
        oid_node(txn, &npe.to).ok_or_else(|| {
            StoreError::DanglingEdge(format!("NPE {}: to OID is not in the store", npe))
        })?
    } else {
        get_or_create_npid_in(txn, &npe.to)?
    };

    txn.create_rel(from, other_side, REL_NPE, codec::npe_to_props(npe))?;
    Ok(true)
}

fn get_or_create_privilege_in(
    txn: &mut WriteTxn<'_>,
    pc: &PrivilegeClass,
) -> StoreResult<NodeId> {
    if let Some(id) = pid_node(txn, &pc.pid) {
        return Ok(id);
    }
    Ok(txn.create_node(
        vec![Label::new(LABEL_PRIVILEGE_CLASS)],
        codec::privilege_to_props(pc),
    )?)
}

fn get_or_create_npid_in(txn: &mut WriteTxn<'_>, npid: &str) -> StoreResult<NodeId> {
    if npid.is_empty() {
        return Err(StoreError::InvalidArgument("npid is empty".to_string()));
    }
    if let Some(id) = npid_node(txn, npid) {
        return Ok(id);
    }
    let mut props = PropertyMap::new();
    props.insert(PROP_NPID.to_string(), npid.into());
    Ok(txn.create_node(vec![Label::new(LABEL_NON_PROVENANCE)], props)?)
}

/// Clamp a requested limit: non-positive or over-max requests silently
/// fall back to the default.
fn clamp_limit(requested: i64, default: i64, max: i64) -> usize {
    if requested <= 0 || requested > max {
        default as usize
    } else {
        requested as usize
    }
}
