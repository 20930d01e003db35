//! In-memory graph storage with constraint and auto-index maintenance
//!
//! The store keeps nodes and relationships in id-addressed arenas with
//! adjacency lists, a label index, unique-constraint indices, and
//! configurable property auto-indices for nodes and relationships. All
//! mutation goes through the transaction layer in `txn`.

use super::node::Node;
use super::property::{IndexKey, PropertyMap};
use super::relationship::Relationship;
use super::types::{Label, NodeId, RelId, RelType};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur during kernel graph operations
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Relationship {0} not found")]
    RelNotFound(RelId),

    #[error("Invalid relationship: source node {0} does not exist")]
    InvalidRelSource(NodeId),

    #[error("Invalid relationship: target node {0} does not exist")]
    InvalidRelTarget(NodeId),

    #[error("Unique constraint violated on ({label}, {key}) by value {value}")]
    ConstraintViolation {
        label: Label,
        key: String,
        value: String,
    },

    #[error("Node {0} still has incident relationships")]
    NodeInUse(NodeId),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Static kernel configuration: which properties are auto-indexed and which
/// (label, property) pairs carry a uniqueness constraint. Declared once at
/// open time, before any data is loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Node property names maintained in the node auto-index
    pub node_indexed_props: Vec<String>,
    /// Relationship property names maintained in the relationship auto-index
    pub rel_indexed_props: Vec<String>,
    /// Uniqueness constraints per (label, property)
    pub unique_constraints: Vec<(Label, String)>,
}

/// In-memory graph storage.
#[derive(Debug)]
pub struct GraphStore {
    /// Node arena (None = deleted)
    nodes: Vec<Option<Node>>,

    /// Relationship arena (None = deleted)
    rels: Vec<Option<Relationship>>,

    /// Outgoing relationships for each node (adjacency list)
    outgoing: Vec<Vec<RelId>>,

    /// Incoming relationships for each node (adjacency list)
    incoming: Vec<Vec<RelId>>,

    /// Label index for fast lookups
    label_index: HashMap<Label, HashSet<NodeId>>,

    /// Declared uniqueness constraints
    constraints: HashSet<(Label, String)>,

    /// Unique value index: (label, property) -> value -> owning node
    unique_index: HashMap<(Label, String), HashMap<IndexKey, NodeId>>,

    /// Node property names covered by the auto-index
    node_indexed_props: HashSet<String>,

    /// Node auto-index: property -> value -> nodes
    node_index: HashMap<String, HashMap<IndexKey, HashSet<NodeId>>>,

    /// Relationship property names covered by the auto-index
    rel_indexed_props: HashSet<String>,

    /// Relationship auto-index: property -> value -> relationships
    rel_index: HashMap<String, HashMap<IndexKey, HashSet<RelId>>>,

    /// Next node ID
    next_node_id: u64,

    /// Next relationship ID
    next_rel_id: u64,
}

impl GraphStore {
    /// Create a new empty graph store with the given index configuration.
    pub fn new(config: &KernelConfig) -> Self {
        GraphStore {
            nodes: Vec::with_capacity(1024),
            rels: Vec::with_capacity(4096),
            outgoing: Vec::with_capacity(1024),
            incoming: Vec::with_capacity(1024),
            label_index: HashMap::new(),
            constraints: config.unique_constraints.iter().cloned().collect(),
            unique_index: HashMap::new(),
            node_indexed_props: config.node_indexed_props.iter().cloned().collect(),
            node_index: HashMap::new(),
            rel_indexed_props: config.rel_indexed_props.iter().cloned().collect(),
            rel_index: HashMap::new(),
            next_node_id: 1,
            next_rel_id: 1,
        }
    }

    // ============================================================
    // Node operations
    // ============================================================

    /// Create a node with the given labels and properties.
    ///
    /// Fails with `ConstraintViolation` if a declared unique (label,
    /// property) pair already holds the same value on another node.
    pub fn create_node(
        &mut self,
        labels: Vec<Label>,
        properties: PropertyMap,
    ) -> GraphResult<NodeId> {
        self.check_constraints(&labels, &properties)?;

        let node_id = NodeId::new(self.next_node_id);
        self.next_node_id += 1;

        let node = Node::new(node_id, labels, properties);
        self.insert_node_record(node);
        Ok(node_id)
    }

    /// Insert a node that already has an id, preserving it.
    ///
    /// Used during recovery from persistence and transaction rollback; the
    /// caller is responsible for id uniqueness.
    pub fn insert_recovered_node(&mut self, node: Node) {
        if node.id.as_u64() >= self.next_node_id {
            self.next_node_id = node.id.as_u64() + 1;
        }
        self.insert_node_record(node);
    }

    fn insert_node_record(&mut self, node: Node) {
        let node_id = node.id;
        let idx = node_id.as_u64() as usize;

        if idx >= self.nodes.len() {
            self.nodes.resize(idx + 1, None);
            self.outgoing.resize(idx + 1, Vec::new());
            self.incoming.resize(idx + 1, Vec::new());
        }

        for label in &node.labels {
            self.label_index
                .entry(label.clone())
                .or_default()
                .insert(node_id);
        }

        self.index_node(&node);
        self.nodes[idx] = Some(node);
    }

    /// Get a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.as_u64() as usize)?.as_ref()
    }

    /// Check if a node exists
    pub fn has_node(&self, id: NodeId) -> bool {
        self.get_node(id).is_some()
    }

    /// Delete a node. Fails if incident relationships remain.
    pub fn delete_node(&mut self, id: NodeId) -> GraphResult<Node> {
        let idx = id.as_u64() as usize;
        if self.get_node(id).is_none() {
            return Err(GraphError::NodeNotFound(id));
        }
        if !self.outgoing[idx].is_empty() || !self.incoming[idx].is_empty() {
            return Err(GraphError::NodeInUse(id));
        }

        let node = self.nodes[idx].take().ok_or(GraphError::NodeNotFound(id))?;

        for label in &node.labels {
            if let Some(set) = self.label_index.get_mut(label) {
                set.remove(&id);
            }
        }
        self.unindex_node(&node);

        Ok(node)
    }

    // ============================================================
    // Relationship operations
    // ============================================================

    /// Create a relationship between two existing nodes.
    pub fn create_rel(
        &mut self,
        source: NodeId,
        target: NodeId,
        rel_type: impl Into<RelType>,
        properties: PropertyMap,
    ) -> GraphResult<RelId> {
        if !self.has_node(source) {
            return Err(GraphError::InvalidRelSource(source));
        }
        if !self.has_node(target) {
            return Err(GraphError::InvalidRelTarget(target));
        }

        let rel_id = RelId::new(self.next_rel_id);
        self.next_rel_id += 1;

        let rel = Relationship::new(rel_id, source, target, rel_type, properties);
        self.insert_rel_record(rel);
        Ok(rel_id)
    }

    /// Insert a relationship that already has an id, preserving it.
    ///
    /// Source and target must already exist.
    pub fn insert_recovered_rel(&mut self, rel: Relationship) -> GraphResult<()> {
        if !self.has_node(rel.source) {
            return Err(GraphError::InvalidRelSource(rel.source));
        }
        if !self.has_node(rel.target) {
            return Err(GraphError::InvalidRelTarget(rel.target));
        }
        if rel.id.as_u64() >= self.next_rel_id {
            self.next_rel_id = rel.id.as_u64() + 1;
        }
        self.insert_rel_record(rel);
        Ok(())
    }

    fn insert_rel_record(&mut self, rel: Relationship) {
        let rel_id = rel.id;
        let idx = rel_id.as_u64() as usize;

        if idx >= self.rels.len() {
            self.rels.resize(idx + 1, None);
        }

        self.outgoing[rel.source.as_u64() as usize].push(rel_id);
        self.incoming[rel.target.as_u64() as usize].push(rel_id);

        self.index_rel(&rel);
        self.rels[idx] = Some(rel);
    }

    /// Get a relationship by ID
    pub fn get_rel(&self, id: RelId) -> Option<&Relationship> {
        self.rels.get(id.as_u64() as usize)?.as_ref()
    }

    /// Delete a relationship
    pub fn delete_rel(&mut self, id: RelId) -> GraphResult<Relationship> {
        let idx = id.as_u64() as usize;
        let rel = self
            .rels
            .get_mut(idx)
            .and_then(|r| r.take())
            .ok_or(GraphError::RelNotFound(id))?;

        if let Some(adj) = self.outgoing.get_mut(rel.source.as_u64() as usize) {
            adj.retain(|&rid| rid != id);
        }
        if let Some(adj) = self.incoming.get_mut(rel.target.as_u64() as usize) {
            adj.retain(|&rid| rid != id);
        }
        self.unindex_rel(&rel);

        Ok(rel)
    }

    /// Get all outgoing relationships from a node
    pub fn outgoing_rels(&self, node_id: NodeId) -> Vec<&Relationship> {
        self.outgoing
            .get(node_id.as_u64() as usize)
            .map(|ids| ids.iter().filter_map(|&id| self.get_rel(id)).collect())
            .unwrap_or_default()
    }

    /// Get all incoming relationships to a node
    pub fn incoming_rels(&self, node_id: NodeId) -> Vec<&Relationship> {
        self.incoming
            .get(node_id.as_u64() as usize)
            .map(|ids| ids.iter().filter_map(|&id| self.get_rel(id)).collect())
            .unwrap_or_default()
    }

    /// All relationships incident to a node, outgoing and incoming.
    pub fn incident_rels(&self, node_id: NodeId) -> Vec<&Relationship> {
        let mut rels = self.outgoing_rels(node_id);
        rels.extend(self.incoming_rels(node_id));
        rels
    }

    // ============================================================
    // Lookups
    // ============================================================

    /// Get all nodes with a specific label
    pub fn nodes_by_label(&self, label: &Label) -> Vec<&Node> {
        self.label_index
            .get(label)
            .map(|ids| ids.iter().filter_map(|&id| self.get_node(id)).collect())
            .unwrap_or_default()
    }

    /// Look up the single node holding `value` for a unique (label, property).
    ///
    /// Returns None when the value is absent or the pair carries no
    /// constraint.
    pub fn lookup_unique(
        &self,
        label: &Label,
        key: &str,
        value: &super::property::PropertyValue,
    ) -> Option<NodeId> {
        let ik = IndexKey::from_value(value)?;
        self.unique_index
            .get(&(label.clone(), key.to_string()))
            .and_then(|m| m.get(&ik))
            .copied()
    }

    /// Nodes whose auto-indexed property `key` equals `value`.
    ///
    /// Falls back to a scan when the property is not indexed.
    pub fn nodes_with_property(
        &self,
        key: &str,
        value: &super::property::PropertyValue,
    ) -> Vec<NodeId> {
        if self.node_indexed_props.contains(key) {
            if let Some(ik) = IndexKey::from_value(value) {
                return self
                    .node_index
                    .get(key)
                    .and_then(|m| m.get(&ik))
                    .map(|s| {
                        let mut v: Vec<NodeId> = s.iter().copied().collect();
                        v.sort();
                        v
                    })
                    .unwrap_or_default();
            }
        }
        self.all_nodes()
            .filter(|n| n.get_property(key) == Some(value))
            .map(|n| n.id)
            .collect()
    }

    /// Relationships whose auto-indexed property `key` equals `value`.
    pub fn rels_with_property(
        &self,
        key: &str,
        value: &super::property::PropertyValue,
    ) -> Vec<RelId> {
        if self.rel_indexed_props.contains(key) {
            if let Some(ik) = IndexKey::from_value(value) {
                return self
                    .rel_index
                    .get(key)
                    .and_then(|m| m.get(&ik))
                    .map(|s| {
                        let mut v: Vec<RelId> = s.iter().copied().collect();
                        v.sort();
                        v
                    })
                    .unwrap_or_default();
            }
        }
        self.all_rels()
            .filter(|r| r.get_property(key) == Some(value))
            .map(|r| r.id)
            .collect()
    }

    /// Iterate over all live nodes
    pub fn all_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter_map(|n| n.as_ref())
    }

    /// Iterate over all live relationships
    pub fn all_rels(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter().filter_map(|r| r.as_ref())
    }

    /// Get total number of nodes
    pub fn node_count(&self) -> usize {
        self.all_nodes().count()
    }

    /// Get total number of relationships
    pub fn rel_count(&self) -> usize {
        self.all_rels().count()
    }

    // ============================================================
    // Index maintenance
    // ============================================================

    fn check_constraints(&self, labels: &[Label], properties: &PropertyMap) -> GraphResult<()> {
        for label in labels {
            for (key, value) in properties {
                if !self.constraints.contains(&(label.clone(), key.clone())) {
                    continue;
                }
                if let Some(ik) = IndexKey::from_value(value) {
                    let taken = self
                        .unique_index
                        .get(&(label.clone(), key.clone()))
                        .map(|m| m.contains_key(&ik))
                        .unwrap_or(false);
                    if taken {
                        return Err(GraphError::ConstraintViolation {
                            label: label.clone(),
                            key: key.clone(),
                            value: value.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn index_node(&mut self, node: &Node) {
        for (key, value) in &node.properties {
            let Some(ik) = IndexKey::from_value(value) else {
                continue;
            };
            for label in &node.labels {
                if self.constraints.contains(&(label.clone(), key.clone())) {
                    self.unique_index
                        .entry((label.clone(), key.clone()))
                        .or_default()
                        .insert(ik.clone(), node.id);
                }
            }
            if self.node_indexed_props.contains(key) {
                self.node_index
                    .entry(key.clone())
                    .or_default()
                    .entry(ik)
                    .or_default()
                    .insert(node.id);
            }
        }
    }

    fn unindex_node(&mut self, node: &Node) {
        for (key, value) in &node.properties {
            let Some(ik) = IndexKey::from_value(value) else {
                continue;
            };
            for label in &node.labels {
                if let Some(m) = self.unique_index.get_mut(&(label.clone(), key.clone())) {
                    m.remove(&ik);
                }
            }
            if let Some(m) = self.node_index.get_mut(key) {
                if let Some(set) = m.get_mut(&ik) {
                    set.remove(&node.id);
                }
            }
        }
    }

    fn index_rel(&mut self, rel: &Relationship) {
        for (key, value) in &rel.properties {
            if !self.rel_indexed_props.contains(key) {
                continue;
            }
            if let Some(ik) = IndexKey::from_value(value) {
                self.rel_index
                    .entry(key.clone())
                    .or_default()
                    .entry(ik)
                    .or_default()
                    .insert(rel.id);
            }
        }
    }

    fn unindex_rel(&mut self, rel: &Relationship) {
        for (key, value) in &rel.properties {
            if let Some(ik) = IndexKey::from_value(value) {
                if let Some(m) = self.rel_index.get_mut(key) {
                    if let Some(set) = m.get_mut(&ik) {
                        set.remove(&rel.id);
                    }
                }
            }
        }
    }
}
