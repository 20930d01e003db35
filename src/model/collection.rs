//! In-memory provenance collections
//!
//! A collection holds an insertion-ordered set of objects keyed by OID,
//! plus edges, non-provenance edges, actors, an optional focus, and a tag
//! map. Graph structure is expressed through OID keys, not references, so
//! cyclic graphs carry no ownership cycles.

use super::actor::Actor;
use super::edge::ProvEdge;
use super::npe::NonProvenanceEdge;
use super::object::ProvObject;
use std::collections::HashMap;

/// Tag key marking nodes whose neighborhood extends beyond the collection.
pub const TAG_MORE_AVAILABLE: &str = "more-available";

/// Tag key marking nodes with no inbound lineage edge in the collection.
pub const TAG_HEAD: &str = "head";

/// Tag key marking nodes with no outbound lineage edge in the collection.
pub const TAG_FOOT: &str = "foot";

/// Tag key carrying the OIDs of taints an object inherits.
pub const TAG_TAINTED: &str = "tainted";

/// An ordered in-memory set of provenance elements.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceCollection {
    nodes: Vec<ProvObject>,
    node_index: HashMap<String, usize>,
    edges: Vec<ProvEdge>,
    npes: Vec<NonProvenanceEdge>,
    actors: Vec<Actor>,
    actor_index: HashMap<String, usize>,
    focus: Option<String>,
    tags: HashMap<String, HashMap<String, String>>,
}

impl ProvenanceCollection {
    pub fn new() -> Self {
        ProvenanceCollection::default()
    }

    /// Add or replace a node, keyed by OID. Insertion order is kept; a
    /// replacement keeps the original position.
    pub fn add_node(&mut self, obj: ProvObject) {
        match self.node_index.get(&obj.oid) {
            Some(&idx) => self.nodes[idx] = obj,
            None => {
                self.node_index.insert(obj.oid.clone(), self.nodes.len());
                self.nodes.push(obj);
            }
        }
    }

    /// Add an edge unless an identical (from, to, kind, workflow) edge is
    /// already present.
    pub fn add_edge(&mut self, edge: ProvEdge) {
        if !self.edges.iter().any(|e| e.same_edge(&edge)) {
            self.edges.push(edge);
        }
    }

    pub fn add_npe(&mut self, npe: NonProvenanceEdge) {
        if !self.npes.iter().any(|n| n.npeid == npe.npeid) {
            self.npes.push(npe);
        }
    }

    pub fn add_actor(&mut self, actor: Actor) {
        if !self.actor_index.contains_key(&actor.aid) {
            self.actor_index.insert(actor.aid.clone(), self.actors.len());
            self.actors.push(actor);
        }
    }

    /// Merge all elements of another collection into this one.
    pub fn add_all(&mut self, other: ProvenanceCollection) {
        for node in other.nodes {
            self.add_node(node);
        }
        for edge in other.edges {
            self.add_edge(edge);
        }
        for npe in other.npes {
            self.add_npe(npe);
        }
        for actor in other.actors {
            self.add_actor(actor);
        }
    }

    pub fn contains_oid(&self, oid: &str) -> bool {
        self.node_index.contains_key(oid)
    }

    pub fn get_node(&self, oid: &str) -> Option<&ProvObject> {
        self.node_index.get(oid).map(|&idx| &self.nodes[idx])
    }

    pub fn nodes(&self) -> &[ProvObject] {
        &self.nodes
    }

    pub fn edges(&self) -> &[ProvEdge] {
        &self.edges
    }

    pub fn npes(&self) -> &[NonProvenanceEdge] {
        &self.npes
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn count_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn count_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn count_npes(&self) -> usize {
        self.npes.len()
    }

    pub fn count_actors(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && self.npes.is_empty()
            && self.actors.is_empty()
    }

    /// Edges whose target is the given OID.
    pub fn inbound_edges_of(&self, oid: &str) -> Vec<&ProvEdge> {
        self.edges.iter().filter(|e| e.to == oid).collect()
    }

    /// Edges whose source is the given OID.
    pub fn outbound_edges_of(&self, oid: &str) -> Vec<&ProvEdge> {
        self.edges.iter().filter(|e| e.from == oid).collect()
    }

    pub fn remove_edge(&mut self, edge: &ProvEdge) {
        self.edges.retain(|e| !e.same_edge(edge));
    }

    /// Keep only the edges satisfying the predicate.
    pub fn retain_edges(&mut self, f: impl FnMut(&ProvEdge) -> bool) {
        self.edges.retain(f);
    }

    pub fn set_focus(&mut self, oid: impl Into<String>) {
        self.focus = Some(oid.into());
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    /// Attach a key/value tag to a node.
    pub fn tag_node(&mut self, oid: &str, key: impl Into<String>, value: impl Into<String>) {
        self.tags
            .entry(oid.to_string())
            .or_default()
            .insert(key.into(), value.into());
    }

    pub fn get_tag(&self, oid: &str, key: &str) -> Option<&str> {
        self.tags.get(oid)?.get(key).map(|s| s.as_str())
    }

    pub fn tags_of(&self, oid: &str) -> Option<&HashMap<String, String>> {
        self.tags.get(oid)
    }
}
