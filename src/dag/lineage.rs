//! The lineage DAG: a viewed provenance collection with post-processing
//!
//! A `LineageDag` is built for one viewer; every object added to it has
//! already been through the surrogate view filter. After discovery, the
//! post-processing passes run in order: edge voting for contested
//! surrogate renderings, indirect-taint tracing, inferrable-edge drawing,
//! head/foot tagging, and dangler detection.

use super::fingerprint::Fingerprint;
use crate::model::{
    EdgeKind, ProvEdge, ProvObject, ProvenanceCollection, User, TAG_FOOT, TAG_HEAD,
    TAG_MORE_AVAILABLE, TAG_TAINTED,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::{Deref, DerefMut};
use tracing::warn;

/// A provenance collection discovered for one viewer, with a focus, a
/// fingerprint, and annotation passes.
#[derive(Debug)]
pub struct LineageDag {
    viewer: User,
    collection: ProvenanceCollection,
    fingerprint: Fingerprint,
    /// OIDs the view filter hid entirely from this viewer
    hidden: HashSet<String>,
    /// Contested renderings per OID, when the same object was hydrated
    /// differently along competing paths
    candidates: HashMap<String, Vec<ProvObject>>,
}

impl LineageDag {
    pub fn new(viewer: User) -> Self {
        LineageDag {
            viewer,
            collection: ProvenanceCollection::new(),
            fingerprint: Fingerprint::new(),
            hidden: HashSet::new(),
            candidates: HashMap::new(),
        }
    }

    pub fn viewer(&self) -> &User {
        &self.viewer
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn fingerprint_mut(&mut self) -> &mut Fingerprint {
        &mut self.fingerprint
    }

    /// OIDs the viewer may not see at all.
    pub fn hidden(&self) -> &HashSet<String> {
        &self.hidden
    }

    pub fn into_collection(self) -> ProvenanceCollection {
        self.collection
    }

    /// Record the final collection shape in the fingerprint.
    pub fn finish_fingerprint(&mut self) {
        self.fingerprint.finished(&self.collection);
    }

    /// Record the outcome of the view filter for one object: a rendering
    /// to include, or nothing when the viewer is entirely unauthorized.
    /// Differing renderings of the same OID become voting candidates.
    pub fn add_viewed(&mut self, oid: &str, seen: Option<ProvObject>) {
        match seen {
            None => {
                self.hidden.insert(oid.to_string());
            }
            Some(obj) => {
                if let Some(existing) = self.collection.get_node(&obj.oid) {
                    if *existing != obj {
                        let entry = self
                            .candidates
                            .entry(obj.oid.clone())
                            .or_insert_with(|| vec![existing.clone()]);
                        if !entry.iter().any(|c| c == &obj) {
                            entry.push(obj.clone());
                        }
                        // Leave the current rendering in place; voting
                        // settles the winner.
                        return;
                    }
                }
                self.collection.add_node(obj);
            }
        }
    }

    /// Pick the focus of the DAG: the starting identifier when present,
    /// otherwise the first collected node.
    pub fn choose_focus(&mut self, id: &str) {
        if self.collection.contains_oid(id) {
            self.collection.set_focus(id);
        } else if let Some(first) = self.collection.nodes().first() {
            let oid = first.oid.clone();
            self.collection.set_focus(oid);
        }
    }

    /// Settle contested surrogate renderings by majority vote of incident
    /// edges. An edge whose far endpoint is hidden or redacted votes for
    /// the redacted rendering; any other edge votes for the full one.
    /// Ties go to the full rendering; within a rendering class the
    /// candidate ordering is deterministic.
    pub fn compute_edge_voting(&mut self) {
        let contested: Vec<(String, Vec<ProvObject>)> = self.candidates.drain().collect();
        for (oid, mut cands) in contested {
            let mut surrogate_votes = 0usize;
            let mut full_votes = 0usize;
            for edge in self.collection.edges() {
                let other = if edge.from == oid {
                    &edge.to
                } else if edge.to == oid {
                    &edge.from
                } else {
                    continue;
                };
                let redacted_context = self.hidden.contains(other)
                    || self
                        .collection
                        .get_node(other)
                        .map(|o| o.surrogate)
                        .unwrap_or(false);
                if redacted_context {
                    surrogate_votes += 1;
                } else {
                    full_votes += 1;
                }
            }

            cands.sort_by(|a, b| {
                (a.surrogate, &a.name, &a.oid).cmp(&(b.surrogate, &b.name, &b.oid))
            });
            let winner = if surrogate_votes > full_votes {
                cands
                    .iter()
                    .find(|c| c.surrogate)
                    .or_else(|| cands.first())
                    .cloned()
            } else {
                cands
                    .iter()
                    .find(|c| !c.surrogate)
                    .or_else(|| cands.first())
                    .cloned()
            };
            if let Some(winner) = winner {
                self.collection.add_node(winner);
            }
        }
    }

    /// Propagate taint ancestry: every object downstream of a taint's
    /// marked targets, within this DAG, is tagged with the taint's OID.
    pub fn trace_taint_sources(&mut self) {
        let taints: Vec<ProvObject> = self
            .collection
            .nodes()
            .iter()
            .filter(|o| o.is_taint())
            .cloned()
            .collect();

        for taint in taints {
            let marked: Vec<String> = self
                .collection
                .outbound_edges_of(&taint.oid)
                .iter()
                .filter(|e| e.kind == EdgeKind::Marks)
                .map(|e| e.to.clone())
                .filter(|oid| self.collection.contains_oid(oid))
                .collect();

            let mut queue: VecDeque<String> = marked.into();
            let mut visited: HashSet<String> = HashSet::new();
            while let Some(oid) = queue.pop_front() {
                if !visited.insert(oid.clone()) {
                    continue;
                }
                self.append_taint_tag(&oid, &taint.oid);
                let next: Vec<String> = self
                    .collection
                    .outbound_edges_of(&oid)
                    .iter()
                    .filter(|e| e.kind != EdgeKind::Marks)
                    .map(|e| e.to.clone())
                    .filter(|to| self.collection.contains_oid(to))
                    .collect();
                queue.extend(next);
            }
        }
    }

    fn append_taint_tag(&mut self, oid: &str, taint_oid: &str) {
        let current = self
            .collection
            .get_tag(oid, TAG_TAINTED)
            .unwrap_or_default()
            .to_string();
        if current.split(',').any(|t| t == taint_oid) {
            return;
        }
        let value = if current.is_empty() {
            taint_oid.to_string()
        } else {
            format!("{},{}", current, taint_oid)
        };
        self.collection.tag_node(oid, TAG_TAINTED, value);
    }

    /// Where two visible objects are separated only by a hidden
    /// intermediate, draw an inferred direct edge between them. Edges
    /// touching hidden objects are dropped so nothing about them leaks to
    /// the viewer.
    pub fn draw_inferrable_edges(&mut self) {
        let mut inferred: Vec<ProvEdge> = Vec::new();
        for h in &self.hidden {
            let into: Vec<ProvEdge> = self
                .collection
                .edges()
                .iter()
                .filter(|e| e.to == *h)
                .cloned()
                .collect();
            let out_of: Vec<ProvEdge> = self
                .collection
                .edges()
                .iter()
                .filter(|e| e.from == *h)
                .cloned()
                .collect();
            for a_edge in &into {
                if !self.collection.contains_oid(&a_edge.from) {
                    continue;
                }
                for b_edge in &out_of {
                    if !self.collection.contains_oid(&b_edge.to) || a_edge.from == b_edge.to {
                        continue;
                    }
                    inferred.push(ProvEdge::new(
                        &a_edge.from,
                        &b_edge.to,
                        EdgeKind::Unspecified,
                    ));
                }
            }
        }

        let hidden = std::mem::take(&mut self.hidden);
        self.collection
            .retain_edges(|e| !hidden.contains(&e.from) && !hidden.contains(&e.to));
        self.hidden = hidden;

        for edge in inferred {
            self.collection.add_edge(edge);
        }
    }

    /// Tag nodes with no inbound lineage edge as heads, and nodes with no
    /// outbound lineage edge as feet.
    pub fn tag_head_and_feet(&mut self) {
        let oids: Vec<String> = self
            .collection
            .nodes()
            .iter()
            .map(|o| o.oid.clone())
            .collect();
        for oid in oids {
            if self.collection.inbound_edges_of(&oid).is_empty() {
                self.collection.tag_node(&oid, TAG_HEAD, "true");
            }
            if self.collection.outbound_edges_of(&oid).is_empty() {
                self.collection.tag_node(&oid, TAG_FOOT, "true");
            }
        }
    }

    /// Find edges whose far endpoint lies beyond the collected graph.
    /// Each surviving endpoint is tagged so displays can signal that the
    /// graph continues past the cut.
    pub fn detect_danglers(&mut self) -> Vec<ProvEdge> {
        let mut danglers = Vec::new();
        let edges: Vec<ProvEdge> = self.collection.edges().to_vec();
        for edge in edges {
            let has_from = self.collection.contains_oid(&edge.from);
            let has_to = self.collection.contains_oid(&edge.to);
            if has_from && !has_to {
                self.collection
                    .tag_node(&edge.from, TAG_MORE_AVAILABLE, "true");
                danglers.push(edge);
            } else if !has_from && has_to {
                self.collection
                    .tag_node(&edge.to, TAG_MORE_AVAILABLE, "true");
                danglers.push(edge);
            }
        }
        if !danglers.is_empty() {
            warn!("Collection contains {} dangling edges", danglers.len());
        }
        danglers
    }
}

impl Deref for LineageDag {
    type Target = ProvenanceCollection;

    fn deref(&self) -> &ProvenanceCollection {
        &self.collection
    }
}

impl DerefMut for LineageDag {
    fn deref_mut(&mut self) -> &mut ProvenanceCollection {
        &mut self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids;

    fn dag() -> LineageDag {
        LineageDag::new(User::god())
    }

    fn obj(name: &str) -> ProvObject {
        ProvObject::data(name)
    }

    #[test]
    fn test_add_viewed_hidden() {
        let mut d = dag();
        let o = obj("secret");
        d.add_viewed(&o.oid, None);
        assert!(d.hidden().contains(&o.oid));
        assert_eq!(d.count_nodes(), 0);
    }

    #[test]
    fn test_head_foot_tagging() {
        let mut d = dag();
        let a = obj("a");
        let b = obj("b");
        let c = obj("c");
        for o in [&a, &b, &c] {
            d.add_viewed(&o.oid, Some(o.clone()));
        }
        d.add_edge(ProvEdge::new(&a.oid, &b.oid, EdgeKind::InputTo));
        d.add_edge(ProvEdge::new(&b.oid, &c.oid, EdgeKind::Generated));

        d.tag_head_and_feet();
        assert_eq!(d.get_tag(&a.oid, TAG_HEAD), Some("true"));
        assert_eq!(d.get_tag(&a.oid, TAG_FOOT), None);
        assert_eq!(d.get_tag(&b.oid, TAG_HEAD), None);
        assert_eq!(d.get_tag(&c.oid, TAG_FOOT), Some("true"));
    }

    #[test]
    fn test_taint_trace_downstream_only() {
        let mut d = dag();
        let taint = ProvObject::taint(&User::god(), "bad");
        let a = obj("a");
        let b = obj("b");
        let up = obj("upstream-of-a");
        for o in [&taint, &a, &b, &up] {
            d.add_viewed(&o.oid, Some(o.clone()));
        }
        d.add_edge(ProvEdge::new(&taint.oid, &a.oid, EdgeKind::Marks));
        d.add_edge(ProvEdge::new(&a.oid, &b.oid, EdgeKind::InputTo));
        d.add_edge(ProvEdge::new(&up.oid, &a.oid, EdgeKind::InputTo));

        d.trace_taint_sources();
        assert_eq!(d.get_tag(&a.oid, TAG_TAINTED), Some(taint.oid.as_str()));
        assert_eq!(d.get_tag(&b.oid, TAG_TAINTED), Some(taint.oid.as_str()));
        assert_eq!(d.get_tag(&up.oid, TAG_TAINTED), None);
    }

    #[test]
    fn test_inferrable_edges() {
        let mut d = dag();
        let a = obj("a");
        let hidden = obj("hidden");
        let b = obj("b");
        d.add_viewed(&a.oid, Some(a.clone()));
        d.add_viewed(&hidden.oid, None);
        d.add_viewed(&b.oid, Some(b.clone()));
        d.add_edge(ProvEdge::new(&a.oid, &hidden.oid, EdgeKind::InputTo));
        d.add_edge(ProvEdge::new(&hidden.oid, &b.oid, EdgeKind::Generated));

        d.draw_inferrable_edges();

        // The inferred bridge exists, the hidden object's edges are gone.
        assert_eq!(d.count_edges(), 1);
        let edge = &d.edges()[0];
        assert_eq!(edge.from, a.oid);
        assert_eq!(edge.to, b.oid);
        assert_eq!(edge.kind, EdgeKind::Unspecified);
    }

    #[test]
    fn test_danglers_tag_surviving_endpoint() {
        let mut d = dag();
        let a = obj("a");
        d.add_viewed(&a.oid, Some(a.clone()));
        let outside = ids::new_oid();
        d.add_edge(ProvEdge::new(&a.oid, &outside, EdgeKind::Generated));

        let danglers = d.detect_danglers();
        assert_eq!(danglers.len(), 1);
        assert_eq!(d.get_tag(&a.oid, TAG_MORE_AVAILABLE), Some("true"));
    }

    #[test]
    fn test_edge_voting_majority() {
        let mut d = dag();
        let contested = obj("contested");
        let mut redacted = contested.clone();
        redacted.name = "[redacted]".to_string();
        redacted.surrogate = true;

        let n1 = obj("n1");
        let n2 = obj("n2");
        d.add_viewed(&contested.oid, Some(contested.clone()));
        d.add_viewed(&n1.oid, Some(n1.clone()));
        d.add_viewed(&n2.oid, Some(n2.clone()));
        // Competing rendering arrives along another path.
        d.add_viewed(&contested.oid, Some(redacted.clone()));
        d.add_edge(ProvEdge::new(&n1.oid, &contested.oid, EdgeKind::InputTo));
        d.add_edge(ProvEdge::new(&contested.oid, &n2.oid, EdgeKind::Generated));

        // Both neighbors are fully visible: the full rendering wins.
        d.compute_edge_voting();
        let settled = d.get_node(&contested.oid).unwrap();
        assert!(!settled.surrogate);
        assert_eq!(settled.name, "contested");
    }

    #[test]
    fn test_edge_voting_prefers_surrogate_in_redacted_context() {
        let mut d = dag();
        let contested = obj("contested");
        let mut redacted = contested.clone();
        redacted.name = "[redacted]".to_string();
        redacted.surrogate = true;

        let hidden_a = obj("ha");
        let hidden_b = obj("hb");
        d.add_viewed(&contested.oid, Some(contested.clone()));
        d.add_viewed(&contested.oid, Some(redacted.clone()));
        d.add_viewed(&hidden_a.oid, None);
        d.add_viewed(&hidden_b.oid, None);
        d.add_edge(ProvEdge::new(&hidden_a.oid, &contested.oid, EdgeKind::InputTo));
        d.add_edge(ProvEdge::new(&contested.oid, &hidden_b.oid, EdgeKind::Generated));

        d.compute_edge_voting();
        let settled = d.get_node(&contested.oid).unwrap();
        assert!(settled.surrogate);
    }

    #[test]
    fn test_choose_focus() {
        let mut d = dag();
        let a = obj("a");
        d.add_viewed(&a.oid, Some(a.clone()));

        d.choose_focus(&a.oid);
        assert_eq!(d.focus(), Some(a.oid.as_str()));

        // A missing id falls back to the first node.
        let mut d2 = dag();
        d2.add_viewed(&a.oid, Some(a.clone()));
        d2.choose_focus("urn:uuid:00000000-0000-0000-0000-00000000ffff");
        assert_eq!(d2.focus(), Some(a.oid.as_str()));
    }
}
