//! Bounded typed-path traversal over the graph
//!
//! A `Traverser` walks the graph lazily from a starting node, following a
//! declared set of relationship types in a declared direction, visiting
//! each node at most once (node-global uniqueness), breadth- or
//! depth-first, with an optional depth cap.

use super::store::GraphStore;
use super::types::{Direction, NodeId, RelType};
use std::collections::{HashSet, VecDeque};

/// Declarative description of a traversal.
#[derive(Debug, Clone)]
pub struct TraversalSpec {
    /// Relationship types followed during expansion
    pub rel_types: Vec<RelType>,
    /// Direction of expansion relative to each visited node
    pub direction: Direction,
    /// Breadth-first if true, depth-first otherwise
    pub breadth_first: bool,
    /// Maximum hops from the starting node; None = unbounded
    pub max_depth: Option<u32>,
}

impl TraversalSpec {
    pub fn new(rel_types: Vec<RelType>, direction: Direction) -> Self {
        TraversalSpec {
            rel_types,
            direction,
            breadth_first: true,
            max_depth: None,
        }
    }

    pub fn depth_first(mut self) -> Self {
        self.breadth_first = false;
        self
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// Lazy traversal iterator yielding `(node, depth)` pairs.
///
/// The starting node itself is yielded first, at depth 0.
pub struct Traverser<'a> {
    store: &'a GraphStore,
    spec: TraversalSpec,
    frontier: VecDeque<(NodeId, u32)>,
    visited: HashSet<NodeId>,
}

impl<'a> Traverser<'a> {
    pub fn new(store: &'a GraphStore, start: NodeId, spec: TraversalSpec) -> Self {
        let mut frontier = VecDeque::new();
        let mut visited = HashSet::new();
        if store.has_node(start) {
            frontier.push_back((start, 0));
            visited.insert(start);
        }
        Traverser {
            store,
            spec,
            frontier,
            visited,
        }
    }

    fn expand(&mut self, node: NodeId, depth: u32) {
        if let Some(max) = self.spec.max_depth {
            if depth >= max {
                return;
            }
        }

        let rels = match self.spec.direction {
            Direction::Outgoing => self.store.outgoing_rels(node),
            Direction::Incoming => self.store.incoming_rels(node),
            Direction::Both => self.store.incident_rels(node),
        };

        for rel in rels {
            if !self.spec.rel_types.contains(&rel.rel_type) {
                continue;
            }
            let next = rel.other_end(node);
            if self.visited.insert(next) {
                self.frontier.push_back((next, depth + 1));
            }
        }
    }
}

impl Iterator for Traverser<'_> {
    type Item = (NodeId, u32);

    fn next(&mut self) -> Option<(NodeId, u32)> {
        let (node, depth) = if self.spec.breadth_first {
            self.frontier.pop_front()?
        } else {
            self.frontier.pop_back()?
        };
        self.expand(node, depth);
        Some((node, depth))
    }
}

/// Whether a path of `rel_types` edges no longer than `max_depth` leads
/// from `from` to `to` in the given direction. A zero-length path does not
/// count.
pub fn path_exists(
    store: &GraphStore,
    from: NodeId,
    to: NodeId,
    rel_types: &[RelType],
    direction: Direction,
    max_depth: u32,
) -> bool {
    let spec = TraversalSpec::new(rel_types.to_vec(), direction).with_max_depth(max_depth);
    Traverser::new(store, from, spec).any(|(n, d)| d > 0 && n == to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::property::PropertyMap;
    use crate::graph::store::KernelConfig;
    use crate::graph::types::Label;

    fn chain(store: &mut GraphStore, n: usize, rel: &str) -> Vec<NodeId> {
        let ids: Vec<NodeId> = (0..n)
            .map(|_| {
                store
                    .create_node(vec![Label::new("Provenance")], PropertyMap::new())
                    .unwrap()
            })
            .collect();
        for w in ids.windows(2) {
            store.create_rel(w[0], w[1], rel, PropertyMap::new()).unwrap();
        }
        ids
    }

    #[test]
    fn test_bfs_order_and_depth() {
        let mut store = GraphStore::new(&KernelConfig::default());
        let ids = chain(&mut store, 4, "input to");

        let spec = TraversalSpec::new(vec![RelType::new("input to")], Direction::Outgoing);
        let visited: Vec<(NodeId, u32)> = Traverser::new(&store, ids[0], spec).collect();

        assert_eq!(
            visited,
            vec![(ids[0], 0), (ids[1], 1), (ids[2], 2), (ids[3], 3)]
        );
    }

    #[test]
    fn test_max_depth() {
        let mut store = GraphStore::new(&KernelConfig::default());
        let ids = chain(&mut store, 5, "input to");

        let spec = TraversalSpec::new(vec![RelType::new("input to")], Direction::Outgoing)
            .with_max_depth(2);
        let visited: Vec<NodeId> = Traverser::new(&store, ids[0], spec).map(|(n, _)| n).collect();

        assert_eq!(visited, vec![ids[0], ids[1], ids[2]]);
    }

    #[test]
    fn test_direction() {
        let mut store = GraphStore::new(&KernelConfig::default());
        let ids = chain(&mut store, 3, "generated");

        let backward =
            TraversalSpec::new(vec![RelType::new("generated")], Direction::Incoming);
        let visited: Vec<NodeId> =
            Traverser::new(&store, ids[2], backward).map(|(n, _)| n).collect();
        assert_eq!(visited, vec![ids[2], ids[1], ids[0]]);

        let forward = TraversalSpec::new(vec![RelType::new("generated")], Direction::Outgoing);
        let visited: Vec<NodeId> =
            Traverser::new(&store, ids[2], forward).map(|(n, _)| n).collect();
        assert_eq!(visited, vec![ids[2]]);
    }

    #[test]
    fn test_rel_type_filter() {
        let mut store = GraphStore::new(&KernelConfig::default());
        let a = store
            .create_node(vec![Label::new("Provenance")], PropertyMap::new())
            .unwrap();
        let b = store
            .create_node(vec![Label::new("Provenance")], PropertyMap::new())
            .unwrap();
        let c = store
            .create_node(vec![Label::new("Provenance")], PropertyMap::new())
            .unwrap();
        store.create_rel(a, b, "input to", PropertyMap::new()).unwrap();
        store.create_rel(a, c, "owns", PropertyMap::new()).unwrap();

        let spec = TraversalSpec::new(vec![RelType::new("input to")], Direction::Outgoing);
        let visited: Vec<NodeId> = Traverser::new(&store, a, spec).map(|(n, _)| n).collect();
        assert_eq!(visited, vec![a, b]);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut store = GraphStore::new(&KernelConfig::default());
        let a = store
            .create_node(vec![Label::new("Provenance")], PropertyMap::new())
            .unwrap();
        let b = store
            .create_node(vec![Label::new("Provenance")], PropertyMap::new())
            .unwrap();
        store.create_rel(a, b, "marks", PropertyMap::new()).unwrap();
        store.create_rel(b, a, "marks", PropertyMap::new()).unwrap();

        let spec = TraversalSpec::new(vec![RelType::new("marks")], Direction::Both);
        let visited: Vec<NodeId> = Traverser::new(&store, a, spec).map(|(n, _)| n).collect();
        assert_eq!(visited.len(), 2);
    }

    #[test]
    fn test_path_exists() {
        let mut store = GraphStore::new(&KernelConfig::default());
        let ids = chain(&mut store, 4, "dominates");

        let rt = vec![RelType::new("dominates")];
        assert!(path_exists(&store, ids[0], ids[3], &rt, Direction::Outgoing, 100));
        assert!(!path_exists(&store, ids[3], ids[0], &rt, Direction::Outgoing, 100));
        // Depth bound respected.
        assert!(!path_exists(&store, ids[0], ids[3], &rt, Direction::Outgoing, 2));
        // Trivial path does not count.
        assert!(!path_exists(&store, ids[0], ids[0], &rt, Direction::Outgoing, 100));
    }

    #[test]
    fn test_dfs_goes_deep() {
        let mut store = GraphStore::new(&KernelConfig::default());
        // Star + chain: root -> a, root -> b1 -> b2
        let root = store
            .create_node(vec![Label::new("Provenance")], PropertyMap::new())
            .unwrap();
        let a = store
            .create_node(vec![Label::new("Provenance")], PropertyMap::new())
            .unwrap();
        let b1 = store
            .create_node(vec![Label::new("Provenance")], PropertyMap::new())
            .unwrap();
        let b2 = store
            .create_node(vec![Label::new("Provenance")], PropertyMap::new())
            .unwrap();
        store.create_rel(root, a, "input to", PropertyMap::new()).unwrap();
        store.create_rel(root, b1, "input to", PropertyMap::new()).unwrap();
        store.create_rel(b1, b2, "input to", PropertyMap::new()).unwrap();

        let spec = TraversalSpec::new(vec![RelType::new("input to")], Direction::Outgoing)
            .depth_first();
        let visited: Vec<NodeId> = Traverser::new(&store, root, spec).map(|(n, _)| n).collect();

        // Depth-first explores b1's subtree before backtracking to a.
        assert_eq!(visited, vec![root, b1, b2, a]);
    }
}
