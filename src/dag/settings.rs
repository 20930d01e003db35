//! Traversal settings for lineage discovery

use serde::{Deserialize, Serialize};

/// Controls how a lineage graph is discovered from a starting point.
///
/// Depth and node caps are unbounded when zero or negative; both forward
/// and backward enabled means an undirected walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalSettings {
    /// Cap on hops from the starting point; unbounded if <= 0
    pub max_depth: i32,
    /// Cap on total nodes collected; unbounded if <= 0
    pub n: i64,
    /// Breadth-first if true, depth-first otherwise
    pub breadth_first: bool,
    /// Traverse outgoing lineage edges (toward outputs)
    pub forward: bool,
    /// Traverse incoming lineage edges (toward inputs)
    pub backward: bool,
    /// Collect nodes into the result
    pub include_nodes: bool,
    /// Collect lineage edges into the result
    pub include_edges: bool,
    /// Collect non-provenance edges into the result
    pub include_npes: bool,
    /// Step across non-provenance edges, possibly reaching new objects
    /// through shared external identifiers
    pub follow_npids: bool,
}

impl Default for TraversalSettings {
    fn default() -> Self {
        TraversalSettings {
            max_depth: 0,
            n: 0,
            breadth_first: true,
            forward: true,
            backward: true,
            include_nodes: true,
            include_edges: true,
            include_npes: true,
            follow_npids: false,
        }
    }
}

impl TraversalSettings {
    pub fn new() -> Self {
        TraversalSettings::default()
    }

    /// Traverse only toward outputs.
    pub fn only_forward(mut self) -> Self {
        self.forward = true;
        self.backward = false;
        self
    }

    /// Traverse only toward inputs.
    pub fn only_backward(mut self) -> Self {
        self.forward = false;
        self.backward = true;
        self
    }

    pub fn set_max_depth(mut self, depth: i32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn set_n(mut self, n: i64) -> Self {
        self.n = n;
        self
    }

    pub fn depth_first(mut self) -> Self {
        self.breadth_first = false;
        self
    }

    pub fn include_nodes(mut self) -> Self {
        self.include_nodes = true;
        self
    }

    pub fn exclude_nodes(mut self) -> Self {
        self.include_nodes = false;
        self
    }

    pub fn exclude_edges(mut self) -> Self {
        self.include_edges = false;
        self
    }

    pub fn exclude_npes(mut self) -> Self {
        self.include_npes = false;
        self
    }

    pub fn follow_npids(mut self) -> Self {
        self.follow_npids = true;
        self
    }
}
