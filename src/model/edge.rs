//! Provenance edges: typed lineage relations between objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// The six lineage relation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    InputTo,
    Contributed,
    Marks,
    Generated,
    Triggered,
    Unspecified,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::InputTo => "input to",
            EdgeKind::Contributed => "contributed",
            EdgeKind::Marks => "marks",
            EdgeKind::Generated => "generated",
            EdgeKind::Triggered => "triggered",
            EdgeKind::Unspecified => "unspecified",
        }
    }

    pub fn from_str(s: &str) -> Option<EdgeKind> {
        match s {
            "input to" => Some(EdgeKind::InputTo),
            "contributed" => Some(EdgeKind::Contributed),
            "marks" => Some(EdgeKind::Marks),
            "generated" => Some(EdgeKind::Generated),
            "triggered" => Some(EdgeKind::Triggered),
            "unspecified" => Some(EdgeKind::Unspecified),
            _ => None,
        }
    }

    /// All lineage relation types, for traversal configuration.
    pub fn all() -> [EdgeKind; 6] {
        [
            EdgeKind::InputTo,
            EdgeKind::Contributed,
            EdgeKind::Marks,
            EdgeKind::Generated,
            EdgeKind::Triggered,
            EdgeKind::Unspecified,
        ]
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed lineage relation between two provenance objects.
///
/// Edges are identified by the `(from, to, kind, workflow)` tuple; two
/// edges agreeing on all four are the same edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvEdge {
    /// OID of the source object
    pub from: String,
    /// OID of the target object
    pub to: String,
    pub kind: EdgeKind,
    /// OID of the workflow this edge was reported under, if any
    pub workflow: Option<String>,
}

impl ProvEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: EdgeKind) -> Self {
        ProvEdge {
            from: from.into(),
            to: to.into(),
            kind,
            workflow: None,
        }
    }

    pub fn in_workflow(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = Some(workflow.into());
        self
    }

    /// Identity tuple, tolerating absent workflows on both sides.
    pub fn identity(&self) -> (&str, &str, EdgeKind, Option<&str>) {
        (
            &self.from,
            &self.to,
            self.kind,
            self.workflow.as_deref(),
        )
    }

    pub fn same_edge(&self, other: &ProvEdge) -> bool {
        self.identity() == other.identity()
    }
}

impl fmt::Display for ProvEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.kind, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_string_roundtrip() {
        for kind in EdgeKind::all() {
            assert_eq!(EdgeKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(EdgeKind::from_str("owns"), None);
    }

    #[test]
    fn test_edge_identity() {
        let a = ProvEdge::new("urn:uuid:a", "urn:uuid:b", EdgeKind::InputTo);
        let b = ProvEdge::new("urn:uuid:a", "urn:uuid:b", EdgeKind::InputTo);
        let c = ProvEdge::new("urn:uuid:a", "urn:uuid:b", EdgeKind::InputTo).in_workflow("urn:uuid:w");

        assert!(a.same_edge(&b));
        assert!(!a.same_edge(&c));
        assert!(!a.same_edge(&ProvEdge::new("urn:uuid:a", "urn:uuid:b", EdgeKind::Generated)));
    }
}
