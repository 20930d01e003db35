//! Non-provenance edges: links from the graph to external identifiers

use super::ids;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A typed link between a provenance object and an external identifier
/// (hash, URL, database key), or occasionally another provenance object.
/// Not itself a lineage claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonProvenanceEdge {
    /// Unique id of this edge
    pub npeid: String,
    /// OID of the provenance object this edge hangs off
    pub from: String,
    /// OID of a provenance object, or a non-provenance identifier
    pub to: String,
    /// Free-string edge kind, e.g. "md5", "url", "contains"
    pub kind: String,
    /// Creation time, Unix milliseconds
    pub created: i64,
}

impl NonProvenanceEdge {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        NonProvenanceEdge {
            npeid: format!("urn:uuid:{}", Uuid::new_v4()),
            from: from.into(),
            to: to.into(),
            kind: kind.into(),
            created: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Reconstruct a stored edge.
    pub fn from_parts(
        npeid: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        kind: impl Into<String>,
        created: i64,
    ) -> Self {
        NonProvenanceEdge {
            npeid: npeid.into(),
            from: from.into(),
            to: to.into(),
            kind: kind.into(),
            created,
        }
    }

    /// Whether the far end is an external identifier rather than an OID.
    pub fn points_at_npid(&self) -> bool {
        !ids::is_prov_oid(&self.to)
    }
}

impl fmt::Display for NonProvenanceEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -({})-> {}", self.from, self.kind, self.to)
    }
}
