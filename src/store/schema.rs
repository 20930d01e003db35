//! Storage schema: labels, relationship types, property keys, indices
//!
//! Everything the kernel needs to know before data is loaded is declared
//! here; the one-time bootstrap of a fresh store lives in `storage`.

use crate::graph::{KernelConfig, Label, RelType};
use crate::model::EdgeKind;

/// Label affixed to all provenance object nodes
pub const LABEL_PROVENANCE: &str = "Provenance";

/// Label affixed to all actor nodes
pub const LABEL_ACTOR: &str = "Actor";

/// Label affixed to all privilege class nodes
pub const LABEL_PRIVILEGE_CLASS: &str = "PrivilegeClass";

/// Label affixed to all non-provenance identifier nodes
pub const LABEL_NON_PROVENANCE: &str = "NonProvenance";

/// Relationship type for non-provenance edges
pub const REL_NPE: &str = "NPE";

/// Relationship type: head of relationship owns the tail
pub const REL_OWNS: &str = "owns";

/// Relationship type: head of relationship is controlled by tail
pub const REL_CONTROLLED_BY: &str = "controlledBy";

/// Relationship type: privilege class at head dominates tail
pub const REL_DOMINATES: &str = "dominates";

/// ID property on all provenance objects
pub const PROP_OID: &str = "oid";

/// ID property on all actors
pub const PROP_AID: &str = "aid";

/// ID property on all privilege classes
pub const PROP_PID: &str = "pid";

/// ID property on all non-provenance identifier nodes
pub const PROP_NPID: &str = "npid";

/// ID property on non-provenance edges
pub const PROP_NPEID: &str = "npeid";

/// Node type property
pub const PROP_TYPE: &str = "type";

/// Node subtype property
pub const PROP_SUBTYPE: &str = "subtype";

/// Creation timestamp property (ms since epoch)
pub const PROP_CREATED: &str = "created";

/// Workflow id property on provenance edges
pub const PROP_WORKFLOW: &str = "workflow";

/// Name property
pub const PROP_NAME: &str = "name";

/// Heritable marking property
pub const PROP_HERITABLE: &str = "heritable";

/// Actor kind property
pub const PROP_ACTOR_TYPE: &str = "type";

/// Maximum path length traversed by transitive queries (dominance, path
/// existence)
pub const MAX_PATH_LENGTH: u32 = 100;

/// The six lineage relationship types, as kernel types.
pub fn provenance_rel_types() -> Vec<RelType> {
    EdgeKind::all().iter().map(|k| RelType::new(k.as_str())).collect()
}

/// Kernel configuration for a provenance store: auto-indexed properties
/// and uniqueness constraints.
pub fn kernel_config() -> KernelConfig {
    KernelConfig {
        node_indexed_props: vec![
            PROP_OID.to_string(),
            PROP_NPID.to_string(),
            PROP_TYPE.to_string(),
            PROP_SUBTYPE.to_string(),
            PROP_NAME.to_string(),
            PROP_AID.to_string(),
            PROP_PID.to_string(),
        ],
        rel_indexed_props: vec![PROP_WORKFLOW.to_string(), PROP_NPEID.to_string()],
        unique_constraints: vec![
            (Label::new(LABEL_PROVENANCE), PROP_OID.to_string()),
            (Label::new(LABEL_ACTOR), PROP_AID.to_string()),
            (Label::new(LABEL_PRIVILEGE_CLASS), PROP_PID.to_string()),
            (Label::new(LABEL_NON_PROVENANCE), PROP_NPID.to_string()),
        ],
    }
}
