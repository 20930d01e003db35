//! Domain entities of the provenance graph

pub mod actor;
pub mod collection;
pub mod edge;
pub mod ids;
pub mod npe;
pub mod object;
pub mod privilege;

pub use actor::{Actor, ActorKind, User};
pub use collection::{
    ProvenanceCollection, TAG_FOOT, TAG_HEAD, TAG_MORE_AVAILABLE, TAG_TAINTED,
};
pub use edge::{EdgeKind, ProvEdge};
pub use ids::{
    is_prov_oid, new_oid, DEFAULT_WORKFLOW_OID, GOD_AID, PUBLIC_AID, UNKNOWN_ACTIVITY_OID,
};
pub use npe::NonProvenanceEdge;
pub use object::{DataSubtype, ObjectKind, ProvObject};
pub use privilege::{PrivilegeClass, PrivilegeSet};
