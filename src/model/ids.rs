//! Identifier generation and classification
//!
//! Provenance object identifiers are `urn:uuid:` URNs. Anything else
//! reaching the traversal layer is treated as a non-provenance identifier
//! (an external key such as a hash or URL).

use uuid::Uuid;

const OID_PREFIX: &str = "urn:uuid:";

/// Well-known OID of the default workflow every store carries.
pub const DEFAULT_WORKFLOW_OID: &str = "urn:uuid:00000000-0000-0000-0000-000000000001";

/// Well-known OID of the "unknown activity" placeholder.
pub const UNKNOWN_ACTIVITY_OID: &str = "urn:uuid:00000000-0000-0000-0000-000000000002";

/// Well-known actor id of the built-in superuser.
pub const GOD_AID: &str = "urn:uuid:00000000-0000-0000-0000-000000000003";

/// Well-known actor id of the built-in public user.
pub const PUBLIC_AID: &str = "urn:uuid:00000000-0000-0000-0000-000000000004";

/// Generate a fresh provenance object identifier.
pub fn new_oid() -> String {
    format!("{}{}", OID_PREFIX, Uuid::new_v4())
}

/// Whether a string is a provenance object identifier, as opposed to a
/// non-provenance identifier.
pub fn is_prov_oid(s: &str) -> bool {
    s.strip_prefix(OID_PREFIX)
        .map(|rest| Uuid::parse_str(rest).is_ok())
        .unwrap_or(false)
}
