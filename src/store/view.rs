//! Privilege dominance and the surrogate view filter
//!
//! Dominance is computed over the stored lattice by a bounded transitive
//! path query. The view filter decides, per object and viewer, whether the
//! viewer sees the original, a redacted surrogate, or nothing. Surrogate
//! derivation is a pluggable policy per object kind.

use super::schema::*;
use crate::graph::{path_exists, Direction, GraphResult, GraphStore, Label, PropertyValue, RelType};
use crate::model::{ObjectKind, PrivilegeClass, PrivilegeSet, ProvObject, User};
use std::collections::HashMap;
use std::sync::Arc;

/// Whether privilege class `one` dominates `other`.
///
/// Every class trivially dominates itself, ADMIN dominates everything,
/// and otherwise a `dominates` path of at most `MAX_PATH_LENGTH` hops
/// decides.
pub fn dominates(g: &GraphStore, one: &PrivilegeClass, other: &PrivilegeClass) -> GraphResult<bool> {
    if one.pid == other.pid {
        return Ok(true);
    }
    if one.is_admin() {
        return Ok(true);
    }

    let label = Label::new(LABEL_PRIVILEGE_CLASS);
    let Some(from) = g.lookup_unique(&label, PROP_PID, &PropertyValue::from(one.pid.as_str()))
    else {
        return Ok(false);
    };
    let Some(to) = g.lookup_unique(&label, PROP_PID, &PropertyValue::from(other.pid.as_str()))
    else {
        return Ok(false);
    };

    Ok(path_exists(
        g,
        from,
        to,
        &[RelType::new(REL_DOMINATES)],
        Direction::Outgoing,
        MAX_PATH_LENGTH,
    ))
}

/// Whether any class in `set` dominates `target`.
pub fn set_dominates(
    g: &GraphStore,
    set: &PrivilegeSet,
    target: &PrivilegeClass,
) -> GraphResult<bool> {
    for pc in set.iter() {
        if dominates(g, pc, target)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// A surrogate-derivation rule for one object kind.
///
/// Given an object the viewer is not fully cleared for, the policy either
/// derives a redacted stand-in or rules the object entirely off limits.
pub trait SurrogatePolicy: Send + Sync {
    fn surrogate(&self, obj: &ProvObject, viewer: &User) -> Option<ProvObject>;
}

/// Default redacting policy: keeps identity and shape, strips content.
///
/// The surrogate keeps the OID (so edges stay attached), kind, and
/// timestamps; the name is blanked and the metadata dropped.
pub struct RedactingPolicy;

impl SurrogatePolicy for RedactingPolicy {
    fn surrogate(&self, obj: &ProvObject, _viewer: &User) -> Option<ProvObject> {
        let mut surrogate = ProvObject::new(obj.kind, "[redacted]").with_oid(obj.oid.clone());
        surrogate.created = obj.created;
        surrogate.heritable = obj.heritable;
        surrogate.privileges = obj.privileges.clone();
        surrogate.surrogate = true;
        Some(surrogate)
    }
}

/// Registry of surrogate policies, keyed by object kind.
#[derive(Default, Clone)]
pub struct SurrogateRegistry {
    policies: HashMap<ObjectKind, Arc<dyn SurrogatePolicy>>,
}

impl SurrogateRegistry {
    pub fn new() -> Self {
        SurrogateRegistry::default()
    }

    /// Register a policy for one object kind, replacing any previous one.
    pub fn register(&mut self, kind: ObjectKind, policy: Arc<dyn SurrogatePolicy>) {
        self.policies.insert(kind, policy);
    }

    pub fn policy_for(&self, kind: ObjectKind) -> Option<&Arc<dyn SurrogatePolicy>> {
        self.policies.get(&kind)
    }
}

impl std::fmt::Debug for SurrogateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrogateRegistry")
            .field("kinds", &self.policies.len())
            .finish()
    }
}

/// The object-level access control decision for one viewer.
///
/// Returns the object itself when the viewer's privileges dominate every
/// class protecting it, a policy-derived surrogate when one is registered
/// for the object's kind, and `None` otherwise. Every object handed to a
/// viewer passes through here.
pub fn version_suitable_for(
    g: &GraphStore,
    registry: &SurrogateRegistry,
    obj: &ProvObject,
    viewer: &User,
) -> GraphResult<Option<ProvObject>> {
    let mut cleared = true;
    for pc in obj.privileges.iter() {
        if !set_dominates(g, &viewer.privileges, pc)? {
            cleared = false;
            break;
        }
    }
    if cleared {
        return Ok(Some(obj.clone()));
    }

    match registry.policy_for(obj.kind) {
        Some(policy) => Ok(policy.surrogate(obj, viewer)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyMap;
    use crate::store::{codec, schema};

    fn lattice() -> GraphStore {
        // ADMIN > NATSEC > PUBLIC
        let mut g = GraphStore::new(&schema::kernel_config());
        let label = Label::new(LABEL_PRIVILEGE_CLASS);
        let mut node = |pc: &PrivilegeClass| {
            g.create_node(vec![label.clone()], codec::privilege_to_props(pc))
                .unwrap()
        };
        let admin = node(&PrivilegeClass::admin());
        let natsec = node(&PrivilegeClass::national_security());
        let public = node(&PrivilegeClass::public());
        g.create_rel(admin, natsec, REL_DOMINATES, PropertyMap::new()).unwrap();
        g.create_rel(natsec, public, REL_DOMINATES, PropertyMap::new()).unwrap();
        g
    }

    #[test]
    fn test_dominates_reflexive_and_admin() {
        let g = lattice();
        let pc = PrivilegeClass::national_security();
        assert!(dominates(&g, &pc, &pc).unwrap());
        assert!(dominates(&g, &PrivilegeClass::admin(), &PrivilegeClass::public()).unwrap());
        // ADMIN dominates even classes missing from the store.
        assert!(dominates(&g, &PrivilegeClass::admin(), &PrivilegeClass::level(9)).unwrap());
    }

    #[test]
    fn test_dominates_transitive_not_symmetric() {
        let g = lattice();
        assert!(dominates(
            &g,
            &PrivilegeClass::national_security(),
            &PrivilegeClass::public()
        )
        .unwrap());
        assert!(!dominates(
            &g,
            &PrivilegeClass::public(),
            &PrivilegeClass::admin()
        )
        .unwrap());
        assert!(!dominates(
            &g,
            &PrivilegeClass::public(),
            &PrivilegeClass::national_security()
        )
        .unwrap());
    }

    #[test]
    fn test_version_suitable_for_cleared_viewer() {
        let g = lattice();
        let registry = SurrogateRegistry::new();
        let obj = ProvObject::data("secret")
            .with_privileges(PrivilegeSet::with(vec![PrivilegeClass::national_security()]));

        let seen = version_suitable_for(&g, &registry, &obj, &User::god()).unwrap();
        assert_eq!(seen.as_ref().map(|o| o.oid.as_str()), Some(obj.oid.as_str()));
        assert!(!seen.unwrap().surrogate);
    }

    #[test]
    fn test_version_suitable_for_hides_without_policy() {
        let g = lattice();
        let registry = SurrogateRegistry::new();
        let obj = ProvObject::data("secret")
            .with_privileges(PrivilegeSet::with(vec![PrivilegeClass::national_security()]));

        let seen = version_suitable_for(&g, &registry, &obj, &User::public_user()).unwrap();
        assert!(seen.is_none());
    }

    #[test]
    fn test_version_suitable_for_surrogate() {
        let g = lattice();
        let mut registry = SurrogateRegistry::new();
        registry.register(
            ObjectKind::Data(crate::model::DataSubtype::Generic),
            Arc::new(RedactingPolicy),
        );
        let obj = ProvObject::data("secret")
            .with_privileges(PrivilegeSet::with(vec![PrivilegeClass::national_security()]));

        let seen = version_suitable_for(&g, &registry, &obj, &User::public_user())
            .unwrap()
            .unwrap();
        assert!(seen.surrogate);
        assert_eq!(seen.oid, obj.oid);
        assert_eq!(seen.name, "[redacted]");
        assert!(seen.metadata.is_empty());
    }

    #[test]
    fn test_unprotected_object_visible_to_everyone() {
        let g = lattice();
        let registry = SurrogateRegistry::new();
        let obj = ProvObject::data("open");
        let seen = version_suitable_for(&g, &registry, &obj, &User::public_user()).unwrap();
        assert!(seen.is_some());
    }
}
