//! Storage-layer contract tests: unique keys, atomicity, endpoints,
//! dominance, and durability across reopen.

use provdb::{
    Actor, EdgeKind, NonProvenanceEdge, PrivilegeClass, ProvEdge, ProvObject,
    ProvenanceCollection, ProvenanceStore, StoreError, User,
};
use tempfile::TempDir;

fn store() -> ProvenanceStore {
    ProvenanceStore::in_memory().unwrap()
}

#[test]
fn unique_key_roundtrip_and_idempotent_reinsert() {
    let s = store();
    let obj = ProvObject::data("artifact").with_metadata("source", "sensor-7");

    assert!(s.store_object(&obj).unwrap());
    let back = s.get_object(&obj.oid).unwrap().unwrap();
    assert_eq!(back.oid, obj.oid);
    assert_eq!(back.name, obj.name);
    assert_eq!(back.kind, obj.kind);
    assert_eq!(back.created, obj.created);
    assert_eq!(back.metadata, obj.metadata);

    // A second store is a no-op returning the existing node.
    assert!(!s.store_object(&obj).unwrap());
    let again = s.get_object(&obj.oid).unwrap().unwrap();
    assert_eq!(again.oid, obj.oid);
}

#[test]
fn reinsert_does_not_create_new_relationships() {
    // Scenario S6: the duplicate insert leaves the graph untouched.
    let s = store();
    let actor = Actor::new("owner");
    s.store_actor(&actor).unwrap();
    let o1 = ProvObject::data("o1").with_owner(actor);
    s.store_object(&o1).unwrap();

    let before = s
        .get_graph_edge_count(&o1.oid)
        .expect("graph should be readable");
    assert!(!s.store_object(&o1).unwrap());
    let after = s.get_graph_edge_count(&o1.oid).unwrap();
    assert_eq!(before, after);
}

// Small extension trait so the test can count raw incident relationships
// without reaching into kernel internals.
trait EdgeCount {
    fn get_graph_edge_count(&self, oid: &str) -> Option<usize>;
}

impl EdgeCount for ProvenanceStore {
    fn get_graph_edge_count(&self, oid: &str) -> Option<usize> {
        let col = self
            .get_incident_edges(&[oid.to_string()], &User::god(), "both", true, true)
            .ok()?;
        Some(col.count_edges() + col.count_npes())
    }
}

#[test]
fn collection_atomicity() {
    let s = store();
    let actor = Actor::new("svc");
    let a = ProvObject::data("a");
    let b = ProvObject::data("b");

    let mut col = ProvenanceCollection::new();
    col.add_actor(actor.clone());
    col.add_node(a.clone());
    col.add_node(b.clone());
    col.add_edge(ProvEdge::new(&a.oid, &b.oid, EdgeKind::InputTo));
    col.add_npe(NonProvenanceEdge::new(&a.oid, "abc123", "md5"));

    // All-or-nothing on success.
    assert_eq!(s.store_collection(&col).unwrap(), 5);
    assert!(s.get_object(&a.oid).unwrap().is_some());
    assert!(s.get_object(&b.oid).unwrap().is_some());
    assert!(s.get_actor(&actor.aid).unwrap().is_some());
    assert!(s.npid_exists("abc123"));

    // All-or-nothing on failure: a bad edge poisons the whole batch.
    let c = ProvObject::data("c");
    let mut bad = ProvenanceCollection::new();
    bad.add_node(c.clone());
    bad.add_edge(ProvEdge::new(&c.oid, provdb::new_oid(), EdgeKind::Generated));
    assert!(s.store_collection(&bad).is_err());
    assert!(s.get_object(&c.oid).unwrap().is_none());
}

#[test]
fn edge_endpoint_invariant() {
    let s = store();
    let a = ProvObject::data("a");
    s.store_object(&a).unwrap();

    let edge = ProvEdge::new(&a.oid, provdb::new_oid(), EdgeKind::Contributed);
    let err = s.store_edge(&edge).unwrap_err();
    assert!(matches!(err, StoreError::DanglingEdge(_)));
    assert!(!s.edge_exists(&edge));
}

#[test]
fn npe_from_must_exist_to_is_auto_created() {
    let s = store();
    let bad = NonProvenanceEdge::new(provdb::new_oid(), "abc", "md5");
    assert!(matches!(
        s.store_npe(&bad).unwrap_err(),
        StoreError::DanglingEdge(_)
    ));

    let a = ProvObject::data("a");
    s.store_object(&a).unwrap();
    let good = NonProvenanceEdge::new(&a.oid, "abc", "md5");
    s.store_npe(&good).unwrap();
    assert!(s.npid_exists("abc"));
    assert!(s.npe_exists(&good));
}

#[test]
fn dominance_lattice() {
    let s = store();
    use PrivilegeClass as PC;

    // ADMIN dominates every class.
    for other in [
        PC::admin(),
        PC::national_security(),
        PC::emergency_high(),
        PC::emergency_low(),
        PC::private_medical(),
        PC::public(),
        PC::level(1),
        PC::level(10),
    ] {
        assert!(s.dominates(&PC::admin(), &other).unwrap());
    }

    // Every class trivially dominates itself.
    assert!(s.dominates(&PC::level(5), &PC::level(5)).unwrap());

    // The bottom does not dominate the top.
    assert!(!s.dominates(&PC::public(), &PC::admin()).unwrap());
    assert!(!s.dominates(&PC::public(), &PC::national_security()).unwrap());

    // Transitive closure across the stored edges.
    assert!(s.dominates(&PC::national_security(), &PC::public()).unwrap());
    assert!(s.dominates(&PC::national_security(), &PC::emergency_low()).unwrap());
    assert!(s.dominates(&PC::level(10), &PC::level(1)).unwrap());
    assert!(!s.dominates(&PC::level(1), &PC::level(10)).unwrap());
}

#[test]
fn assert_dominates_extends_lattice() {
    let s = store();
    let custom_high = PrivilegeClass::new("urn:privilege:custom-high", "CUSTOM_HIGH");
    let custom_low = PrivilegeClass::new("urn:privilege:custom-low", "CUSTOM_LOW");

    assert!(!s.dominates(&custom_high, &custom_low).unwrap());
    s.assert_dominates(&custom_high, &custom_low).unwrap();
    assert!(s.dominates(&custom_high, &custom_low).unwrap());

    // Repeating the assertion is idempotent.
    s.assert_dominates(&custom_high, &custom_low).unwrap();
    assert!(s.dominates(&custom_high, &custom_low).unwrap());
}

#[test]
fn survives_reopen() {
    let dir = TempDir::new().unwrap();
    let a = ProvObject::data("persisted");
    let b = ProvObject::data("also persisted");

    {
        let s = ProvenanceStore::open(dir.path()).unwrap();
        let mut col = ProvenanceCollection::new();
        col.add_node(a.clone());
        col.add_node(b.clone());
        col.add_edge(ProvEdge::new(&a.oid, &b.oid, EdgeKind::Generated));
        s.store_collection(&col).unwrap();
        s.checkpoint().unwrap();
    }

    let s = ProvenanceStore::open(dir.path()).unwrap();
    assert!(s.get_object(&a.oid).unwrap().is_some());
    assert!(s.get_object(&b.oid).unwrap().is_some());
    let edge = ProvEdge::new(&a.oid, &b.oid, EdgeKind::Generated);
    assert!(s.edge_exists(&edge));

    // The bootstrap did not run twice: built-ins are present exactly once.
    let workflows = s.list_workflows(1000).unwrap();
    let defaults = workflows
        .iter()
        .filter(|w| w.oid == provdb::DEFAULT_WORKFLOW_OID)
        .count();
    assert_eq!(defaults, 1);
}

#[test]
fn delete_edge_null_workflow_matching() {
    let s = store();
    let a = ProvObject::data("a");
    let b = ProvObject::data("b");
    s.store_object(&a).unwrap();
    s.store_object(&b).unwrap();

    let with_wf = ProvEdge::new(&a.oid, &b.oid, EdgeKind::Marks)
        .in_workflow(provdb::DEFAULT_WORKFLOW_OID);
    s.store_edge(&with_wf).unwrap();

    // A workflow-less tuple does not match the workflow-carrying edge.
    let without_wf = ProvEdge::new(&a.oid, &b.oid, EdgeKind::Marks);
    assert!(!s.delete_edge(&without_wf).unwrap());
    assert!(s.edge_exists(&with_wf));

    assert!(s.delete_edge(&with_wf).unwrap());
    assert!(!s.edge_exists(&with_wf));
}
