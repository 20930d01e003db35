//! Client facade over a local provenance store
//!
//! A thin, user-parameterized adapter around the storage and traversal
//! layers: every request runs as the client's user, and storage errors
//! are wrapped in a single client error type preserving the cause.

use crate::dag::{new_dag, LineageDag, TraversalSettings};
use crate::graph::PropertyValue;
use crate::model::{
    Actor, PrivilegeClass, ProvenanceCollection, ProvObject, User,
};
use crate::store::{ProvenanceStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Client-facing errors, wrapping the underlying cause.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Provenance client error: {0}")]
    Store(#[from] StoreError),

    #[error("Provenance client error: {0}")]
    Other(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// A provenance client attached to a local store on disk.
///
/// All requests are made as the client's user; an unauthorized object
/// shows up as `None` or is simply absent from a collection, never as an
/// error.
pub struct LocalClient {
    store: Arc<ProvenanceStore>,
    user: User,
}

impl LocalClient {
    /// Create a client acting as the given user.
    pub fn new(store: Arc<ProvenanceStore>, user: User) -> Self {
        LocalClient { store, user }
    }

    /// Create a client acting as the anonymous public user.
    pub fn public(store: Arc<ProvenanceStore>) -> Self {
        LocalClient::new(store, User::public_user())
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn store(&self) -> &ProvenanceStore {
        &self.store
    }

    /// Report a collection of provenance; returns true when anything new
    /// was persisted.
    pub fn report(&self, col: &ProvenanceCollection) -> ClientResult<bool> {
        Ok(self.store.store_collection(col)? > 0)
    }

    /// Discover the lineage graph around an object, as seen by this
    /// client's user.
    pub fn get_graph(&self, oid: &str, settings: &TraversalSettings) -> ClientResult<LineageDag> {
        Ok(new_dag(&self.store, oid, &self.user, settings)?)
    }

    /// The stored object under an OID, unfiltered; None when absent.
    pub fn exists(&self, oid: &str) -> ClientResult<Option<ProvObject>> {
        Ok(self.store.get_object(oid)?)
    }

    /// The most recently reported objects.
    pub fn latest(&self) -> ClientResult<ProvenanceCollection> {
        Ok(self.store.get_recently_created(&self.user, 20)?)
    }

    /// Up to `max` actors known to the store.
    pub fn get_actors(&self, max: i64) -> ClientResult<ProvenanceCollection> {
        Ok(self.store.get_actors(max)?)
    }

    /// Search objects by name.
    pub fn search(&self, term: &str, max: i64) -> ClientResult<ProvenanceCollection> {
        Ok(self.store.search(term, &self.user, max)?)
    }

    /// Search objects by metadata key/value pairs.
    pub fn search_by_metadata(
        &self,
        fields: &HashMap<String, PropertyValue>,
        max: i64,
    ) -> ClientResult<ProvenanceCollection> {
        Ok(self.store.load_by_metadata(&self.user, fields, max)?)
    }

    /// The most recently created workflows.
    pub fn list_workflows(&self, max: i64) -> ClientResult<Vec<ProvObject>> {
        Ok(self.store.list_workflows(max)?)
    }

    /// The most recent members (edges plus endpoints) of a workflow.
    pub fn get_workflow_members(
        &self,
        oid: &str,
        max: i64,
    ) -> ClientResult<ProvenanceCollection> {
        let obj = self
            .get_single_node(oid)?
            .ok_or_else(|| {
                ClientError::Other(format!(
                    "cannot load workflow members of nonexistent node {}",
                    oid
                ))
            })?;
        if !obj.is_workflow() {
            return Err(ClientError::Other(format!(
                "cannot load workflow members of non-workflow {}",
                oid
            )));
        }
        Ok(self.store.get_members(oid, &self.user, max)?)
    }

    /// A single object, filtered for this client's user.
    pub fn get_single_node(&self, oid: &str) -> ClientResult<Option<ProvObject>> {
        Ok(self.store.get_object_for(oid, &self.user)?)
    }

    /// Look up an actor by aid.
    pub fn actor_exists(&self, aid: &str) -> ClientResult<Option<Actor>> {
        Ok(self.store.get_actor(aid)?)
    }

    /// Look up an actor by name.
    pub fn actor_exists_by_name(&self, name: &str) -> ClientResult<Option<Actor>> {
        Ok(self.store.get_actor_by_name(name)?)
    }

    /// Whether one privilege class dominates another.
    pub fn dominates(&self, a: &PrivilegeClass, b: &PrivilegeClass) -> ClientResult<bool> {
        Ok(self.store.dominates(a, b)?)
    }

    /// Mark an object as tainted, as this client's user.
    pub fn taint(&self, oid: &str, description: &str) -> ClientResult<ProvObject> {
        Ok(self.store.taint(oid, &self.user, description)?)
    }

    /// Remove the taints attached directly to an object.
    pub fn remove_taints(&self, oid: &str) -> ClientResult<usize> {
        Ok(self.store.remove_taints(oid)?)
    }

    /// All taint sources of an object, direct and inherited.
    pub fn get_all_taint_sources(&self, oid: &str) -> ClientResult<ProvenanceCollection> {
        Ok(self.store.get_all_taint_sources(oid, &self.user)?)
    }

    /// Run a free-form pattern query; only provenance content comes back.
    pub fn query(&self, text: &str) -> ClientResult<ProvenanceCollection> {
        Ok(self.store.query(text, &self.user)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeKind, ProvEdge};

    fn client() -> LocalClient {
        LocalClient::new(Arc::new(ProvenanceStore::in_memory().unwrap()), User::god())
    }

    fn chain(c: &LocalClient) -> (ProvObject, ProvObject) {
        let a = ProvObject::data("a");
        let b = ProvObject::data("b");
        let mut col = ProvenanceCollection::new();
        col.add_node(a.clone());
        col.add_node(b.clone());
        col.add_edge(ProvEdge::new(&a.oid, &b.oid, EdgeKind::InputTo));
        c.report(&col).unwrap();
        (a, b)
    }

    #[test]
    fn test_report_and_exists() {
        let c = client();
        let (a, b) = chain(&c);
        assert!(c.exists(&a.oid).unwrap().is_some());
        assert!(c.exists(&b.oid).unwrap().is_some());
        assert!(c.exists(&crate::model::new_oid()).unwrap().is_none());
    }

    #[test]
    fn test_get_graph() {
        let c = client();
        let (a, b) = chain(&c);
        let dag = c
            .get_graph(&a.oid, &TraversalSettings::new().set_n(10))
            .unwrap();
        assert!(dag.contains_oid(&a.oid));
        assert!(dag.contains_oid(&b.oid));
    }

    #[test]
    fn test_workflow_members_validation() {
        let c = client();
        let (a, _) = chain(&c);
        // Not a workflow.
        assert!(c.get_workflow_members(&a.oid, 10).is_err());
        // Nonexistent node.
        assert!(c
            .get_workflow_members(&crate::model::new_oid(), 10)
            .is_err());
        // The default workflow works.
        c.get_workflow_members(crate::model::DEFAULT_WORKFLOW_OID, 10)
            .unwrap();
    }

    #[test]
    fn test_taint_roundtrip() {
        let c = client();
        let (a, _) = chain(&c);

        let taint = c.taint(&a.oid, "bad input").unwrap();
        let sources = c.get_all_taint_sources(&a.oid).unwrap();
        assert!(sources.contains_oid(&taint.oid));

        assert_eq!(c.remove_taints(&a.oid).unwrap(), 1);
        let sources = c.get_all_taint_sources(&a.oid).unwrap();
        assert!(!sources.contains_oid(&taint.oid));
    }

    #[test]
    fn test_query_via_client() {
        let c = client();
        let (a, _) = chain(&c);
        let col = c
            .query(&format!(r#"match (n:Provenance {{oid: "{}"}}) return n"#, a.oid))
            .unwrap();
        assert!(col.contains_oid(&a.oid));
    }

    #[test]
    fn test_dominates_via_client() {
        let c = client();
        assert!(c
            .dominates(&PrivilegeClass::admin(), &PrivilegeClass::public())
            .unwrap());
        assert!(!c
            .dominates(&PrivilegeClass::public(), &PrivilegeClass::admin())
            .unwrap());
    }
}
