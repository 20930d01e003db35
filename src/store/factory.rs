//! Polymorphic reconstruction of domain entities from stored graph elements
//!
//! Dispatches on the stored `(type, subtype)` pair to build the most
//! specific object variant, restores metadata, and binds owners and
//! privilege sets from their relationships.

use super::codec;
use super::schema::*;
use super::storage::{StoreError, StoreResult};
use crate::graph::{Direction, GraphStore, Label, NodeId, QueryItem, QueryRow, RelId, RelType};
use crate::model::{
    Actor, EdgeKind, NonProvenanceEdge, ObjectKind, PrivilegeClass, PrivilegeSet, ProvEdge,
    ProvenanceCollection, ProvObject,
};
use tracing::{debug, warn};

/// Whether a stored node is a provenance object node.
pub fn is_prov_object_node(g: &GraphStore, id: NodeId) -> bool {
    g.get_node(id)
        .map(|n| n.has_label(&Label::new(LABEL_PROVENANCE)))
        .unwrap_or(false)
}

/// Whether a stored node is a non-provenance identifier node.
pub fn is_npid_node(g: &GraphStore, id: NodeId) -> bool {
    g.get_node(id)
        .map(|n| n.has_label(&Label::new(LABEL_NON_PROVENANCE)))
        .unwrap_or(false)
}

/// Hydrate a provenance object from its stored node.
///
/// Population order: first-class properties, metadata, owner (inbound
/// `owns`), privilege set (outbound `controlledBy`). Multiple owners log a
/// warning and the first is retained.
pub fn object_from_node(g: &GraphStore, id: NodeId) -> StoreResult<ProvObject> {
    let node = g
        .get_node(id)
        .ok_or_else(|| StoreError::NotFound(format!("node {}", id)))?;
    if !node.has_label(&Label::new(LABEL_PROVENANCE)) {
        return Err(StoreError::InvalidArgument(format!(
            "node {} is not a provenance object node",
            id
        )));
    }

    let type_str = codec::prop_string(node, PROP_TYPE);
    let subtype = codec::prop_string(node, PROP_SUBTYPE);
    let kind = ObjectKind::from_strings(&type_str, &subtype);
    if kind == ObjectKind::Data(crate::model::DataSubtype::Generic)
        && (type_str != "data" || subtype != "generic")
    {
        debug!(
            "No specific kind for {}/{}; loading as generic",
            type_str, subtype
        );
    }

    let mut obj = ProvObject::new(kind, codec::prop_string(node, PROP_NAME))
        .with_oid(codec::prop_string(node, PROP_OID));
    obj.created = codec::prop_i64(node, PROP_CREATED);
    obj.heritable = codec::prop_bool(node, PROP_HERITABLE);
    obj.metadata = codec::metadata_from_props(&node.properties);

    let owns = RelType::new(REL_OWNS);
    let mut owner_count = 0;
    for rel in g.incoming_rels(id) {
        if rel.rel_type != owns {
            continue;
        }
        owner_count += 1;
        if owner_count > 1 {
            warn!("Duplicate owner on node {}; keeping the first", obj.oid);
            continue;
        }
        obj.owner = Some(actor_from_node(g, rel.source)?);
    }

    let controlled_by = RelType::new(REL_CONTROLLED_BY);
    let mut privileges = PrivilegeSet::new();
    for rel in g.outgoing_rels(id) {
        if rel.rel_type == controlled_by {
            privileges.add(privilege_from_node(g, rel.target)?);
        }
    }
    obj.privileges = privileges;

    Ok(obj)
}

/// Hydrate an actor from its stored node, dispatching on the actor type.
pub fn actor_from_node(g: &GraphStore, id: NodeId) -> StoreResult<Actor> {
    let node = g
        .get_node(id)
        .ok_or_else(|| StoreError::NotFound(format!("node {}", id)))?;
    if !node.has_label(&Label::new(LABEL_ACTOR)) {
        return Err(StoreError::InvalidArgument(format!(
            "node {} is not an actor node",
            id
        )));
    }

    let mut actor = Actor::new(codec::prop_string(node, PROP_NAME))
        .with_aid(codec::prop_string(node, PROP_AID))
        .with_kind(codec::actor_kind_from_props(node));
    actor.created = codec::prop_i64(node, PROP_CREATED);
    actor.display_name = node
        .get_property("displayName")
        .and_then(|v| v.as_string())
        .map(str::to_string);
    actor.email = node
        .get_property("email")
        .and_then(|v| v.as_string())
        .map(str::to_string);
    Ok(actor)
}

/// Hydrate a privilege class from its stored node.
pub fn privilege_from_node(g: &GraphStore, id: NodeId) -> StoreResult<PrivilegeClass> {
    let node = g
        .get_node(id)
        .ok_or_else(|| StoreError::NotFound(format!("node {}", id)))?;
    Ok(PrivilegeClass::new(
        codec::prop_string(node, PROP_PID),
        codec::prop_string(node, PROP_NAME),
    ))
}

/// Hydrate a provenance edge from its stored relationship.
///
/// The workflow property carries the workflow OID; the well-known default
/// workflow is recognized by its constant OID and needs no store read.
pub fn edge_from_rel(g: &GraphStore, id: RelId) -> StoreResult<ProvEdge> {
    let rel = g
        .get_rel(id)
        .ok_or_else(|| StoreError::NotFound(format!("relationship {}", id)))?;

    let kind = EdgeKind::from_str(rel.rel_type.as_str()).unwrap_or_else(|| {
        warn!(
            "Relationship {} has non-lineage type {}; loading as unspecified",
            id,
            rel.rel_type.as_str()
        );
        EdgeKind::Unspecified
    });

    let from_node = g
        .get_node(rel.source)
        .ok_or_else(|| StoreError::NotFound(format!("node {}", rel.source)))?;
    let to_node = g
        .get_node(rel.target)
        .ok_or_else(|| StoreError::NotFound(format!("node {}", rel.target)))?;

    let mut edge = ProvEdge::new(
        codec::prop_string(from_node, PROP_OID),
        codec::prop_string(to_node, PROP_OID),
        kind,
    );
    let workflow = rel
        .get_property(PROP_WORKFLOW)
        .and_then(|v| v.as_string())
        .filter(|s| !s.is_empty());
    if let Some(wf) = workflow {
        edge = edge.in_workflow(wf);
    }
    Ok(edge)
}

/// Hydrate a non-provenance edge from its stored relationship, classifying
/// each endpoint as a provenance object or an external identifier.
pub fn npe_from_rel(g: &GraphStore, id: RelId) -> StoreResult<NonProvenanceEdge> {
    let rel = g
        .get_rel(id)
        .ok_or_else(|| StoreError::NotFound(format!("relationship {}", id)))?;

    let endpoint_id = |node_id: NodeId| -> StoreResult<String> {
        let node = g
            .get_node(node_id)
            .ok_or_else(|| StoreError::NotFound(format!("node {}", node_id)))?;
        if node.has_label(&Label::new(LABEL_PROVENANCE)) {
            Ok(codec::prop_string(node, PROP_OID))
        } else {
            Ok(codec::prop_string(node, PROP_NPID))
        }
    };

    if !is_prov_object_node(g, rel.source) {
        warn!("FROM end of non-provenance edge {} is not a provenance object", id);
    }

    Ok(NonProvenanceEdge::from_parts(
        rel.get_property(PROP_NPEID)
            .and_then(|v| v.as_string())
            .unwrap_or_default(),
        endpoint_id(rel.source)?,
        endpoint_id(rel.target)?,
        rel.get_property(PROP_TYPE)
            .and_then(|v| v.as_string())
            .unwrap_or_default(),
        rel.get_property(PROP_CREATED)
            .and_then(|v| v.as_integer())
            .unwrap_or(0),
    ))
}

/// Extract a provenance collection from query result rows.
///
/// Only provenance elements are kept: provenance nodes, actors,
/// non-provenance nodes (rendered through an incident NPE), lineage edges
/// between provenance nodes, and NPE relationships. Everything else is
/// skipped with a log line.
pub fn collection_from_rows(g: &GraphStore, rows: &[QueryRow]) -> StoreResult<ProvenanceCollection> {
    let mut col = ProvenanceCollection::new();
    let npe = RelType::new(REL_NPE);

    for row in rows {
        for (_, item) in row.items() {
            match *item {
                QueryItem::Node(id) => {
                    if is_prov_object_node(g, id) {
                        col.add_node(object_from_node(g, id)?);
                    } else if g
                        .get_node(id)
                        .map(|n| n.has_label(&Label::new(LABEL_ACTOR)))
                        .unwrap_or(false)
                    {
                        col.add_actor(actor_from_node(g, id)?);
                    } else if is_npid_node(g, id) {
                        if let Some(rel) = g
                            .incident_rels(id)
                            .into_iter()
                            .find(|r| r.rel_type == npe)
                        {
                            col.add_npe(npe_from_rel(g, rel.id)?);
                        }
                    } else {
                        debug!("Skipping non-provenance node {}", id);
                    }
                }
                QueryItem::Rel(id) => {
                    let Some(rel) = g.get_rel(id) else {
                        continue;
                    };
                    if rel.rel_type == npe {
                        col.add_npe(npe_from_rel(g, id)?);
                    } else if is_prov_object_node(g, rel.source)
                        && is_prov_object_node(g, rel.target)
                        && EdgeKind::from_str(rel.rel_type.as_str()).is_some()
                    {
                        col.add_node(object_from_node(g, rel.source)?);
                        col.add_node(object_from_node(g, rel.target)?);
                        col.add_edge(edge_from_rel(g, id)?);
                    } else {
                        debug!("Skipping non-provenance relationship {}", id);
                    }
                }
            }
        }
    }

    Ok(col)
}

/// Lineage relationships incident to a node, in the requested direction.
pub fn incident_lineage_rels<'g>(
    g: &'g GraphStore,
    id: NodeId,
    direction: Direction,
) -> Vec<&'g crate::graph::Relationship> {
    let rels = match direction {
        Direction::Outgoing => g.outgoing_rels(id),
        Direction::Incoming => g.incoming_rels(id),
        Direction::Both => g.incident_rels(id),
    };
    rels.into_iter()
        .filter(|r| EdgeKind::from_str(r.rel_type.as_str()).is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyMap;
    use crate::store::schema;

    fn graph() -> GraphStore {
        GraphStore::new(&schema::kernel_config())
    }

    fn store_object(g: &mut GraphStore, obj: &ProvObject) -> NodeId {
        g.create_node(
            vec![Label::new(LABEL_PROVENANCE)],
            codec::object_to_props(obj),
        )
        .unwrap()
    }

    #[test]
    fn test_object_roundtrip() {
        let mut g = graph();
        let obj = ProvObject::data("artifact").with_metadata("source", "sensor");
        let id = store_object(&mut g, &obj);

        let back = object_from_node(&g, id).unwrap();
        assert_eq!(back.oid, obj.oid);
        assert_eq!(back.name, "artifact");
        assert_eq!(back.kind, obj.kind);
        assert_eq!(
            back.metadata.get("source").and_then(|v| v.as_string()),
            Some("sensor")
        );
        assert!(back.owner.is_none());
        assert!(back.privileges.is_empty());
    }

    #[test]
    fn test_owner_binding() {
        let mut g = graph();
        let actor = Actor::new("pipeline");
        let actor_id = g
            .create_node(vec![Label::new(LABEL_ACTOR)], codec::actor_to_props(&actor))
            .unwrap();
        let obj = ProvObject::data("owned");
        let obj_id = store_object(&mut g, &obj);
        g.create_rel(actor_id, obj_id, REL_OWNS, PropertyMap::new())
            .unwrap();

        let back = object_from_node(&g, obj_id).unwrap();
        assert_eq!(back.owner.as_ref().map(|a| a.aid.as_str()), Some(actor.aid.as_str()));
    }

    #[test]
    fn test_privilege_binding() {
        let mut g = graph();
        let pc = PrivilegeClass::national_security();
        let pc_id = g
            .create_node(
                vec![Label::new(LABEL_PRIVILEGE_CLASS)],
                codec::privilege_to_props(&pc),
            )
            .unwrap();
        let obj = ProvObject::data("classified");
        let obj_id = store_object(&mut g, &obj);
        g.create_rel(obj_id, pc_id, REL_CONTROLLED_BY, PropertyMap::new())
            .unwrap();

        let back = object_from_node(&g, obj_id).unwrap();
        assert!(back.privileges.contains(&pc));
    }

    #[test]
    fn test_edge_roundtrip_with_workflow() {
        let mut g = graph();
        let a = ProvObject::data("a");
        let b = ProvObject::data("b");
        let a_id = store_object(&mut g, &a);
        let b_id = store_object(&mut g, &b);

        let mut props = PropertyMap::new();
        props.insert(PROP_WORKFLOW.to_string(), "urn:uuid:wf".into());
        let rid = g.create_rel(a_id, b_id, "input to", props).unwrap();

        let edge = edge_from_rel(&g, rid).unwrap();
        assert_eq!(edge.from, a.oid);
        assert_eq!(edge.to, b.oid);
        assert_eq!(edge.kind, EdgeKind::InputTo);
        assert_eq!(edge.workflow.as_deref(), Some("urn:uuid:wf"));
    }

    #[test]
    fn test_npe_endpoint_classification() {
        let mut g = graph();
        let obj = ProvObject::data("hashed");
        let obj_id = store_object(&mut g, &obj);
        let mut npid_props = PropertyMap::new();
        npid_props.insert(PROP_NPID.to_string(), "abc123".into());
        let npid_id = g
            .create_node(vec![Label::new(LABEL_NON_PROVENANCE)], npid_props)
            .unwrap();

        let npe = NonProvenanceEdge::new(&obj.oid, "abc123", "md5");
        let rid = g
            .create_rel(obj_id, npid_id, REL_NPE, codec::npe_to_props(&npe))
            .unwrap();

        let back = npe_from_rel(&g, rid).unwrap();
        assert_eq!(back.from, obj.oid);
        assert_eq!(back.to, "abc123");
        assert_eq!(back.kind, "md5");
        assert_eq!(back.npeid, npe.npeid);
        assert!(back.points_at_npid());
    }

    #[test]
    fn test_generic_fallback() {
        let mut g = graph();
        let mut props = PropertyMap::new();
        props.insert(PROP_OID.to_string(), "urn:uuid:00000000-0000-0000-0000-0000000000aa".into());
        props.insert(PROP_TYPE.to_string(), "mystery".into());
        props.insert(PROP_SUBTYPE.to_string(), "mystery".into());
        props.insert(PROP_NAME.to_string(), "odd".into());
        let id = g.create_node(vec![Label::new(LABEL_PROVENANCE)], props).unwrap();

        let obj = object_from_node(&g, id).unwrap();
        assert_eq!(obj.kind, ObjectKind::Data(crate::model::DataSubtype::Generic));
    }
}
