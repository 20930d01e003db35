//! Lineage graph discovery: bounded spidering from a starting point
//!
//! Drives the kernel traversal from an OID or non-provenance identifier,
//! hydrating each visited element, filtering every object through the
//! viewer's surrogate filter, and running the post-traversal annotation
//! passes. Partial hydration failures are logged and skipped; they never
//! abort the whole discovery.

use super::lineage::LineageDag;
use super::settings::TraversalSettings;
use crate::graph::{Direction, Label, RelId, RelType, TraversalSpec, Traverser};
use crate::model::{ids, User};
use crate::store::schema::{self, LABEL_PROVENANCE, REL_NPE};
use crate::store::storage::{self, ProvenanceStore, StoreError, StoreResult};
use crate::store::{codec, factory, view};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Discover a lineage DAG from a starting identifier.
///
/// The starting id is resolved as an OID when it looks like one, else as
/// a non-provenance identifier; an unresolvable id is a not-found error.
/// Since discovery honors node and depth caps, there is no connectedness
/// guarantee about what comes back.
pub fn new_dag(
    store: &ProvenanceStore,
    id: &str,
    user: &User,
    settings: &TraversalSettings,
) -> StoreResult<LineageDag> {
    debug!("{} traversing {} with {:?}", user.name(), id, settings);

    let registry = store.registry();
    let txn = store.kernel().read();

    let start = if ids::is_prov_oid(id) {
        storage::oid_node(&txn, id)
    } else {
        storage::npid_node(&txn, id)
    };
    let Some(start) = start else {
        return Err(StoreError::NotFound(format!("no such node {}", id)));
    };

    let mut dag = LineageDag::new(user.clone());
    dag.fingerprint_mut().start_timer("DiscoverCollection");
    dag.fingerprint_mut().start_timer("Build");

    let mut rel_types = schema::provenance_rel_types();
    if settings.follow_npids {
        rel_types.push(RelType::new(REL_NPE));
    }
    let direction = match (settings.forward, settings.backward) {
        (true, false) => Direction::Outgoing,
        (false, true) => Direction::Incoming,
        _ => Direction::Both,
    };
    let mut spec = TraversalSpec::new(rel_types, direction);
    if !settings.breadth_first {
        spec = spec.depth_first();
    }
    if settings.max_depth > 0 {
        spec = spec.with_max_depth(settings.max_depth as u32);
    }

    let prov_label = Label::new(LABEL_PROVENANCE);
    let npe_type = RelType::new(REL_NPE);
    let mut seen_rels: HashSet<RelId> = HashSet::new();

    for (node_id, _depth) in Traverser::new(&txn, start, spec) {
        // Throttle at this many nodes maximum.
        if settings.n > 0 && dag.count_nodes() as i64 >= settings.n {
            break;
        }

        let Some(node) = txn.get_node(node_id) else {
            continue;
        };

        if !node.has_label(&prov_label) {
            // A non-provenance identifier node: it contributes only its
            // incident NPE relationships.
            if settings.include_npes {
                collect_npes(&txn, &mut dag, node_id, &npe_type, &mut seen_rels);
            }
            continue;
        }

        if settings.include_nodes {
            let oid = codec::prop_string(node, schema::PROP_OID);
            dag.fingerprint_mut().start_timer("HydrateNodes");
            match factory::object_from_node(&txn, node_id) {
                Ok(obj) => match view::version_suitable_for(&txn, &registry, &obj, user) {
                    Ok(seen) => {
                        let owner = seen.as_ref().and_then(|o| o.owner.clone());
                        dag.add_viewed(&oid, seen);
                        if let Some(owner) = owner {
                            dag.add_actor(owner);
                        }
                    }
                    Err(e) => warn!("View filter failed for {}: {}", oid, e),
                },
                Err(e) => warn!("Skipping unhydratable node {}: {}", node_id, e),
            }
            dag.fingerprint_mut().stop_timer("HydrateNodes");
        }

        if settings.include_edges {
            dag.fingerprint_mut().start_timer("SpiderRelationships");
            for rel in factory::incident_lineage_rels(&txn, node_id, Direction::Both) {
                if !seen_rels.insert(rel.id) {
                    continue;
                }
                match factory::edge_from_rel(&txn, rel.id) {
                    Ok(edge) => dag.add_edge(edge),
                    Err(e) => warn!("Skipping unhydratable edge {}: {}", rel.id, e),
                }
            }
            dag.fingerprint_mut().stop_timer("SpiderRelationships");
        }

        if settings.include_npes {
            dag.fingerprint_mut().start_timer("SpiderNPEs");
            collect_npes(&txn, &mut dag, node_id, &npe_type, &mut seen_rels);
            dag.fingerprint_mut().stop_timer("SpiderNPEs");
        }
    }

    // Owners of everything collected appear as actors in the result.
    let owners: Vec<crate::model::Actor> = dag
        .nodes()
        .iter()
        .filter_map(|o| o.owner.clone())
        .collect();
    for owner in owners {
        dag.add_actor(owner);
    }

    dag.choose_focus(id);
    dag.fingerprint_mut().stop_timer("Build");

    dag.compute_edge_voting();
    dag.trace_taint_sources();
    dag.draw_inferrable_edges();
    dag.tag_head_and_feet();
    let _danglers = dag.detect_danglers();

    dag.fingerprint_mut().stop_timer("DiscoverCollection");
    dag.finish_fingerprint();
    Ok(dag)
}

fn collect_npes(
    txn: &crate::graph::ReadTxn<'_>,
    dag: &mut LineageDag,
    node_id: crate::graph::NodeId,
    npe_type: &RelType,
    seen_rels: &mut HashSet<RelId>,
) {
    for rel in txn.incident_rels(node_id) {
        if rel.rel_type != *npe_type || !seen_rels.insert(rel.id) {
            continue;
        }
        match factory::npe_from_rel(txn, rel.id) {
            Ok(npe) => dag.add_npe(npe),
            Err(e) => warn!("Skipping unhydratable NPE {}: {}", rel.id, e),
        }
    }
}
