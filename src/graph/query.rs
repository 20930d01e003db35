//! Structural pattern queries over the graph store
//!
//! A `PatternQuery` matches a node pattern, optionally one relationship hop
//! to a second node pattern, filters on property equality, and applies
//! order-by and limit. The textual form is parsed in `parse`; internal
//! callers construct queries directly.

use super::property::{compare_values, PropertyValue};
use super::store::{GraphError, GraphResult, GraphStore};
use super::types::{Direction, Label, NodeId, RelId, RelType};
use std::collections::HashMap;

/// A node pattern: variable name, optional label, property equalities.
#[derive(Debug, Clone)]
pub struct NodePattern {
    pub var: String,
    pub label: Option<Label>,
    pub props: Vec<(String, PropertyValue)>,
}

impl NodePattern {
    pub fn var(var: impl Into<String>) -> Self {
        NodePattern {
            var: var.into(),
            label: None,
            props: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<Label>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.props.push((key.into(), value.into()));
        self
    }
}

/// A relationship pattern: optional variable, type alternation, direction.
///
/// `Outgoing` reads left-to-right: start node is the source. An empty type
/// list matches any relationship type.
#[derive(Debug, Clone)]
pub struct RelPattern {
    pub var: Option<String>,
    pub types: Vec<RelType>,
    pub direction: Direction,
}

/// Property equality filter on a bound variable.
#[derive(Debug, Clone)]
pub struct Condition {
    pub var: String,
    pub key: String,
    pub value: PropertyValue,
}

/// Ordering directive over a bound variable's property.
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub var: String,
    pub key: String,
    pub descending: bool,
}

/// A complete pattern query.
#[derive(Debug, Clone)]
pub struct PatternQuery {
    pub start: NodePattern,
    pub hop: Option<(RelPattern, NodePattern)>,
    pub conditions: Vec<Condition>,
    pub returns: Vec<String>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl PatternQuery {
    /// Single-node query returning the matched variable.
    pub fn node(start: NodePattern) -> Self {
        let var = start.var.clone();
        PatternQuery {
            start,
            hop: None,
            conditions: Vec::new(),
            returns: vec![var],
            order_by: None,
            limit: None,
        }
    }

    pub fn with_hop(mut self, rel: RelPattern, end: NodePattern) -> Self {
        self.hop = Some((rel, end));
        self
    }

    pub fn returning(mut self, vars: Vec<String>) -> Self {
        self.returns = vars;
        self
    }

    pub fn order_by(mut self, var: impl Into<String>, key: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some(OrderBy {
            var: var.into(),
            key: key.into(),
            descending,
        });
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A single bound element in a query row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryItem {
    Node(NodeId),
    Rel(RelId),
}

/// One result row: variable bindings restricted to the return list.
#[derive(Debug, Clone)]
pub struct QueryRow {
    bindings: HashMap<String, QueryItem>,
}

impl QueryRow {
    pub fn get(&self, var: &str) -> Option<QueryItem> {
        self.bindings.get(var).copied()
    }

    pub fn node(&self, var: &str) -> Option<NodeId> {
        match self.get(var) {
            Some(QueryItem::Node(id)) => Some(id),
            _ => None,
        }
    }

    pub fn rel(&self, var: &str) -> Option<RelId> {
        match self.get(var) {
            Some(QueryItem::Rel(id)) => Some(id),
            _ => None,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = (&String, &QueryItem)> {
        self.bindings.iter()
    }
}

/// Execute a pattern query against the store.
pub fn execute(store: &GraphStore, query: &PatternQuery) -> GraphResult<Vec<QueryRow>> {
    let starts = candidate_nodes(store, &query.start);

    let mut rows: Vec<HashMap<String, QueryItem>> = Vec::new();
    for start in starts {
        if !node_matches(store, start, &query.start) {
            continue;
        }
        match &query.hop {
            None => {
                let mut bindings = HashMap::new();
                bindings.insert(query.start.var.clone(), QueryItem::Node(start));
                rows.push(bindings);
            }
            Some((rel_pattern, end_pattern)) => {
                let rels = match rel_pattern.direction {
                    Direction::Outgoing => store.outgoing_rels(start),
                    Direction::Incoming => store.incoming_rels(start),
                    Direction::Both => store.incident_rels(start),
                };
                for rel in rels {
                    if !rel_pattern.types.is_empty() && !rel_pattern.types.contains(&rel.rel_type)
                    {
                        continue;
                    }
                    let end = rel.other_end(start);
                    if !node_matches(store, end, end_pattern) {
                        continue;
                    }
                    let mut bindings = HashMap::new();
                    bindings.insert(query.start.var.clone(), QueryItem::Node(start));
                    if let Some(v) = &rel_pattern.var {
                        bindings.insert(v.clone(), QueryItem::Rel(rel.id));
                    }
                    bindings.insert(end_pattern.var.clone(), QueryItem::Node(end));
                    rows.push(bindings);
                }
            }
        }
    }

    // Equality filters over bound variables.
    for cond in &query.conditions {
        rows.retain(|bindings| {
            item_property_key(store, bindings.get(&cond.var).copied(), &cond.key)
                == Some(&cond.value)
        });
    }

    if let Some(order) = &query.order_by {
        rows.sort_by(|a, b| {
            let va = item_property_key(store, a.get(&order.var).copied(), &order.key);
            let vb = item_property_key(store, b.get(&order.var).copied(), &order.key);
            let ord = match (va, vb) {
                (Some(x), Some(y)) => compare_values(x, y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            };
            if order.descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }

    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }

    for var in &query.returns {
        if query.start.var != *var
            && query.hop.as_ref().map_or(true, |(r, e)| {
                r.var.as_deref() != Some(var.as_str()) && e.var != *var
            })
        {
            return Err(GraphError::Query(format!("unbound return variable {}", var)));
        }
    }

    let returns = &query.returns;
    Ok(rows
        .into_iter()
        .map(|mut bindings| {
            bindings.retain(|k, _| returns.contains(k));
            QueryRow { bindings }
        })
        .collect())
}

fn candidate_nodes(store: &GraphStore, pattern: &NodePattern) -> Vec<NodeId> {
    // Unique index first, then property auto-index, then label index,
    // then full scan.
    if let Some(label) = &pattern.label {
        for (key, value) in &pattern.props {
            if let Some(id) = store.lookup_unique(label, key, value) {
                return vec![id];
            }
        }
    }
    if let Some((key, value)) = pattern.props.first() {
        let hits = store.nodes_with_property(key, value);
        if !hits.is_empty() || pattern.label.is_none() {
            return hits;
        }
    }
    if let Some(label) = &pattern.label {
        let mut ids: Vec<NodeId> = store.nodes_by_label(label).iter().map(|n| n.id).collect();
        ids.sort();
        return ids;
    }
    let mut ids: Vec<NodeId> = store.all_nodes().map(|n| n.id).collect();
    ids.sort();
    ids
}

fn node_matches(store: &GraphStore, id: NodeId, pattern: &NodePattern) -> bool {
    let Some(node) = store.get_node(id) else {
        return false;
    };
    if let Some(label) = &pattern.label {
        if !node.has_label(label) {
            return false;
        }
    }
    pattern
        .props
        .iter()
        .all(|(k, v)| node.get_property(k) == Some(v))
}

fn item_property_key<'a>(
    store: &'a GraphStore,
    item: Option<QueryItem>,
    key: &str,
) -> Option<&'a PropertyValue> {
    match item? {
        QueryItem::Node(id) => store.get_node(id)?.get_property(key),
        QueryItem::Rel(id) => store.get_rel(id)?.get_property(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::property::PropertyMap;
    use crate::graph::store::KernelConfig;

    fn config() -> KernelConfig {
        KernelConfig {
            node_indexed_props: vec!["oid".into(), "type".into(), "name".into()],
            rel_indexed_props: vec!["workflow".into()],
            unique_constraints: vec![(Label::new("Provenance"), "oid".into())],
        }
    }

    fn prov_node(store: &mut GraphStore, oid: &str, name: &str, created: i64) -> NodeId {
        let mut props = PropertyMap::new();
        props.insert("oid".to_string(), oid.into());
        props.insert("name".to_string(), name.into());
        props.insert("created".to_string(), created.into());
        store
            .create_node(vec![Label::new("Provenance")], props)
            .unwrap()
    }

    #[test]
    fn test_node_query_by_label_and_prop() {
        let mut store = GraphStore::new(&config());
        let a = prov_node(&mut store, "urn:uuid:a", "alpha", 1);
        prov_node(&mut store, "urn:uuid:b", "beta", 2);

        let q = PatternQuery::node(
            NodePattern::var("n")
                .with_label("Provenance")
                .with_prop("oid", "urn:uuid:a"),
        );
        let rows = execute(&store, &q).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].node("n"), Some(a));
    }

    #[test]
    fn test_hop_query() {
        let mut store = GraphStore::new(&config());
        let a = prov_node(&mut store, "urn:uuid:a", "alpha", 1);
        let b = prov_node(&mut store, "urn:uuid:b", "beta", 2);
        let c = prov_node(&mut store, "urn:uuid:c", "gamma", 3);
        store.create_rel(a, b, "input to", PropertyMap::new()).unwrap();
        store.create_rel(a, c, "owns", PropertyMap::new()).unwrap();

        let q = PatternQuery::node(NodePattern::var("n").with_prop("oid", "urn:uuid:a"))
            .with_hop(
                RelPattern {
                    var: Some("r".to_string()),
                    types: vec![RelType::new("input to")],
                    direction: Direction::Outgoing,
                },
                NodePattern::var("m"),
            )
            .returning(vec!["n".into(), "r".into(), "m".into()]);

        let rows = execute(&store, &q).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].node("m"), Some(b));
        assert!(rows[0].rel("r").is_some());
    }

    #[test]
    fn test_order_and_limit() {
        let mut store = GraphStore::new(&config());
        prov_node(&mut store, "urn:uuid:a", "alpha", 3);
        prov_node(&mut store, "urn:uuid:b", "beta", 1);
        let c = prov_node(&mut store, "urn:uuid:c", "gamma", 5);

        let q = PatternQuery::node(NodePattern::var("n").with_label("Provenance"))
            .order_by("n", "created", true)
            .with_limit(1);
        let rows = execute(&store, &q).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].node("n"), Some(c));
    }

    #[test]
    fn test_unbound_return_is_error() {
        let store = GraphStore::new(&config());
        let q = PatternQuery::node(NodePattern::var("n")).returning(vec!["x".into()]);
        assert!(execute(&store, &q).is_err());
    }

    #[test]
    fn test_any_type_hop() {
        let mut store = GraphStore::new(&config());
        let a = prov_node(&mut store, "urn:uuid:a", "alpha", 1);
        let b = prov_node(&mut store, "urn:uuid:b", "beta", 2);
        store.create_rel(a, b, "generated", PropertyMap::new()).unwrap();

        let q = PatternQuery::node(NodePattern::var("n").with_prop("oid", "urn:uuid:a"))
            .with_hop(
                RelPattern {
                    var: None,
                    types: vec![],
                    direction: Direction::Both,
                },
                NodePattern::var("m"),
            )
            .returning(vec!["m".into()]);
        let rows = execute(&store, &q).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].node("m"), Some(b));
    }
}
