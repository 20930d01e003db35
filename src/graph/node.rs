//! Node implementation for the property graph

use super::property::{PropertyMap, PropertyValue};
use super::types::{Label, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A node in the property graph.
///
/// Nodes carry a unique id, a set of labels, a property map, and a creation
/// timestamp (Unix milliseconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node
    pub id: NodeId,

    /// Set of labels for this node
    pub labels: HashSet<Label>,

    /// Properties associated with this node
    pub properties: PropertyMap,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Node {
    /// Create a new node with labels and properties
    pub fn new(id: NodeId, labels: Vec<Label>, properties: PropertyMap) -> Self {
        Node {
            id,
            labels: labels.into_iter().collect(),
            properties,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Check if node has a specific label
    pub fn has_label(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }

    /// Get a property value
    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Check if property exists
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Get number of properties
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_node() {
        let node = Node::new(NodeId::new(1), vec![Label::new("Provenance")], PropertyMap::new());
        assert_eq!(node.id, NodeId::new(1));
        assert!(node.has_label(&Label::new("Provenance")));
        assert!(node.created_at > 0);
    }

    #[test]
    fn test_node_properties() {
        let mut props = PropertyMap::new();
        props.insert("name".to_string(), "report.csv".into());
        props.insert("created".to_string(), 1234i64.into());

        let node = Node::new(NodeId::new(2), vec![Label::new("Provenance")], props);

        assert_eq!(node.get_property("name").unwrap().as_string(), Some("report.csv"));
        assert_eq!(node.get_property("created").unwrap().as_integer(), Some(1234));
        assert_eq!(node.property_count(), 2);
        assert!(!node.has_property("missing"));
    }

    #[test]
    fn test_node_equality() {
        let node1 = Node::new(NodeId::new(7), vec![Label::new("Actor")], PropertyMap::new());
        let node2 = Node::new(NodeId::new(7), vec![Label::new("Provenance")], PropertyMap::new());
        let node3 = Node::new(NodeId::new(8), vec![Label::new("Actor")], PropertyMap::new());

        assert_eq!(node1, node2); // Same ID
        assert_ne!(node1, node3); // Different ID
    }
}
