//! Typed, directed relationships between nodes

use super::property::{PropertyMap, PropertyValue};
use super::types::{NodeId, RelId, RelType};
use serde::{Deserialize, Serialize};

/// A directed, typed relationship in the property graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique identifier for this relationship
    pub id: RelId,

    /// Source node (relationship goes FROM this node)
    pub source: NodeId,

    /// Target node (relationship goes TO this node)
    pub target: NodeId,

    /// Relationship type (e.g. "input to", "owns")
    pub rel_type: RelType,

    /// Properties associated with this relationship
    pub properties: PropertyMap,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Relationship {
    /// Create a new relationship with properties
    pub fn new(
        id: RelId,
        source: NodeId,
        target: NodeId,
        rel_type: impl Into<RelType>,
        properties: PropertyMap,
    ) -> Self {
        Relationship {
            id,
            source,
            target,
            rel_type: rel_type.into(),
            properties,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Get a property value
    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Check if property exists
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// The node on the other side of this relationship from `node`.
    pub fn other_end(&self, node: NodeId) -> NodeId {
        if self.source == node {
            self.target
        } else {
            self.source
        }
    }

    /// Check if this relationship goes FROM a specific node
    pub fn starts_from(&self, node: NodeId) -> bool {
        self.source == node
    }

    /// Check if this relationship goes TO a specific node
    pub fn ends_at(&self, node: NodeId) -> bool {
        self.target == node
    }
}

impl PartialEq for Relationship {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Relationship {}

impl std::hash::Hash for Relationship {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_relationship() {
        let rel = Relationship::new(
            RelId::new(1),
            NodeId::new(1),
            NodeId::new(2),
            "input to",
            PropertyMap::new(),
        );

        assert_eq!(rel.id, RelId::new(1));
        assert_eq!(rel.source, NodeId::new(1));
        assert_eq!(rel.target, NodeId::new(2));
        assert_eq!(rel.rel_type.as_str(), "input to");
    }

    #[test]
    fn test_direction_helpers() {
        let rel = Relationship::new(
            RelId::new(2),
            NodeId::new(10),
            NodeId::new(20),
            "generated",
            PropertyMap::new(),
        );

        assert!(rel.starts_from(NodeId::new(10)));
        assert!(rel.ends_at(NodeId::new(20)));
        assert!(!rel.starts_from(NodeId::new(20)));
        assert_eq!(rel.other_end(NodeId::new(10)), NodeId::new(20));
        assert_eq!(rel.other_end(NodeId::new(20)), NodeId::new(10));
    }

    #[test]
    fn test_relationship_properties() {
        let mut props = PropertyMap::new();
        props.insert("workflow".to_string(), "urn:uuid:wf".into());

        let rel = Relationship::new(
            RelId::new(3),
            NodeId::new(1),
            NodeId::new(2),
            "generated",
            props,
        );

        assert_eq!(
            rel.get_property("workflow").unwrap().as_string(),
            Some("urn:uuid:wf")
        );
        assert!(rel.has_property("workflow"));
        assert!(!rel.has_property("npeid"));
    }
}
