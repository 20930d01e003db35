//! Property codec: domain attribute values to and from storage properties
//!
//! Encoding rules, applied recursively: absent values become the empty
//! string, iterables become arrays of strings, privilege sets become
//! arrays of class names, actor references become their aid, scalars pass
//! through. Metadata keys are prefixed on storage and stripped on load so
//! user metadata cannot collide with first-class properties.

use super::schema::*;
use crate::graph::{Node, PropertyMap, PropertyValue};
use crate::model::{Actor, ActorKind, NonProvenanceEdge, PrivilegeClass, PrivilegeSet, ProvObject};
use std::collections::BTreeMap;

/// Prefix applied to metadata property keys on storage.
pub const METADATA_PREFIX: &str = "metadata:";

/// Storage property name for a metadata key.
pub fn metadata_property_name(key: &str) -> String {
    format!("{}{}", METADATA_PREFIX, key)
}

/// Encode an optional string reference; absent becomes the empty string.
pub fn encode_opt_string(value: Option<&str>) -> PropertyValue {
    PropertyValue::String(value.unwrap_or_default().to_string())
}

/// Encode an iterable of strings as a string array.
pub fn encode_string_iter<I, S>(values: I) -> PropertyValue
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    PropertyValue::StringArray(values.into_iter().map(Into::into).collect())
}

/// Encode a privilege set as the array of its class names.
pub fn encode_privileges(set: &PrivilegeSet) -> PropertyValue {
    PropertyValue::StringArray(set.names())
}

/// Encode an actor reference as its aid; absent becomes the empty string.
pub fn encode_actor_ref(actor: Option<&Actor>) -> PropertyValue {
    encode_opt_string(actor.map(|a| a.aid.as_str()))
}

/// Encode a metadata value for storage. Nulls flatten to the empty string.
pub fn encode_metadata_value(value: &PropertyValue) -> PropertyValue {
    match value {
        PropertyValue::Null => PropertyValue::String(String::new()),
        other => other.clone(),
    }
}

/// First-class plus metadata properties of a provenance object.
///
/// Ownership and privilege bindings are stored as relationships, not
/// properties.
pub fn object_to_props(obj: &ProvObject) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert(PROP_OID.to_string(), obj.oid.clone().into());
    props.insert(PROP_TYPE.to_string(), obj.kind.type_str().into());
    props.insert(PROP_SUBTYPE.to_string(), obj.kind.subtype_str().into());
    props.insert(PROP_NAME.to_string(), obj.name.clone().into());
    props.insert(PROP_CREATED.to_string(), obj.created.into());
    props.insert(PROP_HERITABLE.to_string(), obj.heritable.into());
    for (key, value) in &obj.metadata {
        props.insert(metadata_property_name(key), encode_metadata_value(value));
    }
    props
}

/// Storage properties of an actor.
pub fn actor_to_props(actor: &Actor) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert(PROP_AID.to_string(), actor.aid.clone().into());
    props.insert(PROP_NAME.to_string(), actor.name.clone().into());
    props.insert(PROP_CREATED.to_string(), actor.created.into());
    props.insert(PROP_ACTOR_TYPE.to_string(), actor.kind.as_str().into());
    if let Some(display_name) = &actor.display_name {
        props.insert("displayName".to_string(), display_name.clone().into());
    }
    if let Some(email) = &actor.email {
        props.insert("email".to_string(), email.clone().into());
    }
    props
}

/// Storage properties of a privilege class.
pub fn privilege_to_props(pc: &PrivilegeClass) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert(PROP_PID.to_string(), pc.pid.clone().into());
    props.insert(PROP_NAME.to_string(), pc.name.clone().into());
    props
}

/// Relationship properties of a non-provenance edge.
pub fn npe_to_props(npe: &NonProvenanceEdge) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert(PROP_TYPE.to_string(), npe.kind.clone().into());
    props.insert(PROP_NPEID.to_string(), npe.npeid.clone().into());
    props.insert(PROP_CREATED.to_string(), npe.created.into());
    props
}

/// Extract the metadata map from a stored node, stripping the prefix.
pub fn metadata_from_props(props: &PropertyMap) -> BTreeMap<String, PropertyValue> {
    props
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix(METADATA_PREFIX)
                .map(|key| (key.to_string(), v.clone()))
        })
        .collect()
}

/// Read a string property, defaulting to empty.
pub fn prop_string(node: &Node, key: &str) -> String {
    node.get_property(key)
        .and_then(|v| v.as_string())
        .unwrap_or_default()
        .to_string()
}

/// Read an integer property, defaulting to zero.
pub fn prop_i64(node: &Node, key: &str) -> i64 {
    node.get_property(key).and_then(|v| v.as_integer()).unwrap_or(0)
}

/// Read a boolean property, defaulting to false.
pub fn prop_bool(node: &Node, key: &str) -> bool {
    node.get_property(key)
        .and_then(|v| v.as_boolean())
        .unwrap_or(false)
}

/// Reconstruct an actor kind from its stored string.
pub fn actor_kind_from_props(node: &Node) -> ActorKind {
    ActorKind::from_str(&prop_string(node, PROP_ACTOR_TYPE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Label, NodeId};
    use crate::model::User;

    #[test]
    fn test_metadata_prefix_roundtrip() {
        let obj = ProvObject::data("artifact")
            .with_metadata("source", "sensor-7")
            .with_metadata("rev", 3i64);
        let props = object_to_props(&obj);

        assert!(props.contains_key("metadata:source"));
        assert!(props.contains_key("metadata:rev"));
        // First-class keys are untouched.
        assert!(props.contains_key(PROP_OID));

        let metadata = metadata_from_props(&props);
        assert_eq!(
            metadata.get("source").and_then(|v| v.as_string()),
            Some("sensor-7")
        );
        assert_eq!(metadata.get("rev").and_then(|v| v.as_integer()), Some(3));
        assert!(!metadata.contains_key("oid"));
    }

    #[test]
    fn test_null_metadata_flattens_to_empty_string() {
        let obj = ProvObject::data("x").with_metadata("note", PropertyValue::Null);
        let props = object_to_props(&obj);
        assert_eq!(
            props.get("metadata:note"),
            Some(&PropertyValue::String(String::new()))
        );
    }

    #[test]
    fn test_encode_privileges() {
        let god = User::god();
        let encoded = encode_privileges(&god.privileges);
        assert_eq!(
            encoded,
            PropertyValue::StringArray(vec!["ADMIN".to_string()])
        );
    }

    #[test]
    fn test_encode_actor_ref() {
        let actor = Actor::new("svc");
        assert_eq!(
            encode_actor_ref(Some(&actor)),
            PropertyValue::String(actor.aid.clone())
        );
        assert_eq!(encode_actor_ref(None), PropertyValue::String(String::new()));
    }

    #[test]
    fn test_object_props_complete() {
        let obj = ProvObject::workflow("pipeline");
        let props = object_to_props(&obj);
        assert_eq!(props.get(PROP_TYPE).unwrap().as_string(), Some("workflow"));
        assert_eq!(props.get(PROP_SUBTYPE).unwrap().as_string(), Some("workflow"));
        assert_eq!(props.get(PROP_NAME).unwrap().as_string(), Some("pipeline"));
        assert_eq!(props.get(PROP_HERITABLE).unwrap().as_boolean(), Some(false));
    }

    #[test]
    fn test_prop_readers_default() {
        let node = Node::new(NodeId::new(1), vec![Label::new("Provenance")], PropertyMap::new());
        assert_eq!(prop_string(&node, "missing"), "");
        assert_eq!(prop_i64(&node, "missing"), 0);
        assert!(!prop_bool(&node, "missing"));
    }
}
