//! Provenance objects: the nodes of the lineage graph

use super::actor::Actor;
use super::ids;
use super::privilege::PrivilegeSet;
use crate::graph::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Refinement of the `data` object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSubtype {
    Generic,
    String,
    File,
    FileImage,
    Url,
    Relational,
    Taint,
}

impl DataSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSubtype::Generic => "generic",
            DataSubtype::String => "string",
            DataSubtype::File => "file",
            DataSubtype::FileImage => "file-image",
            DataSubtype::Url => "url",
            DataSubtype::Relational => "relational",
            DataSubtype::Taint => "taint",
        }
    }
}

/// What kind of provenance object a node is.
///
/// The `(type, subtype)` string pair stored on each node maps onto this
/// variant; unrecognized pairs hydrate as generic data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Data(DataSubtype),
    Activity,
    Workflow,
    Invocation,
}

impl ObjectKind {
    /// The stored `type` string.
    pub fn type_str(&self) -> &'static str {
        match self {
            ObjectKind::Data(_) => "data",
            ObjectKind::Activity => "activity",
            ObjectKind::Workflow => "workflow",
            ObjectKind::Invocation => "invocation",
        }
    }

    /// The stored `subtype` string.
    pub fn subtype_str(&self) -> &'static str {
        match self {
            ObjectKind::Data(st) => st.as_str(),
            ObjectKind::Activity => "activity",
            ObjectKind::Workflow => "workflow",
            ObjectKind::Invocation => "invocation",
        }
    }

    /// Reconstruct the most specific kind for a stored `(type, subtype)`
    /// pair, falling back to generic data when nothing more specific fits.
    pub fn from_strings(type_str: &str, subtype: &str) -> ObjectKind {
        match subtype {
            "invocation" => return ObjectKind::Invocation,
            "string" => return ObjectKind::Data(DataSubtype::String),
            "file" => return ObjectKind::Data(DataSubtype::File),
            "file-image" => return ObjectKind::Data(DataSubtype::FileImage),
            "url" => return ObjectKind::Data(DataSubtype::Url),
            "relational" => return ObjectKind::Data(DataSubtype::Relational),
            "taint" => return ObjectKind::Data(DataSubtype::Taint),
            _ => {}
        }
        match type_str {
            "workflow" => ObjectKind::Workflow,
            "activity" => ObjectKind::Activity,
            "invocation" => ObjectKind::Invocation,
            _ => ObjectKind::Data(DataSubtype::Generic),
        }
    }
}

/// A provenance node: a data artifact, activity, workflow, or invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvObject {
    pub oid: String,
    pub kind: ObjectKind,
    pub name: String,
    /// Creation time, Unix milliseconds
    pub created: i64,
    /// Free-form user metadata; stored under prefixed property keys
    pub metadata: BTreeMap<String, PropertyValue>,
    /// Heritable markings (e.g. taint) propagate to downstream objects
    pub heritable: bool,
    pub owner: Option<Actor>,
    pub privileges: PrivilegeSet,
    /// Set when this object is a redacted stand-in produced by the view
    /// filter rather than the stored original.
    pub surrogate: bool,
}

impl ProvObject {
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        ProvObject {
            oid: ids::new_oid(),
            kind,
            name: name.into(),
            created: chrono::Utc::now().timestamp_millis(),
            metadata: BTreeMap::new(),
            heritable: false,
            owner: None,
            privileges: PrivilegeSet::new(),
            surrogate: false,
        }
    }

    /// A generic data object.
    pub fn data(name: impl Into<String>) -> Self {
        ProvObject::new(ObjectKind::Data(DataSubtype::Generic), name)
    }

    pub fn workflow(name: impl Into<String>) -> Self {
        ProvObject::new(ObjectKind::Workflow, name)
    }

    pub fn activity(name: impl Into<String>) -> Self {
        ProvObject::new(ObjectKind::Activity, name)
    }

    pub fn invocation(name: impl Into<String>) -> Self {
        ProvObject::new(ObjectKind::Invocation, name)
    }

    /// A taint marking claimed by `claimant`. Taints are heritable: their
    /// presence upstream marks everything derived downstream.
    pub fn taint(claimant: &super::actor::User, description: impl Into<String>) -> Self {
        let description = description.into();
        let mut obj = ProvObject::new(
            ObjectKind::Data(DataSubtype::Taint),
            format!("Taint: {}", description),
        );
        obj.heritable = true;
        obj.metadata
            .insert("claimant".to_string(), claimant.aid().into());
        obj.metadata
            .insert("description".to_string(), description.into());
        obj
    }

    /// The well-known default workflow present in every store.
    pub fn default_workflow() -> Self {
        let mut wf = ProvObject::workflow("Default workflow");
        wf.oid = ids::DEFAULT_WORKFLOW_OID.to_string();
        wf
    }

    /// The well-known placeholder activity.
    pub fn unknown_activity() -> Self {
        let mut act = ProvObject::activity("Unknown activity");
        act.oid = ids::UNKNOWN_ACTIVITY_OID.to_string();
        act
    }

    pub fn with_oid(mut self, oid: impl Into<String>) -> Self {
        self.oid = oid.into();
        self
    }

    pub fn with_owner(mut self, owner: Actor) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_privileges(mut self, privileges: PrivilegeSet) -> Self {
        self.privileges = privileges;
        self
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_workflow(&self) -> bool {
        self.kind == ObjectKind::Workflow
    }

    pub fn is_taint(&self) -> bool {
        self.kind == ObjectKind::Data(DataSubtype::Taint)
    }
}

impl fmt::Display for ProvObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{}\" ({}/{})",
            self.oid,
            self.name,
            self.kind.type_str(),
            self.kind.subtype_str()
        )
    }
}
