//! Actors (agents) and users

use super::ids::{self, GOD_AID, PUBLIC_AID};
use super::privilege::{PrivilegeClass, PrivilegeSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of agent an actor is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorKind {
    User,
    OpenIdUser,
    Actor,
}

impl ActorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::User => "user",
            ActorKind::OpenIdUser => "openid-user",
            ActorKind::Actor => "actor",
        }
    }

    pub fn from_str(s: &str) -> ActorKind {
        match s {
            "user" => ActorKind::User,
            "openid-user" => ActorKind::OpenIdUser,
            _ => ActorKind::Actor,
        }
    }
}

/// An agent that owns or produces provenance: a person, system, or service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub aid: String,
    pub name: String,
    pub created: i64,
    pub kind: ActorKind,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Actor {
    /// Create a plain actor with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Actor {
            aid: ids::new_oid(),
            name: name.into(),
            created: chrono::Utc::now().timestamp_millis(),
            kind: ActorKind::Actor,
            display_name: None,
            email: None,
        }
    }

    pub fn with_kind(mut self, kind: ActorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_aid(mut self, aid: impl Into<String>) -> Self {
        self.aid = aid.into();
        self
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.aid)
    }
}

/// A viewer: an actor carrying the privileges used by the view filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub actor: Actor,
    pub privileges: PrivilegeSet,
}

impl User {
    pub fn new(name: impl Into<String>, privileges: PrivilegeSet) -> Self {
        User {
            actor: Actor::new(name).with_kind(ActorKind::User),
            privileges,
        }
    }

    /// The built-in superuser; holds ADMIN and sees everything.
    pub fn god() -> Self {
        User {
            actor: Actor::new("GOD").with_kind(ActorKind::User).with_aid(GOD_AID),
            privileges: PrivilegeSet::with(vec![PrivilegeClass::admin()]),
        }
    }

    /// The built-in anonymous viewer; holds only PUBLIC.
    pub fn public_user() -> Self {
        User {
            actor: Actor::new("PUBLIC")
                .with_kind(ActorKind::User)
                .with_aid(PUBLIC_AID),
            privileges: PrivilegeSet::with(vec![PrivilegeClass::public()]),
        }
    }

    pub fn name(&self) -> &str {
        &self.actor.name
    }

    pub fn aid(&self) -> &str {
        &self.actor.aid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_kinds() {
        assert_eq!(ActorKind::from_str("user"), ActorKind::User);
        assert_eq!(ActorKind::from_str("openid-user"), ActorKind::OpenIdUser);
        assert_eq!(ActorKind::from_str("whatever"), ActorKind::Actor);
        assert_eq!(ActorKind::OpenIdUser.as_str(), "openid-user");
    }

    #[test]
    fn test_builtin_users() {
        let god = User::god();
        assert_eq!(god.aid(), GOD_AID);
        assert!(god.privileges.contains(&PrivilegeClass::admin()));

        let public = User::public_user();
        assert_eq!(public.aid(), PUBLIC_AID);
        assert!(public.privileges.contains(&PrivilegeClass::public()));
        assert!(!public.privileges.contains(&PrivilegeClass::admin()));
    }

    #[test]
    fn test_new_actor_gets_fresh_aid() {
        let a = Actor::new("pipeline");
        let b = Actor::new("pipeline");
        assert_ne!(a.aid, b.aid);
        assert_eq!(a.kind, ActorKind::Actor);
    }
}
