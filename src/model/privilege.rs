//! Privilege classes and privilege sets
//!
//! Privilege classes are named nodes in a lattice ordered by `dominates`
//! edges; ADMIN is the top, PUBLIC the bottom. The ordering itself lives in
//! the store; these types only carry identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named security label in the privilege lattice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrivilegeClass {
    pub pid: String,
    pub name: String,
}

impl PrivilegeClass {
    pub fn new(pid: impl Into<String>, name: impl Into<String>) -> Self {
        PrivilegeClass {
            pid: pid.into(),
            name: name.into(),
        }
    }

    /// Top of the lattice; dominates every class.
    pub fn admin() -> Self {
        PrivilegeClass::new("urn:privilege:admin", "ADMIN")
    }

    pub fn national_security() -> Self {
        PrivilegeClass::new("urn:privilege:national-security", "NATIONAL_SECURITY")
    }

    pub fn emergency_high() -> Self {
        PrivilegeClass::new("urn:privilege:emergency-high", "EMERGENCY_HIGH")
    }

    pub fn emergency_low() -> Self {
        PrivilegeClass::new("urn:privilege:emergency-low", "EMERGENCY_LOW")
    }

    pub fn private_medical() -> Self {
        PrivilegeClass::new("urn:privilege:private-medical", "PRIVATE_MEDICAL")
    }

    /// Bottom of the lattice; dominated by every class.
    pub fn public() -> Self {
        PrivilegeClass::new("urn:privilege:public", "PUBLIC")
    }

    /// One of the ten numeric levels, 1 (lowest) through 10 (highest).
    pub fn level(n: u8) -> Self {
        PrivilegeClass::new(
            format!("urn:privilege:level-{}", n),
            format!("LEVEL_{}", n),
        )
    }

    pub fn is_admin(&self) -> bool {
        self.pid == Self::admin().pid
    }
}

impl fmt::Display for PrivilegeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An ordered, duplicate-free set of privilege classes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrivilegeSet {
    classes: Vec<PrivilegeClass>,
}

impl PrivilegeSet {
    pub fn new() -> Self {
        PrivilegeSet::default()
    }

    pub fn with(classes: Vec<PrivilegeClass>) -> Self {
        let mut set = PrivilegeSet::new();
        for pc in classes {
            set.add(pc);
        }
        set
    }

    pub fn add(&mut self, pc: PrivilegeClass) {
        if !self.classes.iter().any(|c| c.pid == pc.pid) {
            self.classes.push(pc);
        }
    }

    pub fn contains(&self, pc: &PrivilegeClass) -> bool {
        self.classes.iter().any(|c| c.pid == pc.pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrivilegeClass> {
        self.classes.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Class names, in insertion order (the stored encoding).
    pub fn names(&self) -> Vec<String> {
        self.classes.iter().map(|c| c.name.clone()).collect()
    }
}
