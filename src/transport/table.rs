//! Family table shared by the host runtimes.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{ProtocolError, Result};
use crate::transport::{FamilyId, FamilySpec, MIN_FAMILY_ID};

/// A family as the runtime knows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredFamily {
    pub id: FamilyId,
    pub spec: FamilySpec,
    /// (group name, group id) pairs
    pub groups: Vec<(String, u16)>,
}

/// Registered families keyed by id
#[derive(Debug)]
pub struct FamilyTable {
    families: HashMap<u16, RegisteredFamily>,
    next_group: u16,
}

impl Default for FamilyTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FamilyTable {
    pub fn new() -> Self {
        Self {
            families: HashMap::new(),
            next_group: 1,
        }
    }

    /// Validate `spec`, assign the lowest free id and group ids
    pub fn register(&mut self, spec: &FamilySpec) -> Result<FamilyId> {
        spec.validate()?;
        if self.resolve(&spec.name).is_some() {
            return Err(ProtocolError::Registration(format!(
                "family '{}' already registered",
                spec.name
            )));
        }

        let id = (MIN_FAMILY_ID..=u16::MAX)
            .find(|id| !self.families.contains_key(id))
            .ok_or_else(|| ProtocolError::Registration("no free family id".to_string()))?;

        let groups = spec
            .multicast_groups
            .iter()
            .map(|name| {
                let group = (name.clone(), self.next_group);
                self.next_group = self.next_group.wrapping_add(1).max(1);
                group
            })
            .collect();

        let family = RegisteredFamily {
            id: FamilyId(id),
            spec: spec.clone(),
            groups,
        };
        info!(family = %spec.name, id, "Family registered");
        self.families.insert(id, family);
        Ok(FamilyId(id))
    }

    pub fn unregister(&mut self, id: FamilyId) -> Result<()> {
        match self.families.remove(&id.get()) {
            Some(family) => {
                debug!(family = %family.spec.name, id = id.get(), "Family unregistered");
                Ok(())
            }
            None => Err(ProtocolError::NotRegistered),
        }
    }

    pub fn get(&self, id: FamilyId) -> Option<&RegisteredFamily> {
        self.families.get(&id.get())
    }

    pub fn resolve(&self, name: &str) -> Option<&RegisteredFamily> {
        self.families.values().find(|family| family.spec.name == name)
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}
