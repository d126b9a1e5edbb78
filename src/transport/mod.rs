//! # Host Runtimes
//!
//! The control family never owns sockets. It consumes a [`Transport`] that
//! registers the family, assigns it an id and delivers confirms by unicast.
//!
//! ## Implementations
//! - **Loopback**: in-process runtime with per-port mailboxes
//! - **Local**: Unix domain socket runtime (tokio) with family resolution
//!
//! ## Control Family
//! Family id `0x10` is reserved for name resolution (see [`ctrl`]); registered
//! families get ids from `0x11` upward.

use std::sync::Arc;

use bytes::Bytes;

use crate::config::check_name;
use crate::error::{constants, Result};

pub mod ctrl;
#[cfg(unix)]
pub mod local;
pub mod loopback;
pub mod table;

pub use loopback::LoopbackRuntime;
pub use table::{FamilyTable, RegisteredFamily};

/// Reserved id of the resolution family
pub const CTRL_FAMILY_ID: u16 = 0x10;

/// First id handed to a registered family
pub const MIN_FAMILY_ID: u16 = 0x11;

/// Id assigned to a family at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FamilyId(pub u16);

impl FamilyId {
    #[inline]
    pub fn get(self) -> u16 {
        self.0
    }
}

/// A command the family accepts, as announced to the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpSpec {
    pub command: u16,
    pub policy: &'static str,
}

/// Everything the runtime needs to know to register a family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilySpec {
    pub name: String,
    pub version: u8,
    pub max_attr: u16,
    pub ops: Vec<OpSpec>,
    pub multicast_groups: Vec<String>,
}

impl FamilySpec {
    /// Registration rules: names of at most 16 bytes, unique group names
    pub fn validate(&self) -> Result<()> {
        check_name(&self.name, constants::ERR_FAMILY_NAME_LONG)?;
        for (i, group) in self.multicast_groups.iter().enumerate() {
            check_name(group, constants::ERR_GROUP_NAME_LONG)?;
            if self.multicast_groups[..i].contains(group) {
                return Err(crate::error::ProtocolError::Registration(format!(
                    "duplicate multicast group '{group}'"
                )));
            }
        }
        Ok(())
    }
}

/// Host runtime interface consumed by the control family
pub trait Transport: Send + Sync {
    /// Register a family; called exactly once before any message is handled
    fn register_family(&self, spec: &FamilySpec) -> Result<FamilyId>;

    /// Remove a family; called exactly once at shutdown
    fn unregister_family(&self, id: FamilyId) -> Result<()>;

    /// Deliver `message` to `port_id` only
    ///
    /// Ownership of the buffer passes to the runtime whether or not delivery
    /// succeeds.
    fn unicast(&self, port_id: u32, message: Bytes) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn register_family(&self, spec: &FamilySpec) -> Result<FamilyId> {
        (**self).register_family(spec)
    }

    fn unregister_family(&self, id: FamilyId) -> Result<()> {
        (**self).unregister_family(id)
    }

    fn unicast(&self, port_id: u32, message: Bytes) -> Result<()> {
        (**self).unicast(port_id, message)
    }
}
