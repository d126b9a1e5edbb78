//! Family resolution on the reserved control family.
//!
//! User space knows a family by name; requests must carry its numeric id.
//! A `GETFAMILY` request on family `0x10` naming the family is answered with
//! `NEWFAMILY` describing it, including its multicast groups. Unknown names
//! get no answer.

use bytes::Bytes;

use crate::core::attr::{self, AttrKind, AttrSet, AttrValue};
use crate::core::message::{Endpoint, Message, MessageBuffer, MessageHeader, FLAG_REQUEST};
use crate::core::policy::{Policy, SlotPolicy};
use crate::error::{ProtocolError, Result};
use crate::transport::{FamilyId, FamilyTable, RegisteredFamily, CTRL_FAMILY_ID};

/// Control family commands
pub mod cmd {
    pub const NEWFAMILY: u16 = 1;
    pub const GETFAMILY: u16 = 3;
}

/// Control family attributes
pub mod ctrl_attr {
    pub const FAMILY_ID: u16 = 1;
    pub const FAMILY_NAME: u16 = 2;
    pub const VERSION: u16 = 3;
    pub const MAX_ATTR: u16 = 4;
    pub const MCAST_GROUPS: u16 = 5;
}

/// Attributes of one multicast group entry
pub mod group_attr {
    pub const NAME: u16 = 1;
    pub const ID: u16 = 2;
}

const CTRL_MESSAGE_CAPACITY: usize = 1024;

pub static GROUP_POLICY: Policy = Policy::new(
    "ctrl-group",
    &[
        None,
        Some(SlotPolicy::of(AttrKind::String)),
        Some(SlotPolicy::of(AttrKind::U16)),
    ],
);

pub static CTRL_POLICY: Policy = Policy::new(
    "ctrl",
    &[
        None,
        Some(SlotPolicy::of(AttrKind::U16)),
        Some(SlotPolicy::of(AttrKind::String)),
        Some(SlotPolicy::of(AttrKind::U16)),
        Some(SlotPolicy::of(AttrKind::U16)),
        Some(SlotPolicy::of(AttrKind::Nested)),
    ],
);

/// A family as reported by the control family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyInfo {
    pub id: FamilyId,
    pub name: String,
    pub version: u16,
    pub max_attr: u16,
    pub multicast_groups: Vec<(String, u16)>,
}

/// Build a `GETFAMILY` request for `name`
pub fn resolve_request(endpoint: Endpoint, name: &str) -> Result<Bytes> {
    let header = MessageHeader::new(CTRL_FAMILY_ID, cmd::GETFAMILY, 1, endpoint, FLAG_REQUEST);
    let mut msg = MessageBuffer::new(header, CTRL_MESSAGE_CAPACITY)?;
    msg.put_string(ctrl_attr::FAMILY_NAME, name)?;
    Ok(msg.finish())
}

/// Answer a control request against `families`
///
/// Returns the reply and the port it goes to, or `None` when the family is
/// unknown.
pub fn answer(families: &FamilyTable, raw: &[u8]) -> Result<Option<(u32, Bytes)>> {
    let message = Message::parse(raw)?;
    if message.header.family != CTRL_FAMILY_ID {
        return Err(ProtocolError::Invalid(
            crate::error::constants::ERR_FAMILY_MISMATCH,
        ));
    }
    if message.header.command != cmd::GETFAMILY {
        return Err(ProtocolError::UnknownCommand(message.header.command));
    }
    let endpoint = message.endpoint()?;
    let attrs = attr::decode(message.payload, &CTRL_POLICY)?;

    let family = if let Some(name) = attrs.get_str(ctrl_attr::FAMILY_NAME) {
        families.resolve(name)
    } else if let Some(id) = attrs.get_u16(ctrl_attr::FAMILY_ID) {
        families.get(FamilyId(id))
    } else {
        return Err(ProtocolError::MissingAttribute("CTRL_ATTR_FAMILY_NAME"));
    };

    match family {
        Some(family) => Ok(Some((endpoint.port_id, family_reply(endpoint, family)?))),
        None => Ok(None),
    }
}

fn family_reply(endpoint: Endpoint, family: &RegisteredFamily) -> Result<Bytes> {
    let header = MessageHeader::new(CTRL_FAMILY_ID, cmd::NEWFAMILY, 1, endpoint, 0);
    let mut msg = MessageBuffer::new(header, CTRL_MESSAGE_CAPACITY)?;

    msg.put_u16(ctrl_attr::FAMILY_ID, family.id.get())?;
    msg.put_string(ctrl_attr::FAMILY_NAME, &family.spec.name)?;
    msg.put_u16(ctrl_attr::VERSION, u16::from(family.spec.version))?;
    msg.put_u16(ctrl_attr::MAX_ATTR, family.spec.max_attr)?;

    let groups = msg.nest_start(ctrl_attr::MCAST_GROUPS)?;
    for (index, (name, id)) in family.groups.iter().enumerate() {
        let entry = msg.nest_start(index as u16 + 1)?;
        msg.put_string(group_attr::NAME, name)?;
        msg.put_u16(group_attr::ID, *id)?;
        msg.nest_end(entry)?;
    }
    msg.nest_end(groups)?;

    Ok(msg.finish())
}

/// Decode a `NEWFAMILY` reply
pub fn parse_family_info(raw: &[u8]) -> Result<(MessageHeader, FamilyInfo)> {
    let message = Message::parse(raw)?;
    if message.header.family != CTRL_FAMILY_ID || message.header.command != cmd::NEWFAMILY {
        return Err(ProtocolError::UnknownCommand(message.header.command));
    }
    let attrs = attr::decode(message.payload, &CTRL_POLICY)?;

    let id = attrs
        .get_u16(ctrl_attr::FAMILY_ID)
        .ok_or(ProtocolError::MissingAttribute("CTRL_ATTR_FAMILY_ID"))?;
    let name = attrs
        .get_str(ctrl_attr::FAMILY_NAME)
        .ok_or(ProtocolError::MissingAttribute("CTRL_ATTR_FAMILY_NAME"))?;

    let mut multicast_groups = Vec::new();
    for entry in attrs.get_nested(ctrl_attr::MCAST_GROUPS).unwrap_or_default() {
        let AttrValue::Nested(children) = &entry.value else {
            return Err(ProtocolError::PolicyViolation {
                slot: entry.slot,
                reason: crate::error::constants::ERR_KIND_MISMATCH,
            });
        };
        let group = AttrSet::from_nested(children, &GROUP_POLICY)?;
        let group_name = group
            .get_str(group_attr::NAME)
            .ok_or(ProtocolError::MissingAttribute("CTRL_ATTR_MCAST_GRP_NAME"))?;
        let group_id = group
            .get_u16(group_attr::ID)
            .ok_or(ProtocolError::MissingAttribute("CTRL_ATTR_MCAST_GRP_ID"))?;
        multicast_groups.push((group_name.to_string(), group_id));
    }

    let info = FamilyInfo {
        id: FamilyId(id),
        name: name.to_string(),
        version: attrs.get_u16(ctrl_attr::VERSION).unwrap_or_default(),
        max_attr: attrs.get_u16(ctrl_attr::MAX_ATTR).unwrap_or_default(),
        multicast_groups,
    };
    Ok((message.header, info))
}
