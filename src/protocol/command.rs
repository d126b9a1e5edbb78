//! Command taxonomy, attribute slot namespaces and their policies.

use crate::core::attr::AttrKind;
use crate::core::policy::{Policy, SlotPolicy};
use crate::error::{ProtocolError, Result};

/// Confirm status for a successful request
pub const STATUS_OK: u16 = 0;

/// Commands of the control family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    Invalid = 0,
    /// From user space
    GetInfoRequest = 1,
    /// From the control plane
    GetInfoConfirm = 2,
    /// From user space
    SetParamRequest = 3,
    /// From the control plane
    SetParamConfirm = 4,
}

impl Command {
    pub const MAX: u16 = 4;

    #[inline]
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Confirm sent in answer to a request; `None` for anything else
    pub fn confirm(self) -> Option<Command> {
        match self {
            Command::GetInfoRequest => Some(Command::GetInfoConfirm),
            Command::SetParamRequest => Some(Command::SetParamConfirm),
            _ => None,
        }
    }

    pub fn is_request(self) -> bool {
        self.confirm().is_some()
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Invalid => "invalid",
            Command::GetInfoRequest => "get-info-request",
            Command::GetInfoConfirm => "get-info-confirm",
            Command::SetParamRequest => "set-param-request",
            Command::SetParamConfirm => "set-param-confirm",
        }
    }
}

impl TryFrom<u16> for Command {
    type Error = ProtocolError;

    fn try_from(id: u16) -> Result<Self> {
        match id {
            0 => Ok(Command::Invalid),
            1 => Ok(Command::GetInfoRequest),
            2 => Ok(Command::GetInfoConfirm),
            3 => Ok(Command::SetParamRequest),
            4 => Ok(Command::SetParamConfirm),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }
}

/// Top-level control attributes
pub mod ctrl_attr {
    pub const GET_INFO_REQ: u16 = 1;
    pub const GET_INFO_CONF: u16 = 2;
    pub const SET_PARAM_REQ: u16 = 3;
    pub const SET_PARAM_CONF: u16 = 4;
    pub const MAX: u16 = 4;
}

/// Children of `GET_INFO_CONF`
pub mod info_conf_attr {
    pub const DEBUG_LEVEL: u16 = 1;
    pub const MODULE_VERSION: u16 = 2;
    pub const MAX: u16 = 2;
}

/// Children of `SET_PARAM_REQ`
pub mod param_req_attr {
    pub const DEBUG_LEVEL: u16 = 1;
    pub const MAX: u16 = 1;
}

/// Children of `SET_PARAM_CONF`
pub mod param_conf_attr {
    pub const STATUS: u16 = 1;
    pub const MAX: u16 = 1;
}

pub static PARAM_REQ_POLICY: Policy = Policy::new(
    "set-param-request",
    &[None, Some(SlotPolicy::of(AttrKind::U16))],
);

pub static INFO_CONF_POLICY: Policy = Policy::new(
    "get-info-confirm",
    &[
        None,
        Some(SlotPolicy::of(AttrKind::U16)),
        Some(SlotPolicy::of(AttrKind::String)),
    ],
);

pub static PARAM_CONF_POLICY: Policy = Policy::new(
    "set-param-confirm",
    &[None, Some(SlotPolicy::of(AttrKind::U16))],
);

/// Policy for top-level control attributes
///
/// Request payloads are left to their handlers; confirm payloads carry their
/// nested policies so clients validate them in one pass.
pub static CTRL_POLICY: Policy = Policy::new(
    "control",
    &[
        None,
        Some(SlotPolicy::of(AttrKind::Unspec)),
        Some(SlotPolicy::nested(&INFO_CONF_POLICY)),
        Some(SlotPolicy::of(AttrKind::Nested)),
        Some(SlotPolicy::nested(&PARAM_CONF_POLICY)),
    ],
);
