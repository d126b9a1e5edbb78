//! Static command table.
//!
//! The command set is closed, so lookup is a `match` over [`Command`].
//! Confirms are outbound only and never resolve.

use crate::core::policy::Policy;
use crate::error::{ProtocolError, Result};
use crate::protocol::command::{Command, CTRL_POLICY};
use crate::protocol::handlers::{self, Handler};
use crate::transport::OpSpec;

/// A request command bound to its policy and handler
pub struct Operation {
    pub command: Command,
    pub policy: &'static Policy,
    pub handler: Handler,
}

static OPERATIONS: [Operation; 2] = [
    Operation {
        command: Command::GetInfoRequest,
        policy: &CTRL_POLICY,
        handler: handlers::get_info,
    },
    Operation {
        command: Command::SetParamRequest,
        policy: &CTRL_POLICY,
        handler: handlers::set_param,
    },
];

/// Resolve an inbound command id
pub fn lookup(command: u16) -> Result<&'static Operation> {
    match Command::try_from(command)? {
        Command::GetInfoRequest => Ok(&OPERATIONS[0]),
        Command::SetParamRequest => Ok(&OPERATIONS[1]),
        Command::Invalid | Command::GetInfoConfirm | Command::SetParamConfirm => {
            Err(ProtocolError::UnknownCommand(command))
        }
    }
}

/// All registered operations, in command order
pub fn operations() -> &'static [Operation] {
    &OPERATIONS
}

/// Operations as announced to the host runtime
pub fn op_specs() -> Vec<OpSpec> {
    OPERATIONS
        .iter()
        .map(|op| OpSpec {
            command: op.command.id(),
            policy: op.policy.name(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_resolve() {
        for op in operations() {
            let found = lookup(op.command.id()).ok().map(|o| o.command);
            assert_eq!(found, Some(op.command));
        }
    }

    #[test]
    fn test_confirms_and_unknown_do_not_resolve() {
        for id in [0u16, 2, 4, 5, 0xFFFF] {
            assert!(matches!(lookup(id), Err(ProtocolError::UnknownCommand(i)) if i == id));
        }
    }

    #[test]
    fn test_op_specs_announce_requests() {
        let specs = op_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].command, 1);
        assert_eq!(specs[1].command, 3);
        assert_eq!(specs[0].policy, "control");
    }
}
