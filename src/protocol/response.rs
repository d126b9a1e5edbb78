//! Confirm construction and point-to-point delivery.

use tracing::warn;

use crate::core::message::{Endpoint, MessageBuffer, MessageHeader};
use crate::debugf;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::command::{
    ctrl_attr, info_conf_attr, param_conf_attr, Command, STATUS_OK,
};
use crate::protocol::state::ControlState;
use crate::transport::{FamilyId, Transport};
use crate::utils::metrics::Metrics;

/// Builds confirms for one family and unicasts them to the requester
pub struct ResponseBuilder<'a> {
    transport: &'a dyn Transport,
    family: FamilyId,
    version: u8,
    capacity: usize,
    state: &'a ControlState,
    metrics: &'a Metrics,
}

impl<'a> ResponseBuilder<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        family: FamilyId,
        version: u8,
        capacity: usize,
        state: &'a ControlState,
        metrics: &'a Metrics,
    ) -> Self {
        Self {
            transport,
            family,
            version,
            capacity,
            state,
            metrics,
        }
    }

    /// Build the confirm for `request` and unicast it to `endpoint.port_id`
    ///
    /// The buffer moves into the transport on the send attempt; if building
    /// fails first it is simply dropped here. Build and send failures are
    /// logged and counted, never retried.
    pub fn build_and_send(&self, endpoint: Endpoint, request: Command) -> Result<()> {
        let message = match self.build(endpoint, request) {
            Ok(message) => message,
            Err(e) => {
                self.metrics.send_failed();
                warn!(error = %e, port_id = endpoint.port_id, "Failed to build confirm");
                return Err(e);
            }
        };
        let len = message.len() as u64;

        match self.transport.unicast(endpoint.port_id, message) {
            Ok(()) => {
                self.metrics.confirm_sent(len);
                debugf!(
                    self.state.debug_level(),
                    4,
                    port_id = endpoint.port_id,
                    seq = endpoint.sequence,
                    "confirm sent"
                );
                Ok(())
            }
            Err(e) => {
                self.metrics.send_failed();
                warn!(error = %e, port_id = endpoint.port_id, "Error sending unicast");
                Err(match e {
                    failure @ ProtocolError::SendFailure { .. } => failure,
                    other => ProtocolError::SendFailure {
                        port_id: endpoint.port_id,
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    /// Build the confirm without sending it
    pub fn build(&self, endpoint: Endpoint, request: Command) -> Result<bytes::Bytes> {
        let confirm = request
            .confirm()
            .ok_or(ProtocolError::Invalid(constants::ERR_NO_CONFIRM))?;

        let header = MessageHeader::new(self.family.get(), confirm.id(), self.version, endpoint, 0);
        let mut msg = MessageBuffer::new(header, self.capacity)?;

        match confirm {
            Command::GetInfoConfirm => {
                let nest = msg.nest_start(ctrl_attr::GET_INFO_CONF)?;
                msg.put_u16(info_conf_attr::DEBUG_LEVEL, self.state.debug_level().get())?;
                msg.put_string(info_conf_attr::MODULE_VERSION, self.state.module_version())?;
                msg.nest_end(nest)?;
            }
            Command::SetParamConfirm => {
                let nest = msg.nest_start(ctrl_attr::SET_PARAM_CONF)?;
                msg.put_u16(param_conf_attr::STATUS, STATUS_OK)?;
                msg.nest_end(nest)?;
            }
            _ => return Err(ProtocolError::Invalid(constants::ERR_NO_CONFIRM)),
        }

        Ok(msg.finish())
    }
}
