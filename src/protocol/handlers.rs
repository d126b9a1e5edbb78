//! Request handlers.
//!
//! A handler checks its request, applies it, and on success answers through
//! the response builder before returning. On failure nothing is sent.

use crate::core::attr::AttrSet;
use crate::core::message::Endpoint;
use crate::debugf;
use crate::error::{ProtocolError, Result};
use crate::protocol::command::{ctrl_attr, param_req_attr, Command, PARAM_REQ_POLICY};
use crate::protocol::response::ResponseBuilder;
use crate::protocol::state::ControlState;

/// Everything a handler may touch while serving one request
pub struct RequestContext<'a> {
    pub endpoint: Endpoint,
    pub state: &'a ControlState,
    pub responder: &'a ResponseBuilder<'a>,
}

pub type Handler = fn(&RequestContext<'_>, &AttrSet) -> Result<()>;

/// Report the current debug level and module version
pub fn get_info(ctx: &RequestContext<'_>, attrs: &AttrSet) -> Result<()> {
    let level = ctx.state.debug_level();
    debugf!(level, 4, port_id = ctx.endpoint.port_id, "info req received");

    if !attrs.contains(ctrl_attr::GET_INFO_REQ) {
        debugf!(level, 4, "info req marker missing");
        return Err(ProtocolError::MissingAttribute("GET_INFO_REQ"));
    }

    ctx.responder
        .build_and_send(ctx.endpoint, Command::GetInfoRequest)
}

/// Apply a new debug level
///
/// Any 16-bit value is accepted.
pub fn set_param(ctx: &RequestContext<'_>, attrs: &AttrSet) -> Result<()> {
    let level = ctx.state.debug_level();
    debugf!(level, 4, port_id = ctx.endpoint.port_id, "param req received");

    let children = attrs.get_nested(ctrl_attr::SET_PARAM_REQ).ok_or_else(|| {
        debugf!(level, 4, "param req marker missing");
        ProtocolError::MissingAttribute("SET_PARAM_REQ")
    })?;

    let params = AttrSet::from_nested(children, &PARAM_REQ_POLICY).inspect_err(|e| {
        debugf!(level, 4, error = %e, "nested parsing failed");
    })?;

    let new_level = params
        .get_u16(param_req_attr::DEBUG_LEVEL)
        .ok_or(ProtocolError::MissingAttribute("SET_PARAM_REQ_DEBUG_LEVEL"))?;

    level.set(new_level);
    debugf!(level, 2, debug_level = new_level, "debug level updated");

    ctx.responder
        .build_and_send(ctx.endpoint, Command::SetParamRequest)
}
