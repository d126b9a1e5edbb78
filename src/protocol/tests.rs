// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use bytes::Bytes;

use crate::config::ControlConfig;
use crate::core::message::{Endpoint, MessageBuffer, MessageHeader, FLAG_REQUEST};
use crate::error::ProtocolError;
use crate::protocol::command::{ctrl_attr, param_req_attr, Command};
use crate::protocol::Family;
use crate::service::{parse_confirm, Confirm, RequestBuilder};
use crate::transport::{FamilyId, LoopbackRuntime, MIN_FAMILY_ID};

const PORT: u32 = 4242;

fn setup() -> (Arc<LoopbackRuntime>, Family<Arc<LoopbackRuntime>>, RequestBuilder) {
    let runtime = Arc::new(LoopbackRuntime::new());
    let family = Family::register(Arc::clone(&runtime), &ControlConfig::default())
        .expect("registration should succeed");
    runtime.bind(PORT).unwrap();
    let requests = RequestBuilder::new(family.id().unwrap(), 0);
    (runtime, family, requests)
}

fn request(family: FamilyId, command: u16, port_id: u32) -> MessageBuffer {
    let header = MessageHeader::new(
        family.get(),
        command,
        0,
        Endpoint::new(port_id, 1),
        FLAG_REQUEST,
    );
    MessageBuffer::new(header, 256).unwrap()
}

fn only_confirm(runtime: &LoopbackRuntime) -> (MessageHeader, Confirm) {
    let raw = runtime.recv(PORT).unwrap().expect("a confirm should be queued");
    assert_eq!(runtime.pending(PORT).unwrap(), 0, "exactly one confirm");
    parse_confirm(&raw).unwrap()
}

#[test]
fn test_get_info_reports_defaults() {
    let (runtime, family, requests) = setup();

    let raw = requests.get_info_request(Endpoint::new(PORT, 7)).unwrap();
    family.handle(&raw).unwrap();

    let (header, confirm) = only_confirm(&runtime);
    assert_eq!(header.command, Command::GetInfoConfirm.id());
    assert_eq!(header.family, MIN_FAMILY_ID);
    assert_eq!(header.endpoint(), Endpoint::new(PORT, 7));
    assert!(!header.is_request());
    assert_eq!(
        confirm,
        Confirm::Info {
            debug_level: 4,
            module_version: "0.0.0".to_string()
        }
    );
}

#[test]
fn test_set_param_then_get_info() {
    let (runtime, family, requests) = setup();

    let raw = requests.set_param_request(Endpoint::new(PORT, 1), 2).unwrap();
    family.handle(&raw).unwrap();
    let (header, confirm) = only_confirm(&runtime);
    assert_eq!(header.command, Command::SetParamConfirm.id());
    assert_eq!(header.sequence, 1);
    assert_eq!(confirm, Confirm::Param { status: 0 });
    assert_eq!(family.state().debug_level().get(), 2);

    let raw = requests.get_info_request(Endpoint::new(PORT, 2)).unwrap();
    family.handle(&raw).unwrap();
    let (_, confirm) = only_confirm(&runtime);
    assert!(matches!(confirm, Confirm::Info { debug_level: 2, .. }));
}

#[test]
fn test_any_u16_level_accepted() {
    let (runtime, family, requests) = setup();

    let raw = requests
        .set_param_request(Endpoint::new(PORT, 1), u16::MAX)
        .unwrap();
    family.handle(&raw).unwrap();
    assert_eq!(family.state().debug_level().get(), u16::MAX);
    assert_eq!(runtime.pending(PORT).unwrap(), 1);
}

#[test]
fn test_get_info_without_marker_is_dropped() {
    let (runtime, family, _) = setup();

    let raw = request(family.id().unwrap(), Command::GetInfoRequest.id(), PORT).finish();
    assert!(matches!(
        family.handle(&raw),
        Err(ProtocolError::MissingAttribute("GET_INFO_REQ"))
    ));
    assert_eq!(runtime.pending(PORT).unwrap(), 0);
}

#[test]
fn test_set_param_without_level_leaves_state() {
    let (runtime, family, _) = setup();

    let mut msg = request(family.id().unwrap(), Command::SetParamRequest.id(), PORT);
    let nest = msg.nest_start(ctrl_attr::SET_PARAM_REQ).unwrap();
    msg.nest_end(nest).unwrap();

    assert!(matches!(
        family.handle(&msg.finish()),
        Err(ProtocolError::MissingAttribute(_))
    ));
    assert_eq!(family.state().debug_level().get(), 4);
    assert_eq!(runtime.pending(PORT).unwrap(), 0);
    assert_eq!(family.metrics().snapshot().requests_rejected, 1);
}

#[test]
fn test_set_param_wrong_nested_kind_is_violation() {
    let (runtime, family, _) = setup();

    let mut msg = request(family.id().unwrap(), Command::SetParamRequest.id(), PORT);
    let nest = msg.nest_start(ctrl_attr::SET_PARAM_REQ).unwrap();
    msg.put_string(param_req_attr::DEBUG_LEVEL, "2").unwrap();
    msg.nest_end(nest).unwrap();

    assert!(matches!(
        family.handle(&msg.finish()),
        Err(ProtocolError::PolicyViolation { slot: 1, .. })
    ));
    assert_eq!(family.state().debug_level().get(), 4);
    assert_eq!(runtime.pending(PORT).unwrap(), 0);
}

#[test]
fn test_top_level_kind_mismatch_is_violation() {
    let (runtime, family, _) = setup();

    let mut msg = request(family.id().unwrap(), Command::SetParamRequest.id(), PORT);
    msg.put_u16(ctrl_attr::SET_PARAM_REQ, 2).unwrap();

    assert!(matches!(
        family.handle(&msg.finish()),
        Err(ProtocolError::PolicyViolation {
            slot: ctrl_attr::SET_PARAM_REQ,
            ..
        })
    ));
    assert_eq!(runtime.pending(PORT).unwrap(), 0);
}

#[test]
fn test_undeclared_slot_is_violation() {
    let (runtime, family, _) = setup();

    let mut msg = request(family.id().unwrap(), Command::GetInfoRequest.id(), PORT);
    msg.put_marker(ctrl_attr::GET_INFO_REQ).unwrap();
    msg.put_u16(9, 1).unwrap();

    assert!(matches!(
        family.handle(&msg.finish()),
        Err(ProtocolError::PolicyViolation { slot: 9, .. })
    ));
    assert_eq!(runtime.pending(PORT).unwrap(), 0);
}

#[test]
fn test_inbound_confirm_and_unknown_commands_rejected() {
    let (runtime, family, _) = setup();
    let id = family.id().unwrap();

    for command in [0u16, 2, 4, 77] {
        let mut msg = request(id, command, PORT);
        msg.put_marker(ctrl_attr::GET_INFO_REQ).unwrap();
        assert!(matches!(
            family.handle(&msg.finish()),
            Err(ProtocolError::UnknownCommand(c)) if c == command
        ));
    }
    assert_eq!(runtime.pending(PORT).unwrap(), 0);
    assert_eq!(family.metrics().snapshot().requests_rejected, 4);
}

#[test]
fn test_zero_port_rejected() {
    let (runtime, family, requests) = setup();

    let raw = requests.get_info_request(Endpoint::new(0, 1)).unwrap();
    assert!(matches!(family.handle(&raw), Err(ProtocolError::Invalid(_))));
    assert_eq!(runtime.pending(PORT).unwrap(), 0);
}

#[test]
fn test_other_family_rejected() {
    let (runtime, family, _) = setup();

    let other = RequestBuilder::new(FamilyId(MIN_FAMILY_ID + 5), 0);
    let raw = other.get_info_request(Endpoint::new(PORT, 1)).unwrap();
    assert!(matches!(family.handle(&raw), Err(ProtocolError::Invalid(_))));
    assert_eq!(runtime.pending(PORT).unwrap(), 0);
}

#[test]
fn test_truncated_message_rejected() {
    let (_, family, requests) = setup();

    let raw = requests.get_info_request(Endpoint::new(PORT, 1)).unwrap();
    assert!(matches!(
        family.handle(&raw[..raw.len() - 1]),
        Err(ProtocolError::Truncated { .. })
    ));
    assert!(matches!(
        family.handle(&raw[..10]),
        Err(ProtocolError::Invalid(_))
    ));
}

#[test]
fn test_send_failure_keeps_new_state() {
    let (_, family, requests) = setup();

    // Nobody is bound on this port.
    let raw = requests.set_param_request(Endpoint::new(9999, 1), 1).unwrap();
    assert!(matches!(
        family.handle(&raw),
        Err(ProtocolError::SendFailure { port_id: 9999, .. })
    ));
    assert_eq!(family.state().debug_level().get(), 1);

    let snapshot = family.metrics().snapshot();
    assert_eq!(snapshot.send_failures, 1);
    assert_eq!(snapshot.confirms_sent, 0);
    assert_eq!(snapshot.requests_rejected, 0);
}

#[test]
fn test_confirms_go_only_to_requester() {
    let (runtime, family, requests) = setup();
    runtime.bind(PORT + 1).unwrap();

    let raw = requests.get_info_request(Endpoint::new(PORT + 1, 3)).unwrap();
    family.handle(&raw).unwrap();

    assert_eq!(runtime.pending(PORT).unwrap(), 0);
    let reply = runtime.recv(PORT + 1).unwrap().unwrap();
    let (header, _) = parse_confirm(&reply).unwrap();
    assert_eq!(header.endpoint(), Endpoint::new(PORT + 1, 3));
}

#[test]
fn test_unregister_stops_handling_and_resets() {
    let (runtime, mut family, requests) = setup();

    let raw = requests.set_param_request(Endpoint::new(PORT, 1), 1).unwrap();
    family.handle(&raw).unwrap();
    assert!(runtime.resolve("mod").unwrap().is_some());

    family.unregister();
    assert!(!family.is_registered());
    assert_eq!(family.state().debug_level().get(), 4);
    assert!(runtime.resolve("mod").unwrap().is_none());

    let raw = requests.get_info_request(Endpoint::new(PORT, 2)).unwrap();
    assert!(matches!(
        family.handle(&raw),
        Err(ProtocolError::NotRegistered)
    ));

    // Second call is a no-op.
    family.unregister();
}

#[test]
fn test_drop_unregisters() {
    let (runtime, family, _) = setup();
    drop(family);
    assert!(runtime.resolve("mod").unwrap().is_none());
}

#[test]
fn test_configured_level_and_version() {
    let runtime = Arc::new(LoopbackRuntime::new());
    let config = ControlConfig::default_with_overrides(|c| {
        c.module.debug_level = 1;
        c.module.version = "1.2.3".to_string();
    });
    let family = Family::register(Arc::clone(&runtime), &config).unwrap();
    runtime.bind(PORT).unwrap();

    let requests = RequestBuilder::new(family.id().unwrap(), 0);
    family
        .handle(&requests.get_info_request(Endpoint::new(PORT, 1)).unwrap())
        .unwrap();
    let (_, confirm) = only_confirm(&runtime);
    assert_eq!(
        confirm,
        Confirm::Info {
            debug_level: 1,
            module_version: "1.2.3".to_string()
        }
    );
}

#[test]
fn test_registration_failure_is_fatal() {
    let runtime = Arc::new(LoopbackRuntime::new());
    let config = ControlConfig::default_with_overrides(|c| {
        c.family.name = "a_family_name_that_is_too_long".to_string();
    });
    assert!(matches!(
        Family::register(Arc::clone(&runtime), &config),
        Err(ProtocolError::Registration(_))
    ));

    let _first = Family::register(Arc::clone(&runtime), &ControlConfig::default()).unwrap();
    assert!(matches!(
        Family::register(Arc::clone(&runtime), &ControlConfig::default()),
        Err(ProtocolError::Registration(_))
    ));
}

#[test]
fn test_confirm_build_for_non_request() {
    let (_, family, _) = setup();
    let metrics = crate::utils::metrics::Metrics::new();
    let responder = crate::protocol::response::ResponseBuilder::new(
        family.transport(),
        family.id().unwrap(),
        0,
        64,
        family.state(),
        &metrics,
    );
    assert!(matches!(
        responder.build(Endpoint::new(PORT, 1), Command::GetInfoConfirm),
        Err(ProtocolError::Invalid(_))
    ));

    let built: Bytes = responder
        .build(Endpoint::new(PORT, 1), Command::GetInfoRequest)
        .unwrap();
    assert!(built.len() > crate::core::message::HEADER_LEN);
}
