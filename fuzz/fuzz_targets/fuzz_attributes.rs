#![no_main]

use genl_control::core::attr;
use genl_control::protocol::command::{CTRL_POLICY, PARAM_REQ_POLICY};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Structural parse must never panic; whatever parses must re-encode to the same bytes
    if let Ok(attrs) = attr::parse(data) {
        if let Ok(encoded) = attr::encode(&attrs) {
            assert_eq!(attr::parse(&encoded).ok(), Some(attrs));
        }
    }
    let _ = attr::decode(data, &CTRL_POLICY);
    let _ = attr::decode(data, &PARAM_REQ_POLICY);
});
