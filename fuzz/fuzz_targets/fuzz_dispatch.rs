#![no_main]

use std::sync::Arc;

use genl_control::config::ControlConfig;
use genl_control::protocol::Family;
use genl_control::transport::LoopbackRuntime;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any inbound bytes: no panic, and at most one confirm per message
    let runtime = Arc::new(LoopbackRuntime::new());
    let family = match Family::register(Arc::clone(&runtime), &ControlConfig::default()) {
        Ok(family) => family,
        Err(_) => return,
    };
    let port = data
        .get(12..16)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .unwrap_or(1)
        .max(1);
    let _ = runtime.bind(port);

    let handled = family.handle(data).is_ok();
    let pending = runtime.pending(port).unwrap_or(0);
    assert!(pending <= 1);
    assert!(!handled || pending == 1);
});
