#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use genl_control::config::ControlConfig;
use genl_control::core::message::Endpoint;
use genl_control::protocol::Family;
use genl_control::service::{parse_confirm, Confirm, RequestBuilder};
use genl_control::transport::LoopbackRuntime;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_requests_heavy() {
    use tokio::task::JoinSet;

    let runtime = Arc::new(LoopbackRuntime::new());
    let family = Arc::new(Family::register(Arc::clone(&runtime), &ControlConfig::default()).unwrap());
    let requests = RequestBuilder::new(family.id().unwrap(), 0);

    let iterations = 2_000u32;
    let ports = 1u32..=16;

    let mut tasks = JoinSet::new();
    for port in ports.clone() {
        runtime.bind(port).unwrap();
        let family = Arc::clone(&family);
        let runtime = Arc::clone(&runtime);
        tasks.spawn(async move {
            for seq in 0..iterations {
                let raw = if seq % 2 == 0 {
                    requests.get_info_request(Endpoint::new(port, seq)).unwrap()
                } else {
                    requests
                        .set_param_request(Endpoint::new(port, seq), (port % 5) as u16)
                        .unwrap()
                };
                family.handle(&raw).unwrap();

                let reply = runtime.recv(port).unwrap().unwrap();
                let (header, confirm) = parse_confirm(&reply).unwrap();
                assert_eq!(header.endpoint(), Endpoint::new(port, seq));
                match confirm {
                    Confirm::Info { debug_level, .. } => assert!(debug_level <= 4),
                    Confirm::Param { status } => assert_eq!(status, 0),
                }
            }
        });
    }

    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }

    let snapshot = family.metrics().snapshot();
    let total = u64::from(iterations) * 16;
    assert_eq!(snapshot.requests_received, total);
    assert_eq!(snapshot.confirms_sent, total);
    assert_eq!(snapshot.requests_rejected, 0);
    for port in ports {
        assert_eq!(runtime.pending(port).unwrap(), 0);
    }
}

#[test]
fn concurrent_level_writes_are_whole_values() {
    let runtime = Arc::new(LoopbackRuntime::new());
    let family = Family::register(Arc::clone(&runtime), &ControlConfig::default()).unwrap();
    let requests = RequestBuilder::new(family.id().unwrap(), 0);
    let written = [0x0101u16, 0x0202, 0x0303, 0x0404];

    std::thread::scope(|scope| {
        for (i, &level) in written.iter().enumerate() {
            let family = &family;
            let runtime = &runtime;
            let port = i as u32 + 1;
            runtime.bind(port).unwrap();
            scope.spawn(move || {
                for seq in 0..500 {
                    let raw = requests.set_param_request(Endpoint::new(port, seq), level).unwrap();
                    family.handle(&raw).unwrap();
                    runtime.recv(port).unwrap().unwrap();
                }
            });
        }
    });

    assert!(written.contains(&family.state().debug_level().get()));
}
